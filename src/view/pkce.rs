//! Home screen of the minimal PKCE demo

use crate::oidc::Session;

pub fn render_home(session: &Session, api_result: Option<&str>) -> String {
    let mut out = vec![
        "OIDC + OAuth2 (PKCE) Demo".to_string(),
        "Authorization Code + PKCE with a Bearer access token; session kept in session-scoped storage."
            .to_string(),
        String::new(),
    ];

    if session.is_loading {
        out.push("Loading auth…".to_string());
        return out.join("\n");
    }

    if let Some(ref error) = session.error {
        out.push(format!("Auth error:\n{}", error));
        out.push(String::new());
    }

    if !session.is_authenticated {
        out.push("Status: Signed out".to_string());
        out.push("[Sign in (Redirect)]".to_string());
        return out.join("\n");
    }

    out.push("Status: Signed in".to_string());
    out.push("[Sign out] [Call protected API]".to_string());
    out.push(String::new());

    let claims = session
        .user
        .as_ref()
        .and_then(|u| serde_json::to_string_pretty(&u.profile).ok())
        .unwrap_or_else(|| "{}".to_string());
    out.push("User (claims)".to_string());
    out.push(claims);
    out.push(String::new());

    out.push("Access Token (Bearer)".to_string());
    out.push(session.access_token().unwrap_or("(missing)").to_string());
    out.push(String::new());

    out.push("API Result".to_string());
    out.push(api_result.filter(|r| !r.is_empty()).unwrap_or("(none yet)").to_string());

    out.join("\n")
}
