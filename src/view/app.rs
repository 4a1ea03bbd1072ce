//! Top-level screen of the Keycloak demo

use super::{HelloController, LoginButton, UserProfile};
use crate::oidc::Session;

/// Endpoints shown on the signed-out configuration card
#[derive(Debug, Clone)]
pub struct AppInfo {
    pub backend_url: String,
    pub app_url: String,
    pub keycloak_url: String,
}

pub fn render_app(
    session: &Session,
    info: &AppInfo,
    controller: &HelloController,
    token_ready: bool,
) -> String {
    if session.is_loading {
        return "Authenticating...".to_string();
    }

    let mut out = vec![
        "🔐 Keycloak OAuth2 Demo".to_string(),
        "Spring Boot Resource Server + Rust Client".to_string(),
        String::new(),
    ];

    let login = LoginButton::for_session(session).render();

    if !session.is_authenticated {
        out.push(
            "Welcome! Please login with your Keycloak account to access the protected API."
                .to_string(),
        );
        out.push(login);
        out.push(String::new());
        out.push("📋 Requirements".to_string());
        out.push("  ✓ User must be a member of the ADMIN group in Keycloak".to_string());
        out.push("  ✓ Keycloak client must include groups scope".to_string());
        out.push("  ✓ Group mapper must be configured to include groups in token".to_string());
        out.push(String::new());
        out.push("🔧 Configuration".to_string());
        out.push(format!("  🖥️  Backend: {}", info.backend_url));
        out.push(format!("  🌐 Frontend: {}", info.app_url));
        out.push(format!("  🔑 Keycloak: {}", info.keycloak_url));
        return out.join("\n");
    }

    let username = session
        .user
        .as_ref()
        .and_then(|u| u.profile.preferred_username.as_deref())
        .unwrap_or_default();
    out.push(format!("Logged in as: {}    {}", username, login));
    out.push(String::new());

    if let Some(profile) = UserProfile::new(session).render() {
        out.push(profile);
        out.push(String::new());
    }

    out.push(controller.render(session.is_authenticated, token_ready));
    out.join("\n")
}
