//! User profile card

use crate::oidc::{Claims, Session};
use chrono::{Local, TimeZone};

/// Whether the groups mark the user as an administrator
///
/// Matches `ADMIN`, `/ADMIN` and any group path ending in `/ADMIN`. This only
/// drives a badge; the backend's role check is authoritative.
pub fn is_admin(groups: &[String]) -> bool {
    groups
        .iter()
        .any(|group| group == "ADMIN" || group == "/ADMIN" || group.ends_with("/ADMIN"))
}

/// Up to two uppercase initials from the display name
pub fn initials(profile: &Claims) -> String {
    let name = profile.display_name().unwrap_or("U");
    name.split(' ')
        .filter_map(|word| word.chars().next())
        .flat_map(char::to_uppercase)
        .take(2)
        .collect()
}

pub struct UserProfile<'a> {
    session: &'a Session,
}

impl<'a> UserProfile<'a> {
    pub fn new(session: &'a Session) -> Self {
        Self { session }
    }

    /// Nothing is rendered unless the session is authenticated
    pub fn render(&self) -> Option<String> {
        if !self.session.is_authenticated {
            return None;
        }
        let user = self.session.user.as_ref()?;
        let profile = &user.profile;

        let mut out = Vec::new();
        out.push(format!(
            "({})  {}",
            initials(profile),
            profile.display_name().unwrap_or_default()
        ));
        if let Some(ref email) = profile.email {
            out.push(format!("      {}", email));
        }

        let mut badges = Vec::new();
        if is_admin(&profile.groups) {
            badges.push("[✓ ADMIN]".to_string());
        }
        badges.extend(
            profile
                .groups
                .iter()
                .map(|g| format!("[{}]", g.strip_prefix('/').unwrap_or(g))),
        );
        if !badges.is_empty() {
            out.push(badges.join(" "));
        }

        out.push(String::new());
        out.push("USER DETAILS".to_string());
        out.push(format!("  Subject (sub)   {}", profile.sub));
        out.push(format!(
            "  Username        {}",
            profile.preferred_username.as_deref().unwrap_or_default()
        ));
        out.push(format!(
            "  Email Verified  {}",
            if profile.email_verified.unwrap_or(false) {
                "✓ Yes"
            } else {
                "✗ No"
            }
        ));

        out.push(String::new());
        out.push("TOKEN INFO".to_string());
        let expires = user
            .expires_at
            .and_then(|at| Local.timestamp_opt(at, 0).single())
            .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "never".to_string());
        out.push(format!("  Expires:     {}", expires));
        out.push(format!("  Token Type:  {}", user.token_type));

        Some(out.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oidc::User;

    fn groups(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn claims(name: Option<&str>, username: Option<&str>) -> Claims {
        Claims {
            sub: "abc".to_string(),
            name: name.map(String::from),
            preferred_username: username.map(String::from),
            ..Claims::default()
        }
    }

    #[test]
    fn test_is_admin() {
        assert!(!is_admin(&groups(&["users"])));
        assert!(!is_admin(&groups(&[])));
        assert!(is_admin(&groups(&["ADMIN"])));
        assert!(is_admin(&groups(&["/ADMIN"])));
        assert!(is_admin(&groups(&["/org/ADMIN"])));
        assert!(is_admin(&groups(&["users", "/org/team/ADMIN"])));
        assert!(!is_admin(&groups(&["/ADMINS", "admin", "/org/ADMIN/x"])));
    }

    #[test]
    fn test_initials() {
        assert_eq!(initials(&claims(Some("Alice Admin"), None)), "AA");
        assert_eq!(initials(&claims(Some("alice b carol"), None)), "AB");
        assert_eq!(initials(&claims(None, Some("bob"))), "B");
        assert_eq!(initials(&claims(None, None)), "U");
    }

    #[test]
    fn test_render_hidden_when_signed_out() {
        let session = Session::unauthenticated();
        assert!(UserProfile::new(&session).render().is_none());
    }

    #[test]
    fn test_render_badges() {
        let mut profile = claims(Some("Alice Admin"), Some("alice"));
        profile.email = Some("alice@example.com".to_string());
        profile.email_verified = Some(true);
        profile.groups = groups(&["/ADMIN", "/users"]);

        let session = Session::authenticated(User {
            profile,
            access_token: "abc".to_string(),
            token_type: "Bearer".to_string(),
            expires_at: None,
            id_token: None,
            refresh_token: None,
            scope: None,
            session_state: None,
        });

        let rendered = UserProfile::new(&session).render().unwrap();
        assert!(rendered.starts_with("(AA)  Alice Admin"));
        assert!(rendered.contains("[✓ ADMIN] [ADMIN] [users]"));
        assert!(rendered.contains("Email Verified  ✓ Yes"));
        assert!(rendered.contains("Token Type:  Bearer"));
    }
}
