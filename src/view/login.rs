//! Login / logout control

use crate::oidc::Session;

/// What the login control offers for a given session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginButton {
    Loading,
    /// Session-level failure; offers to sign in again
    Retry { message: String },
    Logout,
    Login,
}

impl LoginButton {
    pub fn for_session(session: &Session) -> Self {
        if session.is_loading {
            LoginButton::Loading
        } else if let Some(ref message) = session.error {
            LoginButton::Retry {
                message: message.clone(),
            }
        } else if session.is_authenticated {
            LoginButton::Logout
        } else {
            LoginButton::Login
        }
    }

    /// Whether activating the control starts a sign-in
    pub fn starts_signin(&self) -> bool {
        matches!(self, LoginButton::Retry { .. } | LoginButton::Login)
    }

    pub fn render(&self) -> String {
        match self {
            LoginButton::Loading => "[⏳ Loading...]".to_string(),
            LoginButton::Retry { message } => format!("Error: {}\n[Try Again]", message),
            LoginButton::Logout => "[🚪 Logout]".to_string(),
            LoginButton::Login => "[🔐 Login with Keycloak]".to_string(),
        }
    }
}
