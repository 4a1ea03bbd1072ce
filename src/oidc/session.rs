//! Session snapshots published by the user manager

use super::User;

/// Immutable view of the authentication state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub is_loading: bool,
    pub is_authenticated: bool,
    pub user: Option<User>,
    pub error: Option<String>,
}

impl Session {
    pub fn loading() -> Self {
        Session {
            is_loading: true,
            ..Session::default()
        }
    }

    pub fn unauthenticated() -> Self {
        Session::default()
    }

    /// Authenticated only while the user's access token is unexpired
    pub fn authenticated(user: User) -> Self {
        Session {
            is_loading: false,
            is_authenticated: !user.expired(),
            user: Some(user),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Session {
            error: Some(error.into()),
            ..Session::default()
        }
    }

    pub fn access_token(&self) -> Option<&str> {
        self.user
            .as_ref()
            .map(|u| u.access_token.as_str())
            .filter(|t| !t.is_empty())
    }
}
