//! Error types for the Keycloak OIDC demo clients

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DemoError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("OIDC discovery failed: {0}")]
    Discovery(String),

    #[error("Token error: {0}")]
    Token(String),

    #[error("OAuth callback error: {0}")]
    Callback(String),

    /// Login, renew or logout failure from the identity provider interaction
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Classified failure of a backend API call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// HTTP 401: stale, missing or invalid token
    #[error("Unauthorized - token may be expired")]
    Unauthorized,

    /// HTTP 403: valid token, insufficient role
    #[error("Forbidden - insufficient permissions")]
    Forbidden,

    /// Any other non-2xx response
    #[error("Request failed with status code {status}")]
    Server { status: u16, message: Option<String> },

    /// Network failure, timeout or unreadable body
    #[error("Network error: {0}")]
    Transport(String),
}

pub type Result<T> = std::result::Result<T, DemoError>;
