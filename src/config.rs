//! Configuration parsing and validation
//!
//! Both demo clients read their settings from CLI arguments with environment
//! variable fallbacks, defaulted for a local Keycloak development setup.

use crate::error::{DemoError, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::time::Duration;

const DEFAULT_KEYCLOAK_URL: &str = "http://localhost:8180";
const DEFAULT_REALM: &str = "demo";
const DEFAULT_CLIENT_ID: &str = "react-client";
const DEFAULT_APP_URL: &str = "http://localhost:3000";
const DEFAULT_API_URL: &str = "http://localhost:8080";
const DEFAULT_SCOPES: &str = "openid profile email groups";
const DEFAULT_PKCE_SCOPES: &str = "openid profile email";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const STALE_STATE_AGE_SECS: i64 = 900;

/// Where the session manager persists users and pending sign-in states
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    /// Survives across runs (home directory)
    Local,
    /// Scoped to the machine session (temp directory)
    Session,
}

/// Settings consumed by [`crate::oidc::UserManager`]
#[derive(Debug, Clone)]
pub struct OidcSettings {
    pub authority: String,
    pub client_id: String,
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    pub post_logout_redirect_uri: Option<String>,
    pub scopes: Vec<String>,
    pub storage: StorageKind,
    pub automatic_silent_renew: bool,
    pub load_user_info: bool,
    pub filter_protocol_claims: bool,
    pub revoke_tokens_on_signout: bool,
    pub stale_state_age_secs: i64,
}

impl OidcSettings {
    /// Space-separated scope string as sent to the authorize endpoint
    pub fn scope(&self) -> String {
        self.scopes.join(" ")
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Sign in through the browser (authorization code + PKCE)
    Login,
    /// Complete a sign-in from a pasted redirect URL
    Callback {
        /// The full URL the identity provider redirected to
        url: String,
    },
    /// Sign out and end the provider session
    Logout,
    /// Render the current session, profile and API controls
    Status,
    /// GET /api/public/health
    Health,
    /// GET /api/public/info
    Info,
    /// GET /api/hello
    Hello,
    /// GET /api/hello/me
    HelloMe,
    /// GET /api/hello/userinfo
    Userinfo,
    /// POST /api/hello/action
    Action {
        /// JSON payload (default: {"action":"test","timestamp":<now>})
        #[arg(long)]
        payload: Option<String>,
    },
    /// Interactive shell with silent renew and live token bridging
    Shell,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "keycloak-oidc-demo",
    version,
    about = "Keycloak OAuth2 demo client",
    long_about = "Signs in against a Keycloak realm with authorization code + PKCE and calls a bearer-protected backend API"
)]
pub struct Config {
    /// Base URL of the Keycloak server
    #[arg(long, env = "KEYCLOAK_URL", default_value = DEFAULT_KEYCLOAK_URL)]
    pub keycloak_url: String,

    /// Keycloak realm name
    #[arg(long, env = "KEYCLOAK_REALM", default_value = DEFAULT_REALM)]
    pub realm: String,

    /// OAuth client ID (public client)
    #[arg(long, env = "KEYCLOAK_CLIENT_ID", default_value = DEFAULT_CLIENT_ID)]
    pub client_id: String,

    /// OAuth client secret (optional for public clients)
    #[arg(long, env = "OIDC_CLIENT_SECRET")]
    pub client_secret: Option<String>,

    /// Application URL used to derive redirect URIs
    #[arg(long, env = "APP_URL", default_value = DEFAULT_APP_URL)]
    pub app_url: String,

    /// Callback URL (default: <APP_URL>/callback)
    #[arg(long, env = "OIDC_REDIRECT_URI")]
    pub redirect_uri: Option<String>,

    /// Post-logout redirect URL (default: <APP_URL>)
    #[arg(long, env = "OIDC_POST_LOGOUT_REDIRECT_URI")]
    pub post_logout_redirect_uri: Option<String>,

    /// Space-separated OAuth scopes (default: "openid profile email groups")
    #[arg(long, env = "OIDC_SCOPE")]
    pub scope: Option<String>,

    /// Backend API base URL
    #[arg(long, env = "API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Session storage backend
    #[arg(long, value_enum, env = "OIDC_STORAGE", default_value_t = StorageKind::Local)]
    pub storage: StorageKind,

    /// Per-request timeout for backend API calls, in seconds
    #[arg(long, env = "API_TIMEOUT_SECS", default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS)]
    pub request_timeout_secs: u64,

    /// Disable automatic token renewal before expiry
    #[arg(long)]
    pub no_silent_renew: bool,

    /// Print the login URL instead of opening a browser
    #[arg(long)]
    pub no_browser: bool,

    /// Don't show the banner
    #[arg(long)]
    pub no_banner: bool,

    /// Show only error messages (wins over --debug)
    #[arg(long)]
    pub silent: bool,

    /// Enable debug logging
    #[arg(long, env = "OIDC_DEMO_DEBUG")]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Config {
    /// Parse configuration from CLI arguments and environment variables
    pub fn parse_args() -> Self {
        Config::parse()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.realm.is_empty() {
            return Err(DemoError::Config("Keycloak realm is required".to_string()));
        }

        if self.client_id.is_empty() {
            return Err(DemoError::Config("OIDC client ID is required".to_string()));
        }

        url::Url::parse(&self.keycloak_url)
            .map_err(|e| DemoError::Config(format!("Invalid Keycloak URL: {}", e)))?;

        url::Url::parse(&self.app_url)
            .map_err(|e| DemoError::Config(format!("Invalid application URL: {}", e)))?;

        url::Url::parse(&self.api_url)
            .map_err(|e| DemoError::Config(format!("Invalid API URL: {}", e)))?;

        url::Url::parse(&self.redirect_uri())
            .map_err(|e| DemoError::Config(format!("Invalid redirect URL: {}", e)))?;

        if self.request_timeout_secs == 0 {
            return Err(DemoError::Config(
                "Request timeout must be at least one second".to_string(),
            ));
        }

        Ok(())
    }

    /// Issuer URL of the configured realm
    pub fn issuer(&self) -> String {
        format!("{}/realms/{}", self.keycloak_url.trim_end_matches('/'), self.realm)
    }

    /// Get OAuth scopes as a list (with defaults)
    pub fn scopes(&self) -> Vec<String> {
        parse_scopes(self.scope.as_deref().unwrap_or(DEFAULT_SCOPES))
    }

    /// Get redirect URL (with default)
    pub fn redirect_uri(&self) -> String {
        self.redirect_uri
            .clone()
            .unwrap_or_else(|| format!("{}/callback", self.app_url.trim_end_matches('/')))
    }

    /// Get post-logout redirect URL (with default)
    pub fn post_logout_redirect_uri(&self) -> String {
        self.post_logout_redirect_uri
            .clone()
            .unwrap_or_else(|| self.app_url.clone())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Session manager settings for this realm
    pub fn oidc_settings(&self) -> OidcSettings {
        OidcSettings {
            authority: self.issuer(),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            redirect_uri: self.redirect_uri(),
            post_logout_redirect_uri: Some(self.post_logout_redirect_uri()),
            scopes: self.scopes(),
            storage: self.storage,
            automatic_silent_renew: !self.no_silent_renew,
            load_user_info: true,
            filter_protocol_claims: true,
            revoke_tokens_on_signout: true,
            stale_state_age_secs: STALE_STATE_AGE_SECS,
        }
    }

    /// Get log level based on flags
    pub fn log_level(&self) -> tracing::Level {
        log_level(self.silent, self.debug)
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum PkceCommand {
    /// Sign in (redirect)
    Signin,
    /// Complete a sign-in from a pasted redirect URL
    Callback {
        /// The full URL the identity provider redirected to
        url: String,
    },
    /// Sign out
    Signout,
    /// Show status, claims and the bearer token
    Status,
    /// Call <OIDC_API_BASE_URL>/protected with the bearer token
    CallApi,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "oidc-pkce-demo",
    version,
    about = "OIDC + OAuth2 (PKCE) demo client",
    long_about = "Minimal authorization code + PKCE client that stores its session in session-scoped storage and shows the bearer access token"
)]
pub struct PkceDemoConfig {
    /// OIDC authority (issuer URL)
    #[arg(long, env = "OIDC_AUTHORITY")]
    pub authority: String,

    /// OAuth client ID
    #[arg(long, env = "OIDC_CLIENT_ID")]
    pub client_id: String,

    /// Callback URL registered with the provider
    #[arg(long, env = "OIDC_REDIRECT_URI")]
    pub redirect_uri: String,

    /// Post-logout redirect URL
    #[arg(long, env = "OIDC_POST_LOGOUT_REDIRECT_URI")]
    pub post_logout_redirect_uri: Option<String>,

    /// Space-separated OAuth scopes (default: "openid profile email")
    #[arg(long, env = "OIDC_SCOPE")]
    pub scope: Option<String>,

    /// Base URL of the protected API
    #[arg(long, env = "OIDC_API_BASE_URL")]
    pub api_base_url: String,

    /// Session storage backend
    #[arg(long, value_enum, env = "OIDC_STORAGE", default_value_t = StorageKind::Session)]
    pub storage: StorageKind,

    /// Print the login URL instead of opening a browser
    #[arg(long)]
    pub no_browser: bool,

    /// Show only error messages (wins over --debug)
    #[arg(long)]
    pub silent: bool,

    /// Enable debug logging
    #[arg(long, env = "OIDC_DEMO_DEBUG")]
    pub debug: bool,

    #[command(subcommand)]
    pub command: PkceCommand,
}

impl PkceDemoConfig {
    pub fn parse_args() -> Self {
        PkceDemoConfig::parse()
    }

    pub fn validate(&self) -> Result<()> {
        if self.client_id.is_empty() {
            return Err(DemoError::Config("OIDC client ID is required".to_string()));
        }

        url::Url::parse(&self.authority)
            .map_err(|e| DemoError::Config(format!("Invalid OIDC authority: {}", e)))?;

        url::Url::parse(&self.redirect_uri)
            .map_err(|e| DemoError::Config(format!("Invalid redirect URL: {}", e)))?;

        url::Url::parse(&self.api_base_url)
            .map_err(|e| DemoError::Config(format!("Invalid API base URL: {}", e)))?;

        if let Some(ref uri) = self.post_logout_redirect_uri {
            url::Url::parse(uri)
                .map_err(|e| DemoError::Config(format!("Invalid post-logout redirect URL: {}", e)))?;
        }

        Ok(())
    }

    pub fn scopes(&self) -> Vec<String> {
        parse_scopes(self.scope.as_deref().unwrap_or(DEFAULT_PKCE_SCOPES))
    }

    pub fn oidc_settings(&self) -> OidcSettings {
        OidcSettings {
            authority: self.authority.trim_end_matches('/').to_string(),
            client_id: self.client_id.clone(),
            client_secret: None,
            redirect_uri: self.redirect_uri.clone(),
            post_logout_redirect_uri: self.post_logout_redirect_uri.clone(),
            scopes: self.scopes(),
            storage: self.storage,
            automatic_silent_renew: true,
            load_user_info: false,
            filter_protocol_claims: true,
            revoke_tokens_on_signout: true,
            stale_state_age_secs: STALE_STATE_AGE_SECS,
        }
    }

    pub fn log_level(&self) -> tracing::Level {
        log_level(self.silent, self.debug)
    }
}

/// Split a scope string, ensuring "openid" is always included
fn parse_scopes(scopes_str: &str) -> Vec<String> {
    let mut scopes: Vec<String> = scopes_str.split_whitespace().map(String::from).collect();

    if !scopes.iter().any(|s| s == "openid") {
        scopes.insert(0, "openid".to_string());
    }

    scopes
}

fn log_level(silent: bool, debug: bool) -> tracing::Level {
    if silent {
        tracing::Level::ERROR
    } else if debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    }
}
