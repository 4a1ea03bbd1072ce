//! OIDC provider discovery
//!
//! Fetches provider metadata from /.well-known/openid-configuration and checks
//! it belongs to the configured authority.

use crate::error::{DemoError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DISCOVERY_TIMEOUT_SECS: u64 = 5;
const WELL_KNOWN_PATH: &str = "/.well-known/openid-configuration";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OidcConfig {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    #[serde(default)]
    pub userinfo_endpoint: Option<String>,
    #[serde(default)]
    pub end_session_endpoint: Option<String>,
    #[serde(default)]
    pub revocation_endpoint: Option<String>,
    #[serde(default)]
    pub jwks_uri: Option<String>,
}

impl OidcConfig {
    /// Fetch and check the metadata of `authority`
    pub async fn discover(http: &reqwest::Client, authority: &str) -> Result<Self> {
        let authority = authority.trim_end_matches('/');
        let failed = |reason: String| DemoError::Discovery(format!("{} ({})", reason, authority));

        let url = format!("{}{}", authority, WELL_KNOWN_PATH);
        tracing::debug!("Fetching OIDC metadata from {}", url);

        let response = http
            .get(&url)
            .timeout(Duration::from_secs(DISCOVERY_TIMEOUT_SECS))
            .send()
            .await
            .map_err(|e| failed(format!("Metadata request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(failed(format!("Metadata request returned status {}", status)));
        }

        let config: OidcConfig = response
            .json()
            .await
            .map_err(|e| failed(format!("Unreadable metadata: {}", e)))?;

        config.check(authority).map_err(failed)?;
        Ok(config)
    }

    /// Reject metadata issued for another authority or lacking the code-flow endpoints
    fn check(&self, authority: &str) -> std::result::Result<(), String> {
        if self.issuer.trim_end_matches('/') != authority {
            return Err(format!("Metadata issuer {} does not match", self.issuer));
        }

        for (name, value) in [
            ("authorization_endpoint", &self.authorization_endpoint),
            ("token_endpoint", &self.token_endpoint),
        ] {
            if value.is_empty() {
                return Err(format!("Metadata has no {}", name));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn metadata(issuer: &str, token_endpoint: &str) -> String {
        json!({
            "issuer": issuer,
            "authorization_endpoint": format!("{}/auth", issuer),
            "token_endpoint": token_endpoint,
            "end_session_endpoint": format!("{}/logout", issuer),
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_discover_with_trailing_slash_authority() {
        let mut server = mockito::Server::new_async().await;
        let body = metadata(&server.url(), &format!("{}/token", server.url()));
        let _mock = server
            .mock("GET", WELL_KNOWN_PATH)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await;

        let config = OidcConfig::discover(&reqwest::Client::new(), &format!("{}/", server.url()))
            .await
            .unwrap();
        assert_eq!(config.token_endpoint, format!("{}/token", server.url()));
        assert_eq!(
            config.end_session_endpoint,
            Some(format!("{}/logout", server.url()))
        );
        assert!(config.revocation_endpoint.is_none());
    }

    #[tokio::test]
    async fn test_foreign_issuer_rejected() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", WELL_KNOWN_PATH)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(metadata("https://other.example.com/realms/demo", "https://other.example.com/token"))
            .create_async()
            .await;

        let err = OidcConfig::discover(&reqwest::Client::new(), &server.url())
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("does not match"));
        assert!(message.contains(&server.url()));
    }

    #[tokio::test]
    async fn test_missing_token_endpoint_rejected() {
        let mut server = mockito::Server::new_async().await;
        let body = metadata(&server.url(), "");
        let _mock = server
            .mock("GET", WELL_KNOWN_PATH)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await;

        let err = OidcConfig::discover(&reqwest::Client::new(), &server.url())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Metadata has no token_endpoint"));
    }

    #[tokio::test]
    async fn test_error_status_names_authority() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", WELL_KNOWN_PATH)
            .with_status(404)
            .create_async()
            .await;

        let err = OidcConfig::discover(&reqwest::Client::new(), &server.url())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            format!(
                "OIDC discovery failed: Metadata request returned status 404 Not Found ({})",
                server.url()
            )
        );
    }
}
