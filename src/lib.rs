//! Keycloak OIDC Demo Library
//!
//! Authorization code + PKCE session management against Keycloak, a token
//! bridge into a bearer-authenticated API client, and the text views shared
//! by the demo binaries.

pub mod api;
pub mod bridge;
pub mod config;
pub mod error;
pub mod middleware;
pub mod navigation;
pub mod oidc;
pub mod shell;
pub mod view;
