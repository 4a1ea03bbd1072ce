//! Callback route
//!
//! Short-lived loopback HTTP server standing in for the application's
//! callback route. It hands the raw redirect parameters to the user manager,
//! which validates them against the persisted sign-in state.

use crate::error::{DemoError, Result};
use axum::{
    extract::Query,
    response::{Html, IntoResponse},
    routing::get,
    Router,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use url::Url;

const CALLBACK_TIMEOUT_SECS: u64 = 300;

type CallbackSender = Arc<Mutex<Option<oneshot::Sender<CallbackParams>>>>;

/// Query parameters the provider appends to the redirect URI
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub session_state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl CallbackParams {
    /// Parse the parameters out of a full redirect URL
    pub fn from_url(url: &str) -> Result<Self> {
        let url = Url::parse(url)?;
        let mut params = CallbackParams::default();

        for (key, value) in url.query_pairs() {
            let value = Some(value.into_owned());
            match key.as_ref() {
                "code" => params.code = value,
                "state" => params.state = value,
                "session_state" => params.session_state = value,
                "error" => params.error = value,
                "error_description" => params.error_description = value,
                _ => {}
            }
        }

        Ok(params)
    }
}

/// Router serving `path`; the first request's parameters go to `tx`
pub fn callback_router(path: &str, tx: oneshot::Sender<CallbackParams>) -> Router {
    let tx: CallbackSender = Arc::new(Mutex::new(Some(tx)));

    Router::new().route(
        path,
        get(move |Query(params): Query<CallbackParams>| {
            let tx = tx.clone();
            async move { handle_callback(params, tx).await }
        }),
    )
}

/// Run the callback server and wait for the provider's redirect
pub async fn run_callback_server(port: u16, path: &str) -> Result<CallbackParams> {
    let (tx, rx) = oneshot::channel::<CallbackParams>();
    let app = callback_router(path, tx);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));

    tracing::info!("Callback server listening on http://{}{}", addr, path);

    let server = axum::serve(tokio::net::TcpListener::bind(addr).await?, app);

    tokio::select! {
        result = rx => {
            result.map_err(|_| DemoError::Callback("Callback channel closed".to_string()))
        }
        _ = tokio::time::sleep(tokio::time::Duration::from_secs(CALLBACK_TIMEOUT_SECS)) => {
            Err(DemoError::Timeout(format!(
                "OAuth callback timed out after {} seconds",
                CALLBACK_TIMEOUT_SECS
            )))
        }
        server_result = server => {
            server_result?;
            Err(DemoError::Callback("Server stopped unexpectedly".to_string()))
        }
    }
}

async fn handle_callback(params: CallbackParams, tx: CallbackSender) -> impl IntoResponse {
    let page = match (&params.error, &params.code) {
        (Some(error), _) => failure_page(&format!(
            "{} - {}",
            error,
            params
                .error_description
                .as_deref()
                .unwrap_or("No description provided")
        )),
        (None, Some(_)) if params.state.is_some() => success_page(),
        _ => failure_page("Missing code or state parameter in callback"),
    };

    if let Some(sender) = tx.lock().await.take() {
        let _ = sender.send(params);
    }

    page
}

fn success_page() -> Html<String> {
    Html(
        r#"
        <html>
            <head><title>Signing you in…</title></head>
            <body>
                <h2>Signing you in…</h2>
                <p>You can close this window and return to your terminal.</p>
            </body>
        </html>
        "#
        .to_string(),
    )
}

fn failure_page(message: &str) -> Html<String> {
    Html(format!(
        r#"
        <html>
            <head><title>Authentication Failed</title></head>
            <body>
                <h2>Authentication Failed</h2>
                <p>{}</p>
                <p>Check your redirect URI and IdP client settings.</p>
            </body>
        </html>
        "#,
        message
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http::{Request, StatusCode};
    use tower::ServiceExt;

    #[test]
    fn test_params_from_url() {
        let params = CallbackParams::from_url(
            "http://localhost:3000/callback?state=abc&session_state=s1&code=xyz&iss=ignored",
        )
        .unwrap();
        assert_eq!(params.code.as_deref(), Some("xyz"));
        assert_eq!(params.state.as_deref(), Some("abc"));
        assert_eq!(params.session_state.as_deref(), Some("s1"));
        assert!(params.error.is_none());
    }

    #[test]
    fn test_error_params_from_url() {
        let params = CallbackParams::from_url(
            "http://localhost:3000/callback?error=access_denied&error_description=User%20cancelled&state=abc",
        )
        .unwrap();
        assert_eq!(params.error.as_deref(), Some("access_denied"));
        assert_eq!(params.error_description.as_deref(), Some("User cancelled"));
    }

    #[tokio::test]
    async fn test_router_forwards_params() {
        let (tx, rx) = oneshot::channel();
        let app = callback_router("/callback", tx);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/callback?code=xyz&state=abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let params = rx.await.unwrap();
        assert_eq!(params.code.as_deref(), Some("xyz"));
        assert_eq!(params.state.as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn test_router_forwards_provider_errors() {
        let (tx, rx) = oneshot::channel();
        let app = callback_router("/callback", tx);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/callback?error=access_denied&state=abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(rx.await.unwrap().error.as_deref(), Some("access_denied"));
    }
}
