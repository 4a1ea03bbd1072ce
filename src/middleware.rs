//! HTTP middleware for bearer token injection and error classification
//!
//! Implements `reqwest-middleware::Middleware` twice: [`AuthMiddleware`]
//! attaches the bridged access token to outgoing requests, and
//! [`ErrorClassifier`] turns auth-related and other non-2xx responses into
//! an [`ApiError`] in one place for every endpoint.

use crate::error::ApiError;
use async_trait::async_trait;
use http::Extensions;
use reqwest::{Request, Response, StatusCode};
use reqwest_middleware::{Middleware, Next, Result as MiddlewareResult};
use serde::Deserialize;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, error};

/// Access token slot shared between the token bridge and the API client
#[derive(Debug, Clone, Default)]
pub struct SharedToken(Arc<RwLock<Option<String>>>);

impl SharedToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<String> {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set(&self, token: Option<String>) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = token;
    }
}

/// Middleware that injects the current bearer token, if any
pub struct AuthMiddleware {
    token: SharedToken,
}

impl AuthMiddleware {
    pub fn new(token: SharedToken) -> Self {
        Self { token }
    }
}

#[async_trait]
impl Middleware for AuthMiddleware {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> MiddlewareResult<Response> {
        if let Some(token) = self.token.get() {
            req.headers_mut().insert(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {}", token).parse().map_err(|e| {
                    reqwest_middleware::Error::Middleware(anyhow::anyhow!("Invalid token: {}", e))
                })?,
            );
            debug!("Injected Authorization header with bearer token");
        }

        next.run(req, extensions).await
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Middleware that fails non-2xx responses with a classified [`ApiError`]
pub struct ErrorClassifier;

#[async_trait]
impl Middleware for ErrorClassifier {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> MiddlewareResult<Response> {
        let url = req.url().clone();
        let response = next.run(req, extensions).await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let classified = classify(status, &body);
        match classified {
            ApiError::Unauthorized | ApiError::Forbidden => error!("{} ({})", classified, url),
            _ => debug!("{} ({})", classified, url),
        }

        Err(reqwest_middleware::Error::Middleware(classified.into()))
    }
}

/// Map a failed response to an [`ApiError`]
pub fn classify(status: StatusCode, body: &str) -> ApiError {
    match status {
        StatusCode::UNAUTHORIZED => ApiError::Unauthorized,
        StatusCode::FORBIDDEN => ApiError::Forbidden,
        _ => ApiError::Server {
            status: status.as_u16(),
            message: serde_json::from_str::<ErrorBody>(body)
                .ok()
                .and_then(|b| b.message),
        },
    }
}

/// Recover the classified error from a middleware client failure
pub fn into_api_error(err: reqwest_middleware::Error) -> ApiError {
    match err {
        reqwest_middleware::Error::Middleware(e) => match e.downcast::<ApiError>() {
            Ok(api_error) => api_error,
            Err(other) => ApiError::Transport(other.to_string()),
        },
        reqwest_middleware::Error::Reqwest(e) => ApiError::Transport(e.to_string()),
    }
}
