//! Backend API client
//!
//! Wraps the backend's public and protected endpoints. The bearer token comes
//! from the [`SharedToken`] handed to [`ApiClient::new`]; error
//! classification is done by the middleware stack, not per call.

use super::types::{AdminActionResponse, HealthResponse, HelloResponse, UserInfoResponse};
use crate::error::{ApiError, DemoError, Result};
use crate::middleware::{into_api_error, AuthMiddleware, ErrorClassifier, SharedToken};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

pub const HEALTH_PATH: &str = "/api/public/health";
pub const INFO_PATH: &str = "/api/public/info";
pub const HELLO_PATH: &str = "/api/hello";
pub const HELLO_ME_PATH: &str = "/api/hello/me";
pub const USERINFO_PATH: &str = "/api/hello/userinfo";
pub const ACTION_PATH: &str = "/api/hello/action";

type CallResult<T> = std::result::Result<T, ApiError>;

#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    http: ClientWithMiddleware,
    token: SharedToken,
}

impl ApiClient {
    /// Create a client for `base_url` signing requests with `token`
    pub fn new(base_url: &str, timeout: Duration, token: SharedToken) -> Result<Self> {
        url::Url::parse(base_url)
            .map_err(|e| DemoError::Config(format!("Invalid API URL: {}", e)))?;

        let inner = reqwest::Client::builder().timeout(timeout).build()?;
        let http = ClientBuilder::new(inner)
            .with(AuthMiddleware::new(token.clone()))
            .with(ErrorClassifier)
            .build();

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            token,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The token slot this client signs requests with
    pub fn token(&self) -> &SharedToken {
        &self.token
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> CallResult<T> {
        let response = request.send().await.map_err(into_api_error)?;
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))
    }

    pub async fn get_health(&self) -> CallResult<HealthResponse> {
        self.execute(self.http.get(self.url(HEALTH_PATH))).await
    }

    pub async fn get_info(&self) -> CallResult<Value> {
        self.execute(self.http.get(self.url(INFO_PATH))).await
    }

    pub async fn get_hello(&self) -> CallResult<HelloResponse> {
        self.execute(self.http.get(self.url(HELLO_PATH))).await
    }

    pub async fn get_hello_me(&self) -> CallResult<HelloResponse> {
        self.execute(self.http.get(self.url(HELLO_ME_PATH))).await
    }

    pub async fn get_user_info(&self) -> CallResult<UserInfoResponse> {
        self.execute(self.http.get(self.url(USERINFO_PATH))).await
    }

    /// POST the payload, or `{}` when none is given
    pub async fn perform_admin_action(
        &self,
        payload: Option<&Value>,
    ) -> CallResult<AdminActionResponse> {
        let empty = Value::Object(serde_json::Map::new());
        let body = payload.unwrap_or(&empty);
        self.execute(self.http.post(self.url(ACTION_PATH)).json(body))
            .await
    }
}
