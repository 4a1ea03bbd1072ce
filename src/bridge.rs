//! Token bridge
//!
//! Mirrors the session's access token into the API client's bearer slot and
//! tracks whether a token is ready. Protected calls short-circuit to
//! `Ok(None)` while it is not, so no request is sent that is certain to be
//! rejected with 401. Renewal is left to the user manager; the bridge only
//! observes the tokens it publishes.

use crate::api::{AdminActionResponse, ApiClient, HealthResponse, HelloResponse, UserInfoResponse};
use crate::error::ApiError;
use crate::middleware::SharedToken;
use crate::oidc::Session;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

type Gated<T> = Result<Option<T>, ApiError>;

pub struct TokenBridge {
    api: ApiClient,
    token: SharedToken,
    ready: watch::Sender<bool>,
}

impl TokenBridge {
    pub fn new(api: ApiClient) -> Self {
        let token = api.token().clone();
        let (ready, _) = watch::channel(false);
        Self { api, token, ready }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Whether protected calls will be attempted
    pub fn is_token_ready(&self) -> bool {
        *self.ready.borrow()
    }

    /// Watch the token-ready flag
    pub fn subscribe_ready(&self) -> watch::Receiver<bool> {
        self.ready.subscribe()
    }

    /// Apply one session snapshot; unauthenticated sessions bridge no token
    pub fn observe(&self, session: &Session) {
        let next = session
            .access_token()
            .filter(|_| session.is_authenticated)
            .map(str::to_string);
        if self.token.get() != next {
            match next {
                Some(_) => tracing::debug!("Bridged new access token"),
                None => tracing::debug!("Cleared bridged access token"),
            }
        }

        let ready = next.is_some();
        self.token.set(next);
        self.ready.send_if_modified(|current| {
            let changed = *current != ready;
            *current = ready;
            changed
        });
    }

    /// Observe every snapshot published on `sessions` until the sender goes away
    pub fn spawn_observer(self: &Arc<Self>, mut sessions: watch::Receiver<Session>) -> JoinHandle<()> {
        let bridge = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                {
                    let session = sessions.borrow_and_update();
                    bridge.observe(&session);
                }
                if sessions.changed().await.is_err() {
                    break;
                }
            }
        })
    }

    fn gate(&self, endpoint: &str) -> bool {
        let ready = self.is_token_ready();
        if !ready {
            tracing::warn!("No access token available, skipping {}", endpoint);
        }
        ready
    }

    /// Public health check; never gated
    pub async fn get_health(&self) -> Result<HealthResponse, ApiError> {
        self.api.get_health().await.inspect_err(|e| {
            tracing::error!("Health check failed: {}", e);
        })
    }

    /// Public service info; never gated
    pub async fn get_info(&self) -> Result<Value, ApiError> {
        self.api.get_info().await
    }

    pub async fn get_hello(&self) -> Gated<HelloResponse> {
        if !self.gate("hello") {
            return Ok(None);
        }
        self.api.get_hello().await.map(Some).inspect_err(|e| {
            tracing::error!("Failed to call hello endpoint: {}", e);
        })
    }

    pub async fn get_hello_me(&self) -> Gated<HelloResponse> {
        if !self.gate("hello/me") {
            return Ok(None);
        }
        self.api.get_hello_me().await.map(Some).inspect_err(|e| {
            tracing::error!("Failed to call hello/me endpoint: {}", e);
        })
    }

    pub async fn get_user_info(&self) -> Gated<UserInfoResponse> {
        if !self.gate("userinfo") {
            return Ok(None);
        }
        self.api.get_user_info().await.map(Some).inspect_err(|e| {
            tracing::error!("Failed to get user info: {}", e);
        })
    }

    pub async fn perform_admin_action(&self, payload: Option<&Value>) -> Gated<AdminActionResponse> {
        if !self.gate("admin action") {
            return Ok(None);
        }
        self.api
            .perform_admin_action(payload)
            .await
            .map(Some)
            .inspect_err(|e| {
                tracing::error!("Failed to perform admin action: {}", e);
            })
    }
}
