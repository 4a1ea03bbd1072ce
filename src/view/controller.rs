//! Protected API controls
//!
//! One control per protected endpoint. A control is disabled while the
//! session is unauthenticated, while no token is bridged, or while its own
//! call is in flight; different controls may run concurrently.

use crate::api::client::{ACTION_PATH, HELLO_ME_PATH, HELLO_PATH, USERINFO_PATH};
use crate::api::ApiResult;
use crate::bridge::TokenBridge;
use crate::error::ApiError;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Mutex, PoisonError};

pub const ACCESS_DENIED_MESSAGE: &str = "Access Denied: You need ADMIN role to access this endpoint";
pub const UNAUTHORIZED_MESSAGE: &str = "Unauthorized: Please login again";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Hello,
    HelloMe,
    UserInfo,
    AdminAction,
}

impl Endpoint {
    pub const ALL: [Endpoint; 4] = [
        Endpoint::Hello,
        Endpoint::HelloMe,
        Endpoint::UserInfo,
        Endpoint::AdminAction,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Hello => HELLO_PATH,
            Endpoint::HelloMe => HELLO_ME_PATH,
            Endpoint::UserInfo => USERINFO_PATH,
            Endpoint::AdminAction => ACTION_PATH,
        }
    }

    pub fn label(&self) -> String {
        let method = match self {
            Endpoint::AdminAction => "POST",
            _ => "GET",
        };
        format!("{} {}", method, self.path())
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Message shown inline for a failed call
pub fn error_message(error: &ApiError) -> String {
    match error {
        ApiError::Forbidden => ACCESS_DENIED_MESSAGE.to_string(),
        ApiError::Unauthorized => UNAUTHORIZED_MESSAGE.to_string(),
        ApiError::Server {
            message: Some(message),
            ..
        } => message.clone(),
        other => other.to_string(),
    }
}

/// Result of the most recent call
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Response { endpoint: Endpoint, result: ApiResult },
    Error(String),
}

impl Outcome {
    pub fn render(&self) -> String {
        match self {
            Outcome::Response { endpoint, result } => format!(
                "Response from {}\n{}",
                endpoint,
                result.to_pretty_json()
            ),
            Outcome::Error(message) => format!("Error: {}", message),
        }
    }
}

#[derive(Debug, Default)]
struct ControllerState {
    in_flight: HashSet<Endpoint>,
    outcome: Option<Outcome>,
}

#[derive(Debug, Default)]
pub struct HelloController {
    state: Mutex<ControllerState>,
}

impl HelloController {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_in_flight(&self, endpoint: Endpoint) -> bool {
        self.lock().in_flight.contains(&endpoint)
    }

    pub fn is_loading(&self) -> bool {
        !self.lock().in_flight.is_empty()
    }

    pub fn is_disabled(&self, endpoint: Endpoint, is_authenticated: bool, token_ready: bool) -> bool {
        !is_authenticated || !token_ready || self.is_in_flight(endpoint)
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.lock().outcome.clone()
    }

    /// Mark the control busy; false when its call is already in flight
    pub fn try_begin(&self, endpoint: Endpoint) -> bool {
        let mut state = self.lock();
        if !state.in_flight.insert(endpoint) {
            return false;
        }
        state.outcome = None;
        true
    }

    /// Record a finished call. A skipped call (`Ok(None)`) clears the panel.
    pub fn finish(&self, endpoint: Endpoint, result: Result<Option<ApiResult>, ApiError>) {
        let mut state = self.lock();
        state.in_flight.remove(&endpoint);
        state.outcome = match result {
            Ok(Some(result)) => Some(Outcome::Response { endpoint, result }),
            Ok(None) => None,
            Err(e) => Some(Outcome::Error(error_message(&e))),
        };
    }

    /// Dispatch a control activation
    ///
    /// Returns the outcome, or `None` when the control was disabled or the
    /// bridge skipped the call.
    pub async fn trigger(
        &self,
        endpoint: Endpoint,
        bridge: &TokenBridge,
        is_authenticated: bool,
        payload: Option<&Value>,
    ) -> Option<Outcome> {
        if self.is_disabled(endpoint, is_authenticated, bridge.is_token_ready()) {
            tracing::debug!("{} is disabled", endpoint.label());
            return None;
        }
        if !self.try_begin(endpoint) {
            return None;
        }

        let result = match endpoint {
            Endpoint::Hello => bridge.get_hello().await.map(|r| r.map(ApiResult::Hello)),
            Endpoint::HelloMe => bridge.get_hello_me().await.map(|r| r.map(ApiResult::Hello)),
            Endpoint::UserInfo => bridge
                .get_user_info()
                .await
                .map(|r| r.map(ApiResult::UserInfo)),
            Endpoint::AdminAction => bridge
                .perform_admin_action(payload)
                .await
                .map(|r| r.map(ApiResult::AdminAction)),
        };

        self.finish(endpoint, result);
        self.outcome()
    }

    pub fn render(&self, is_authenticated: bool, token_ready: bool) -> String {
        let mut out = vec!["🔌 API Endpoints (Protected by ADMIN role)".to_string()];

        if is_authenticated && token_ready {
            out.push("✓ Authenticated - Bearer token ready".to_string());
        }

        let controls: Vec<String> = Endpoint::ALL
            .iter()
            .map(|endpoint| {
                if self.is_disabled(*endpoint, is_authenticated, token_ready) {
                    format!("({} - disabled)", endpoint.label())
                } else {
                    format!("[{}]", endpoint.label())
                }
            })
            .collect();
        out.push(controls.join(" "));

        if !is_authenticated {
            out.push("Please login to access the protected API endpoints.".to_string());
        }
        if self.is_loading() {
            out.push("⏳ Loading...".to_string());
        }
        if let Some(outcome) = self.outcome() {
            out.push(outcome.render());
        }

        out.join("\n")
    }
}
