//! Signed-in user and token handling
//!
//! Token endpoint responses, ID token claim decoding and the persisted
//! [`User`] record.

use crate::error::{DemoError, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Claims that describe the token itself rather than the user
const PROTOCOL_CLAIMS: &[&str] = &[
    "nbf",
    "jti",
    "auth_time",
    "nonce",
    "acr",
    "amr",
    "azp",
    "at_hash",
    "iat",
    "exp",
    "iss",
    "aud",
    "sid",
    "typ",
    "session_state",
];

/// Token response from the OIDC provider
#[derive(Debug, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_state: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// User profile claims
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    #[serde(default)]
    pub groups: Vec<String>,
    /// Any other claim the provider sent
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Claims {
    pub fn from_map(claims: Map<String, Value>) -> Result<Self> {
        serde_json::from_value(Value::Object(claims))
            .map_err(|e| DemoError::Token(format!("Invalid profile claims: {}", e)))
    }

    /// Name to show for the user: `name`, then `preferred_username`
    pub fn display_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .filter(|n| !n.is_empty())
            .or(self.preferred_username.as_deref())
    }
}

/// Session user, replaced wholesale on every login or renew
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub profile: Claims,
    pub access_token: String,
    pub token_type: String,
    /// Unix timestamp when the access token expires
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_state: Option<String>,
}

impl User {
    /// Build a user from a token response received at `now`
    pub fn from_token_response(response: TokenResponse, profile: Claims, now: i64) -> Self {
        User {
            profile,
            access_token: response.access_token,
            token_type: response.token_type,
            expires_at: response.expires_in.map(|exp| now + exp),
            id_token: response.id_token,
            refresh_token: response.refresh_token,
            scope: response.scope,
            session_state: response.session_state,
        }
    }

    /// Seconds until the access token expires
    pub fn expires_in(&self, now: i64) -> Option<i64> {
        self.expires_at.map(|at| at - now)
    }

    /// True once the access token has expired; tokens without expiry never do
    pub fn expired_at(&self, now: i64) -> bool {
        matches!(self.expires_in(now), Some(remaining) if remaining <= 0)
    }

    pub fn expired(&self) -> bool {
        self.expired_at(now())
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.is_some()
    }

    pub fn to_storage_string(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_storage_string(value: &str) -> Result<Self> {
        Ok(serde_json::from_str(value)?)
    }
}

/// Current Unix time in seconds
pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Decode the payload of a JWT without verifying its signature
pub fn decode_jwt_claims(token: &str) -> Result<Map<String, Value>> {
    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| DemoError::Token("Malformed JWT: missing payload".to_string()))?;

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| DemoError::Token(format!("Malformed JWT payload: {}", e)))?;

    match serde_json::from_slice(&bytes)? {
        Value::Object(claims) => Ok(claims),
        _ => Err(DemoError::Token(
            "JWT payload is not a JSON object".to_string(),
        )),
    }
}

/// Drop claims that only describe the token
pub fn filter_protocol_claims(mut claims: Map<String, Value>) -> Map<String, Value> {
    for claim in PROTOCOL_CLAIMS {
        claims.remove(*claim);
    }
    claims
}

/// Merge userinfo claims over ID token claims; the subject must not change
pub fn merge_claims(
    mut claims: Map<String, Value>,
    userinfo: Map<String, Value>,
) -> Result<Map<String, Value>> {
    if let (Some(existing), Some(incoming)) = (claims.get("sub"), userinfo.get("sub")) {
        if existing != incoming {
            return Err(DemoError::Auth(
                "Subject from userinfo does not match subject from ID token".to_string(),
            ));
        }
    }

    for (key, value) in userinfo {
        claims.insert(key, value);
    }
    Ok(claims)
}
