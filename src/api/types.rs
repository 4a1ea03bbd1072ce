//! Backend API response types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// GET /api/public/health
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub service: String,
}

/// GET /api/hello and GET /api/hello/me
///
/// `/me` answers with a personalized greeting, so everything beyond
/// `message` is optional and unknown fields are kept for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HelloResponse {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Claims echoed back by GET /api/hello/userinfo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfoClaims {
    pub sub: Option<String>,
    pub preferred_username: Option<String>,
    pub email: Option<String>,
    pub email_verified: Option<bool>,
    pub name: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub groups: Option<Vec<String>>,
}

/// Token metadata from GET /api/hello/userinfo
///
/// Timestamps are passed through as sent: ISO strings or epoch numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenMetadata {
    pub issuer: Option<String>,
    #[serde(default)]
    pub audience: Vec<String>,
    #[serde(default)]
    pub issued_at: Value,
    #[serde(default)]
    pub expires_at: Value,
}

/// GET /api/hello/userinfo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfoResponse {
    pub principal: String,
    #[serde(default)]
    pub authorities: Vec<String>,
    pub user_info: UserInfoClaims,
    pub token_info: TokenMetadata,
}

/// POST /api/hello/action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminActionResponse {
    pub status: String,
    pub message: String,
    pub performed_by: Option<String>,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_payload: Option<Value>,
}

/// Any successful protected-endpoint response, held for display
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ApiResult {
    Hello(HelloResponse),
    UserInfo(UserInfoResponse),
    AdminAction(AdminActionResponse),
}

impl ApiResult {
    /// Pretty-printed JSON, as shown in the response panel
    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| format!("<unprintable: {}>", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hello_me_keeps_extra_fields() {
        let hello: HelloResponse = serde_json::from_value(json!({
            "message": "Hello, alice!",
            "subject": "abc",
            "groups": ["/ADMIN"]
        }))
        .unwrap();

        assert_eq!(hello.message, "Hello, alice!");
        assert!(hello.roles.is_none());

        let rendered: Value =
            serde_json::from_str(&ApiResult::Hello(hello).to_pretty_json()).unwrap();
        assert_eq!(
            rendered,
            json!({"message": "Hello, alice!", "subject": "abc", "groups": ["/ADMIN"]})
        );
    }

    #[test]
    fn test_userinfo_accepts_numeric_timestamps() {
        let info: UserInfoResponse = serde_json::from_value(json!({
            "principal": "alice",
            "authorities": ["ROLE_ADMIN"],
            "userInfo": {
                "sub": "abc",
                "preferred_username": "alice",
                "email": "alice@example.com",
                "email_verified": true,
                "name": "Alice Admin",
                "given_name": "Alice",
                "family_name": "Admin",
                "groups": ["/ADMIN"]
            },
            "tokenInfo": {
                "issuer": "http://localhost:8180/realms/demo",
                "audience": ["account"],
                "issuedAt": 1704067200.0,
                "expiresAt": "2024-01-01T00:05:00Z"
            }
        }))
        .unwrap();

        assert_eq!(info.user_info.groups, Some(vec!["/ADMIN".to_string()]));
        assert_eq!(info.token_info.audience, vec!["account"]);
        assert_eq!(info.token_info.expires_at, json!("2024-01-01T00:05:00Z"));
    }
}
