//! Integration tests for the API client, token bridge and endpoint controls
//!
//! Runs against a mocked backend

use keycloak_oidc_demo::api::ApiClient;
use keycloak_oidc_demo::bridge::TokenBridge;
use keycloak_oidc_demo::error::ApiError;
use keycloak_oidc_demo::middleware::SharedToken;
use keycloak_oidc_demo::oidc::{Claims, Session, User};
use keycloak_oidc_demo::view::controller::{ACCESS_DENIED_MESSAGE, UNAUTHORIZED_MESSAGE};
use keycloak_oidc_demo::view::{Endpoint, HelloController, Outcome};
use mockito::{Matcher, ServerGuard};
use serde_json::{json, Value};
use std::time::Duration;

const TOKEN: &str = "token-123";

fn user(access_token: &str) -> User {
    User {
        profile: Claims {
            sub: "abc".to_string(),
            preferred_username: Some("alice".to_string()),
            groups: vec!["/ADMIN".to_string()],
            ..Claims::default()
        },
        access_token: access_token.to_string(),
        token_type: "Bearer".to_string(),
        expires_at: None,
        id_token: None,
        refresh_token: None,
        scope: None,
        session_state: None,
    }
}

fn bridge(server: &ServerGuard) -> TokenBridge {
    let api = ApiClient::new(&server.url(), Duration::from_secs(5), SharedToken::new())
        .expect("Failed to create API client");
    TokenBridge::new(api)
}

fn signed_in_bridge(server: &ServerGuard) -> TokenBridge {
    let bridge = bridge(server);
    bridge.observe(&Session::authenticated(user(TOKEN)));
    assert!(bridge.is_token_ready());
    bridge
}

#[tokio::test]
async fn test_bearer_token_injected_into_protected_calls() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/hello")
        .match_header("authorization", format!("Bearer {}", TOKEN).as_str())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"message":"Hello from a protected endpoint!","user":"alice","timestamp":"2024-05-01T10:00:00Z","roles":["ROLE_ADMIN"]}"#)
        .expect(1)
        .create_async()
        .await;

    let bridge = signed_in_bridge(&server);
    let hello = bridge
        .get_hello()
        .await
        .expect("Call failed")
        .expect("Call was skipped");

    assert_eq!(hello.message, "Hello from a protected endpoint!");
    assert_eq!(hello.user.as_deref(), Some("alice"));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_no_request_without_bridged_token() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let bridge = bridge(&server);
    assert!(!bridge.is_token_ready());

    assert_eq!(bridge.get_hello().await, Ok(None));
    assert_eq!(bridge.get_user_info().await, Ok(None));
    assert_eq!(bridge.perform_admin_action(None).await, Ok(None));

    let controller = HelloController::new();
    assert!(controller
        .trigger(Endpoint::HelloMe, &bridge, true, None)
        .await
        .is_none());

    mock.assert_async().await;
}

#[tokio::test]
async fn test_signout_clears_bridged_token() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/hello")
        .expect(0)
        .create_async()
        .await;

    let bridge = signed_in_bridge(&server);
    bridge.observe(&Session::unauthenticated());

    assert!(!bridge.is_token_ready());
    assert_eq!(bridge.api().token().get(), None);
    assert_eq!(bridge.get_hello().await, Ok(None));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_public_endpoints_are_not_gated() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/public/health")
        .match_header("authorization", Matcher::Missing)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"status":"UP","timestamp":"2024-05-01T10:00:00Z","service":"keycloak-demo-backend"}"#)
        .create_async()
        .await;

    let health = bridge(&server).get_health().await.expect("Health check failed");
    assert_eq!(health.status, "UP");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_forbidden_shows_access_denied() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/api/hello")
        .with_status(403)
        .with_body(r#"{"error":"Forbidden"}"#)
        .create_async()
        .await;

    let bridge = signed_in_bridge(&server);
    assert_eq!(bridge.get_hello().await, Err(ApiError::Forbidden));

    let controller = HelloController::new();
    let outcome = controller
        .trigger(Endpoint::Hello, &bridge, true, None)
        .await;

    assert_eq!(
        outcome,
        Some(Outcome::Error(ACCESS_DENIED_MESSAGE.to_string()))
    );
    assert!(!controller.is_in_flight(Endpoint::Hello));
}

#[tokio::test]
async fn test_unauthorized_asks_for_login() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/api/hello/userinfo")
        .with_status(401)
        .create_async()
        .await;

    let bridge = signed_in_bridge(&server);
    let controller = HelloController::new();
    let outcome = controller
        .trigger(Endpoint::UserInfo, &bridge, true, None)
        .await
        .expect("Control was disabled");

    assert_eq!(outcome.render(), format!("Error: {}", UNAUTHORIZED_MESSAGE));
}

#[tokio::test]
async fn test_server_error_message_passed_through() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/api/hello/me")
        .with_status(500)
        .with_header("content-type", "application/json")
        .with_body(r#"{"message":"Database unavailable"}"#)
        .create_async()
        .await;

    let bridge = signed_in_bridge(&server);
    assert_eq!(
        bridge.get_hello_me().await,
        Err(ApiError::Server {
            status: 500,
            message: Some("Database unavailable".to_string())
        })
    );

    let outcome = HelloController::new()
        .trigger(Endpoint::HelloMe, &bridge, true, None)
        .await;
    assert_eq!(
        outcome,
        Some(Outcome::Error("Database unavailable".to_string()))
    );
}

#[tokio::test]
async fn test_server_error_without_message() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/api/hello")
        .with_status(502)
        .with_body("Bad Gateway")
        .create_async()
        .await;

    let outcome = HelloController::new()
        .trigger(Endpoint::Hello, &signed_in_bridge(&server), true, None)
        .await;
    assert_eq!(
        outcome,
        Some(Outcome::Error(
            "Request failed with status code 502".to_string()
        ))
    );
}

#[tokio::test]
async fn test_admin_action_response_rendered() {
    let mut server = mockito::Server::new_async().await;
    let body = json!({
        "status": "success",
        "message": "Admin action performed",
        "performedBy": "alice",
        "timestamp": "2024-05-01T10:00:00Z",
        "receivedPayload": {"action": "test", "timestamp": "2024-05-01T09:59:59.000Z"}
    });
    let mock = server
        .mock("POST", "/api/hello/action")
        .match_header("authorization", format!("Bearer {}", TOKEN).as_str())
        .match_body(Matcher::Json(json!({"action": "test", "timestamp": "2024-05-01T09:59:59.000Z"})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .create_async()
        .await;

    let bridge = signed_in_bridge(&server);
    let controller = HelloController::new();
    let payload = json!({"action": "test", "timestamp": "2024-05-01T09:59:59.000Z"});
    let rendered = controller
        .trigger(Endpoint::AdminAction, &bridge, true, Some(&payload))
        .await
        .expect("Control was disabled")
        .render();

    let (heading, json_text) = rendered.split_once('\n').expect("No response body");
    assert_eq!(heading, "Response from /api/hello/action");
    assert_eq!(serde_json::from_str::<Value>(json_text).unwrap(), body);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_admin_action_defaults_to_empty_body() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/hello/action")
        .match_body(Matcher::Json(json!({})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"status":"success","message":"Admin action performed","performedBy":"alice","timestamp":"2024-05-01T10:00:00Z"}"#)
        .create_async()
        .await;

    let action = signed_in_bridge(&server)
        .perform_admin_action(None)
        .await
        .expect("Call failed")
        .expect("Call was skipped");

    assert_eq!(action.performed_by.as_deref(), Some("alice"));
    assert!(action.received_payload.is_none());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_userinfo_response_parsed() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/api/hello/userinfo")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "principal": "abc",
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
                    "issuedAt": "2024-05-01T10:00:00Z",
                    "expiresAt": 1714557900
                }
            })
            .to_string(),
        )
        .create_async()
        .await;

    let info = signed_in_bridge(&server)
        .get_user_info()
        .await
        .expect("Call failed")
        .expect("Call was skipped");

    assert_eq!(info.principal, "abc");
    assert_eq!(info.user_info.groups, Some(vec!["/ADMIN".to_string()]));
    assert_eq!(info.token_info.expires_at, json!(1714557900));
}

#[tokio::test]
async fn test_network_error_is_transport() {
    let api = ApiClient::new("http://127.0.0.1:1", Duration::from_secs(2), SharedToken::new())
        .expect("Failed to create API client");

    match api.get_health().await {
        Err(ApiError::Transport(_)) => {}
        other => panic!("expected transport error, got {:?}", other),
    }
}
