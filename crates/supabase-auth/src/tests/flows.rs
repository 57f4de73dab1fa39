//! Request and session handling against the mock server.

use super::harness::{client_for, token_reply, user_reply, MockGoTrue};
use chrono::Utc;
use oxinews_session::{
    AuthError, AuthEvent, AuthService, AuthStatus, ControllerConfig, MemoryRouter, Router,
    Session, SessionController,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn expired_session() -> Session {
    serde_json::from_value(json!({
        "access_token": "stale-access",
        "refresh_token": "stale-refresh",
        "expires_at": Utc::now().timestamp() - 10,
        "user": user_reply("user-1")
    }))
    .unwrap()
}

/// Navigation runs after the store commit, so poll for it.
async fn wait_for_path(router: &MemoryRouter, path: &str) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while router.current_path() != path {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn password_sign_in_stores_session_and_broadcasts() {
    let mock = MockGoTrue::start().await;
    mock.respond("POST", "/auth/v1/token", 200, token_reply("user-1"));
    let client = client_for(&mock);
    let mut changes = client.on_auth_state_change();

    client
        .sign_in_with_password("reader@example.com", "hunter22")
        .await
        .unwrap();

    let session = client.current_session().unwrap();
    assert_eq!(session.access_token, "access-user-1");
    assert_eq!(session.user_id(), Some("user-1"));

    let change = changes.recv().await.unwrap();
    assert_eq!(change.event, AuthEvent::SignedIn);
    assert_eq!(change.session, Some(session));

    let request = mock.last_request("/auth/v1/token").unwrap();
    assert_eq!(request.method, "POST");
    assert_eq!(request.target, "/auth/v1/token?grant_type=password");
    assert_eq!(request.header("apikey"), Some("test-anon-key"));
    assert_eq!(
        request.json(),
        json!({ "email": "reader@example.com", "password": "hunter22" })
    );
}

#[tokio::test]
async fn rejected_credentials_leave_no_session() {
    let mock = MockGoTrue::start().await;
    mock.respond(
        "POST",
        "/auth/v1/token",
        400,
        json!({ "error_code": "invalid_credentials", "msg": "Invalid login credentials" }),
    );
    let client = client_for(&mock);

    let err = client
        .sign_in_with_password("reader@example.com", "wrong")
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::InvalidCredentials(ref m) if m == "Invalid login credentials"));
    assert!(client.current_session().is_none());
}

#[tokio::test]
async fn get_user_sends_bearer_token() {
    let mock = MockGoTrue::start().await;
    mock.respond("POST", "/auth/v1/token", 200, token_reply("user-1"));
    mock.respond("GET", "/auth/v1/user", 200, user_reply("user-1"));
    let client = client_for(&mock);
    client
        .sign_in_with_password("reader@example.com", "hunter22")
        .await
        .unwrap();

    let user = client.get_user().await.unwrap();

    assert_eq!(user.id, "user-1");
    assert_eq!(user.email.as_deref(), Some("user-1@example.com"));
    let request = mock.last_request("/auth/v1/user").unwrap();
    assert_eq!(request.header("authorization"), Some("Bearer access-user-1"));
}

#[tokio::test]
async fn revoked_token_is_session_invalid() {
    let mock = MockGoTrue::start().await;
    mock.respond("GET", "/auth/v1/user", 401, json!({ "message": "invalid JWT" }));
    let client = client_for(&mock).without_auto_refresh();
    client.set_session(expired_session());

    let err = client.get_user().await.unwrap_err();
    assert!(matches!(err, AuthError::SessionInvalid(_)));
}

#[tokio::test]
async fn sign_up_without_autoconfirm_stores_nothing() {
    let mock = MockGoTrue::start().await;
    mock.respond("POST", "/auth/v1/signup", 200, user_reply("user-2"));
    let client = client_for(&mock);

    client
        .sign_up(
            "new@example.com",
            "hunter22",
            Some(json!({ "full_name": "Ada Reader" })),
        )
        .await
        .unwrap();

    assert!(client.current_session().is_none());
    let request = mock.last_request("/auth/v1/signup").unwrap();
    assert_eq!(
        request.json(),
        json!({
            "email": "new@example.com",
            "password": "hunter22",
            "data": { "full_name": "Ada Reader" }
        })
    );
}

#[tokio::test]
async fn sign_up_with_autoconfirm_signs_in() {
    let mock = MockGoTrue::start().await;
    mock.respond("POST", "/auth/v1/signup", 200, token_reply("user-2"));
    let client = client_for(&mock);
    let mut changes = client.on_auth_state_change();

    client
        .sign_up("new@example.com", "hunter22", None)
        .await
        .unwrap();

    assert_eq!(client.current_session().unwrap().user_id(), Some("user-2"));
    assert_eq!(changes.recv().await.unwrap().event, AuthEvent::SignedIn);
    assert_eq!(
        mock.last_request("/auth/v1/signup").unwrap().json()["data"],
        json!({})
    );
}

#[tokio::test]
async fn duplicate_sign_up_is_rejected() {
    let mock = MockGoTrue::start().await;
    mock.respond(
        "POST",
        "/auth/v1/signup",
        422,
        json!({ "code": 422, "error_code": "user_already_exists", "msg": "User already registered" }),
    );
    let client = client_for(&mock);

    let err = client
        .sign_up("taken@example.com", "hunter22", None)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Rejected { status: 422, .. }));
}

#[tokio::test]
async fn sign_out_clears_session_and_broadcasts() {
    let mock = MockGoTrue::start().await;
    mock.respond("POST", "/auth/v1/token", 200, token_reply("user-1"));
    mock.respond("POST", "/auth/v1/logout", 200, json!({}));
    let client = client_for(&mock);
    client
        .sign_in_with_password("reader@example.com", "hunter22")
        .await
        .unwrap();
    let mut changes = client.on_auth_state_change();

    client.sign_out().await.unwrap();

    assert!(client.current_session().is_none());
    let change = changes.recv().await.unwrap();
    assert_eq!(change.event, AuthEvent::SignedOut);
    assert!(change.session.is_none());
    let request = mock.last_request("/auth/v1/logout").unwrap();
    assert_eq!(request.header("authorization"), Some("Bearer access-user-1"));
}

#[tokio::test]
async fn sign_out_server_error_still_clears_locally() {
    let mock = MockGoTrue::start().await;
    mock.respond("POST", "/auth/v1/logout", 500, json!({ "msg": "database unavailable" }));
    let client = client_for(&mock);
    client.set_session(expired_session());

    let err = client.sign_out().await.unwrap_err();

    assert!(matches!(err, AuthError::Service { status: 500, .. }));
    assert!(client.current_session().is_none());
}

#[tokio::test]
async fn sign_out_with_revoked_token_succeeds() {
    let mock = MockGoTrue::start().await;
    mock.respond("POST", "/auth/v1/logout", 401, json!({ "msg": "invalid JWT" }));
    let client = client_for(&mock);
    client.set_session(expired_session());

    client.sign_out().await.unwrap();
    assert!(client.current_session().is_none());
}

#[tokio::test]
async fn sign_out_without_session_skips_the_server() {
    let mock = MockGoTrue::start().await;
    let client = client_for(&mock);

    client.sign_out().await.unwrap();
    assert!(mock.requests().is_empty());
}

#[tokio::test]
async fn expired_session_is_refreshed_on_lookup() {
    let mock = MockGoTrue::start().await;
    mock.respond("POST", "/auth/v1/token", 200, token_reply("user-1"));
    let client = client_for(&mock);
    client.set_session(expired_session());
    let mut changes = client.on_auth_state_change();

    let session = client.get_session().await.unwrap().unwrap();

    assert_eq!(session.access_token, "access-user-1");
    assert_eq!(changes.recv().await.unwrap().event, AuthEvent::TokenRefreshed);
    let request = mock.last_request("/auth/v1/token").unwrap();
    assert_eq!(request.target, "/auth/v1/token?grant_type=refresh_token");
    assert_eq!(request.json(), json!({ "refresh_token": "stale-refresh" }));
}

#[tokio::test]
async fn rejected_refresh_clears_session() {
    let mock = MockGoTrue::start().await;
    mock.respond(
        "POST",
        "/auth/v1/token",
        400,
        json!({ "error_code": "refresh_token_not_found", "msg": "Invalid Refresh Token" }),
    );
    let client = client_for(&mock);
    client.set_session(expired_session());
    let mut changes = client.on_auth_state_change();

    let err = client.get_session().await.unwrap_err();

    assert!(matches!(err, AuthError::TokenRefresh(_)));
    assert!(client.current_session().is_none());
    assert_eq!(changes.recv().await.unwrap().event, AuthEvent::SignedOut);
}

#[tokio::test]
async fn failed_refresh_on_server_error_keeps_session() {
    let mock = MockGoTrue::start().await;
    mock.respond("POST", "/auth/v1/token", 503, json!({ "msg": "try again" }));
    let client = client_for(&mock);
    client.set_session(expired_session());

    let err = client.get_session().await.unwrap_err();

    assert!(matches!(err, AuthError::TokenRefresh(_)));
    assert!(client.current_session().is_some());
}

#[tokio::test]
async fn controller_follows_sign_in_and_sign_out() {
    let mock = MockGoTrue::start().await;
    mock.respond("POST", "/auth/v1/token", 200, token_reply("user-1"));
    mock.respond("GET", "/auth/v1/user", 200, user_reply("user-1"));
    mock.respond("POST", "/auth/v1/logout", 200, json!({}));

    let client = Arc::new(client_for(&mock));
    let router = Arc::new(MemoryRouter::new("/login"));
    let controller =
        SessionController::new(client.clone(), router.clone(), ControllerConfig::default());
    controller.mount().await;
    assert_eq!(controller.status(), AuthStatus::Unauthenticated);

    controller
        .sign_in("reader@example.com", "hunter22")
        .await
        .unwrap();
    let snapshot = controller
        .wait_for(Duration::from_secs(5), |s| s.is_authenticated())
        .await
        .unwrap();
    assert_eq!(snapshot.user_id(), Some("user-1"));
    wait_for_path(&router, "/dashboard").await;
    assert_eq!(router.history(), vec!["/dashboard"]);

    controller.sign_out().await;
    let snapshot = controller
        .wait_for(Duration::from_secs(5), |s| s.status == AuthStatus::Unauthenticated)
        .await
        .unwrap();
    assert!(snapshot.session.is_none());
    assert!(client.current_session().is_none());
    assert_eq!(router.current_path(), "/login");

    controller.teardown();
}
