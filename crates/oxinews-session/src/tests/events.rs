//! Auth change notification tests.

use super::harness::{expired_session, harness, settle, valid_session, Calls, FakeAuth};
use crate::{AuthChange, AuthEvent, AuthStatus};
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn signed_in_event_authenticates_and_goes_to_dashboard() {
    let h = harness(FakeAuth::new(), "/login");
    h.controller.mount().await;
    assert_eq!(h.controller.status(), AuthStatus::Unauthenticated);

    h.auth.emit(AuthEvent::SignedIn, Some(valid_session("user-7")));
    settle().await;

    let snapshot = h.controller.snapshot();
    assert_eq!(snapshot.status, AuthStatus::Authenticated);
    assert_eq!(Calls::count(&h.auth.calls.get_user), 1);
    assert_eq!(h.router.history(), vec!["/dashboard"]);
}

#[tokio::test(start_paused = true)]
async fn token_refresh_keeps_visitor_in_place() {
    let h = harness(
        FakeAuth::new().with_session(Some(valid_session("user-1"))),
        "/feeds",
    );
    h.controller.mount().await;
    let before = h.controller.store().revision();

    h.auth
        .emit(AuthEvent::TokenRefreshed, Some(valid_session("user-1")));
    settle().await;

    assert_eq!(h.controller.status(), AuthStatus::Authenticated);
    assert_eq!(h.controller.store().revision(), before + 1);
    assert!(h.router.history().is_empty());
}

#[tokio::test(start_paused = true)]
async fn signed_out_event_schedules_one_login_navigation() {
    let h = harness(
        FakeAuth::new().with_session(Some(valid_session("user-1"))),
        "/dashboard",
    );
    h.controller.mount().await;

    h.auth.emit(AuthEvent::SignedOut, None);

    // Navigation waits for the next frame
    tokio::time::sleep(Duration::from_millis(5)).await;
    assert_eq!(h.controller.status(), AuthStatus::Unauthenticated);
    assert!(h.router.history().is_empty());

    settle().await;
    assert_eq!(h.router.history(), vec!["/login"]);
}

#[tokio::test(start_paused = true)]
async fn signed_out_event_on_auth_route_does_not_navigate() {
    for path in ["/login", "/signup", "/auth/callback"] {
        let h = harness(FakeAuth::new(), path);
        h.controller.mount().await;

        h.auth.emit(AuthEvent::SignedOut, None);
        settle().await;

        assert_eq!(h.controller.status(), AuthStatus::Unauthenticated);
        assert!(h.router.history().is_empty(), "navigated away from {}", path);
    }
}

#[tokio::test(start_paused = true)]
async fn event_with_expired_session_signs_out() {
    let h = harness(FakeAuth::new(), "/feeds");
    h.controller.mount().await;

    h.auth
        .emit(AuthEvent::TokenRefreshed, Some(expired_session()));
    settle().await;

    assert_eq!(Calls::count(&h.auth.calls.sign_out), 1);
    assert_eq!(Calls::count(&h.auth.calls.get_user), 0);
    assert_eq!(h.controller.status(), AuthStatus::Unauthenticated);
    assert_eq!(h.router.navigations_to("/login"), 1);
}

#[tokio::test(start_paused = true)]
async fn event_is_dropped_while_lock_is_held() {
    let h = harness(FakeAuth::new(), "/");
    h.controller.mount().await;
    let before = h.controller.store().revision();

    let ticket = h.controller.lock().try_acquire().unwrap();
    h.controller
        .handle_auth_change(AuthChange::new(
            AuthEvent::SignedIn,
            Some(valid_session("user-1")),
        ))
        .await;

    assert_eq!(Calls::count(&h.auth.calls.get_user), 0);
    assert_eq!(h.controller.store().revision(), before);
    assert_eq!(h.controller.status(), AuthStatus::Unauthenticated);
    assert!(h.controller.lock().release(&ticket));
}

#[tokio::test(start_paused = true)]
async fn back_to_back_events_apply_once() {
    let h = harness(
        FakeAuth::new().with_user_delay(Duration::from_millis(100)),
        "/",
    );
    h.controller.mount().await;
    let before = h.controller.store().revision();

    let first = AuthChange::new(AuthEvent::SignedIn, Some(valid_session("user-1")));
    let second = AuthChange::new(AuthEvent::TokenRefreshed, Some(valid_session("user-1")));
    tokio::join!(
        h.controller.handle_auth_change(first),
        h.controller.handle_auth_change(second),
    );

    assert_eq!(Calls::count(&h.auth.calls.get_user), 1);
    assert_eq!(h.controller.store().revision(), before + 1);
    assert_eq!(h.controller.status(), AuthStatus::Authenticated);
    assert_eq!(h.router.history(), vec!["/dashboard"]);
}

#[tokio::test(start_paused = true)]
async fn back_to_back_notifications_apply_once() {
    let h = harness(
        FakeAuth::new().with_user_delay(Duration::from_millis(100)),
        "/",
    );
    h.controller.mount().await;
    let before = h.controller.store().revision();

    h.auth.emit(AuthEvent::SignedIn, Some(valid_session("user-1")));
    h.auth.emit(AuthEvent::SignedIn, Some(valid_session("user-1")));
    settle().await;

    assert_eq!(Calls::count(&h.auth.calls.get_user), 1);
    assert_eq!(h.controller.store().revision(), before + 1);
    assert_eq!(h.router.navigations_to("/dashboard"), 1);
}

#[tokio::test(start_paused = true)]
async fn subscribers_observe_event_driven_changes() {
    let h = harness(FakeAuth::new(), "/feeds");
    h.controller.mount().await;
    let mut rx = h.controller.subscribe();

    h.auth.emit(AuthEvent::SignedIn, Some(valid_session("user-1")));
    rx.changed().await.unwrap();

    assert_eq!(rx.borrow().status, AuthStatus::Authenticated);
}

#[tokio::test(start_paused = true)]
async fn teardown_stops_listening() {
    let h = harness(FakeAuth::new(), "/");
    h.controller.mount().await;

    h.controller.teardown();
    h.auth.emit(AuthEvent::SignedIn, Some(valid_session("user-1")));
    settle().await;

    assert_eq!(h.controller.status(), AuthStatus::Unauthenticated);
    assert_eq!(Calls::count(&h.auth.calls.get_user), 0);
}

#[tokio::test(start_paused = true)]
async fn wait_for_times_out_when_status_never_matches() {
    let h = harness(FakeAuth::new(), "/");
    h.controller.mount().await;

    let result = h
        .controller
        .wait_for(Duration::from_millis(100), |s| s.is_authenticated())
        .await;
    assert!(matches!(result, Err(crate::AuthError::Timeout)));
}

#[tokio::test(start_paused = true)]
async fn wait_reports_closed_state_channel() {
    let store = crate::AuthStore::new();
    let rx = store.subscribe();
    drop(store);

    let result =
        crate::controller::wait_on(rx, Duration::from_secs(1), |s| s.is_authenticated()).await;
    assert!(matches!(result, Err(crate::AuthError::StateClosed)));
}
