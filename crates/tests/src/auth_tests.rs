use std::time::Duration;

use drive_open_services::sdk::TokenResponse;
use drive_open_services::session::{AuthPhase, KeyValueStore};
use drive_open_services::wait::BoundedWait;
use serde_json::json;

use crate::fixtures::fake_sdk::IdentityBehavior;
use crate::fixtures::test_session::{TOKEN_KEY, TestSession};

fn short_wait() -> BoundedWait {
    BoundedWait::new(Duration::from_millis(20), 25)
}

/// Waits until the pending authorization task has settled.
async fn settle(t: &TestSession) {
    let outcome = short_wait()
        .until(|| (!t.session.auth.is_in_flight()).then_some(()))
        .await;
    assert!(outcome.is_ready(), "authorization never settled");
}

// --- restore ---

#[tokio::test]
async fn restore_without_record_stays_signed_out() {
    let t = TestSession::spawn();

    assert!(!t.session.auth.restore_auth().await);
    assert!(!t.session.state.is_authenticated());
    assert!(t.sdk.drive.token().is_none());
}

#[tokio::test]
async fn restore_valid_record_installs_remaining_lifetime() {
    let t = TestSession::spawn();
    t.seed_token("ya29.saved", 3599, 600);

    assert!(t.session.auth.restore_auth().await);
    assert!(t.session.state.is_authenticated());
    assert_eq!(t.session.state.phase(), AuthPhase::Authenticated);

    let token = t.sdk.drive.token().unwrap();
    assert_eq!(token.access_token, "ya29.saved");
    // 3599 - 600 elapsed, give or take the second the test straddles
    assert!((2998..=2999).contains(&token.expires_in), "{}", token.expires_in);
    assert!(t.stored_token().is_some());
}

#[tokio::test]
async fn restore_inside_expiry_buffer_removes_record() {
    let t = TestSession::spawn();
    // 3599 - 300 buffer = 3299; 3300 elapsed is past the line
    t.seed_token("ya29.stale", 3599, 3300);

    assert!(!t.session.auth.restore_auth().await);
    assert!(!t.session.state.is_authenticated());
    assert!(t.stored_token().is_none());
    assert!(!t.storage.contains(TOKEN_KEY));
    assert!(t.sdk.drive.token().is_none());
}

#[tokio::test]
async fn restore_just_before_buffer_succeeds() {
    let t = TestSession::spawn();
    t.seed_token("ya29.edge", 3599, 3290);

    assert!(t.session.auth.restore_auth().await);
}

#[tokio::test]
async fn restore_corrupt_record_removes_it() {
    let t = TestSession::spawn();
    t.storage.set(TOKEN_KEY, "{not json").unwrap();

    assert!(!t.session.auth.restore_auth().await);
    assert!(!t.storage.contains(TOKEN_KEY));
    assert!(!t.session.state.is_authenticated());
}

#[tokio::test]
async fn restore_record_saved_at_minimum_timestamp_removes_it() {
    let t = TestSession::spawn();
    let record = json!({
        "access_token": "ya29.ancient",
        "expires_in": 3599,
        "scope": "https://www.googleapis.com/auth/drive.file",
        "token_type": "Bearer",
        "saved_at": i64::MIN,
    });
    t.storage.set(TOKEN_KEY, &record.to_string()).unwrap();

    assert!(!t.session.auth.restore_auth().await);
    assert!(!t.storage.contains(TOKEN_KEY));
    assert!(t.sdk.drive.token().is_none());
}

#[tokio::test]
async fn restore_record_with_unrepresentable_lifetime_removes_it() {
    let t = TestSession::spawn();
    let record = json!({
        "access_token": "ya29.endless",
        "expires_in": 9_223_372_036_854_775_808u64,
        "scope": "https://www.googleapis.com/auth/drive.file",
        "token_type": "Bearer",
        "saved_at": chrono::Utc::now().timestamp_millis(),
    });
    t.storage.set(TOKEN_KEY, &record.to_string()).unwrap();

    assert!(!t.session.auth.restore_auth().await);
    assert!(!t.storage.contains(TOKEN_KEY));
    assert!(!t.session.state.is_authenticated());
}

#[tokio::test]
async fn restore_with_failing_sdk_removes_record() {
    let t = TestSession::spawn();
    t.seed_token("ya29.saved", 3599, 0);
    t.sdk
        .scripts
        .fail_on(Some("https://apis.google.com/js/api.js"));

    assert!(!t.session.auth.restore_auth().await);
    assert!(t.stored_token().is_none());
    assert!(!t.session.state.is_authenticated());
}

// --- authenticate ---

#[tokio::test]
async fn authenticate_persists_granted_token() {
    let t = TestSession::spawn();

    t.session.auth.authenticate().await;
    let token = t
        .session
        .auth
        .wait_for_token(short_wait())
        .await
        .ready()
        .expect("token never arrived");

    assert_eq!(token.access_token, "ya29.fresh");
    assert!(t.session.state.is_authenticated());
    assert!(!t.session.state.is_loading());
    assert_eq!(t.sdk.identity.requests(), 1);

    let stored = t.stored_token().unwrap();
    assert_eq!(stored.access_token, "ya29.fresh");
    assert_eq!(stored.expires_in, 3599);
    assert_eq!(stored.scope, t.settings.google.scope);
    let age_ms = chrono::Utc::now().timestamp_millis() - stored.saved_at;
    assert!((0..5_000).contains(&age_ms));
}

#[tokio::test]
async fn authenticate_without_credentials_does_nothing() {
    let t = TestSession::spawn_with_settings(|s| s.google.api_key.clear());

    t.session.auth.authenticate().await;

    assert_eq!(t.sdk.identity.init_calls(), 0);
    assert_eq!(t.sdk.identity.requests(), 0);
    assert!(!t.session.state.is_loading());
    assert!(!t.session.state.is_authenticated());
    assert!(!t.session.auth.is_in_flight());
}

#[tokio::test]
async fn denied_authorization_clears_record() {
    let t = TestSession::spawn();
    t.seed_token("ya29.old", 3599, 0);
    t.sdk
        .identity
        .set_behavior(IdentityBehavior::Deny("access_denied".to_string()));

    t.session.auth.authenticate().await;
    settle(&t).await;

    assert!(!t.session.state.is_authenticated());
    assert_eq!(t.session.state.phase(), AuthPhase::Unauthenticated);
    assert!(t.stored_token().is_none());
    assert!(t.sdk.drive.token().is_none());
}

#[tokio::test]
async fn overlapping_requests_are_coalesced() {
    let t = TestSession::spawn();
    t.sdk.identity.set_behavior(IdentityBehavior::Hold);

    t.session.auth.authenticate().await;
    assert!(t.session.auth.is_in_flight());
    assert_eq!(t.session.state.phase(), AuthPhase::Authenticating);

    t.session.auth.authenticate().await;
    assert_eq!(t.sdk.identity.requests(), 1);

    t.sdk.identity.release_held(TokenResponse::granted(
        "ya29.held",
        3599,
        t.settings.google.scope.clone(),
    ));
    settle(&t).await;

    assert!(t.session.state.is_authenticated());
    assert_eq!(t.stored_token().unwrap().access_token, "ya29.held");

    // A settled request frees the slot for the next one.
    t.sdk.identity.set_behavior(IdentityBehavior::Deny("x".to_string()));
    t.session.auth.authenticate().await;
    settle(&t).await;
    assert_eq!(t.sdk.identity.requests(), 2);
}

#[tokio::test]
async fn dropped_callback_returns_to_unauthenticated() {
    let t = TestSession::spawn();
    t.sdk.identity.set_behavior(IdentityBehavior::NeverAnswer);

    t.session.auth.authenticate().await;
    settle(&t).await;

    assert_eq!(t.session.state.phase(), AuthPhase::Unauthenticated);
    assert!(!t.session.state.is_authenticated());
    assert!(t.stored_token().is_none());
}

#[tokio::test]
async fn reauthorizing_keeps_authenticated_flag() {
    let t = TestSession::spawn();
    t.sign_in().await;
    t.sdk.identity.set_behavior(IdentityBehavior::Hold);

    t.session.auth.authenticate().await;
    assert_eq!(t.session.state.phase(), AuthPhase::Authenticated);
    assert!(t.session.state.is_authenticated());

    t.sdk.identity.release_held(TokenResponse::denied("popup_closed"));
    settle(&t).await;
    assert!(t.stored_token().is_none());
}

#[tokio::test]
async fn authenticate_fetches_profile_when_enabled() {
    let t = TestSession::spawn_with_settings(|s| s.google.fetch_profile = true);
    t.sdk.drive.set_userinfo(json!({
        "name": "Ada Lovelace",
        "email": "ada@example.com",
        "picture": "https://example.com/ada.png",
    }));

    t.session.auth.authenticate().await;
    settle(&t).await;

    let info = t.session.state.user_info().expect("profile not loaded");
    assert_eq!(info.email, "ada@example.com");
    assert_eq!(info.name, "Ada Lovelace");
}

#[tokio::test]
async fn profile_failure_does_not_undo_authentication() {
    let t = TestSession::spawn_with_settings(|s| s.google.fetch_profile = true);

    t.session.auth.authenticate().await;
    settle(&t).await;

    assert!(t.session.state.is_authenticated());
    assert!(t.session.state.user_info().is_none());
}

// --- sign out ---

#[tokio::test]
async fn sign_out_revokes_and_forgets() {
    let t = TestSession::spawn();
    t.sign_in().await;

    t.session.auth.sign_out().await;

    assert_eq!(t.sdk.identity.revoked(), vec!["ya29.seeded".to_string()]);
    assert!(t.sdk.drive.token().is_none());
    assert!(t.stored_token().is_none());
    assert!(!t.session.state.is_authenticated());
    assert!(t.session.state.user_info().is_none());
}

#[tokio::test]
async fn sign_out_is_idempotent() {
    let t = TestSession::spawn();
    t.sign_in().await;

    t.session.auth.sign_out().await;
    t.session.auth.sign_out().await;

    assert_eq!(t.sdk.identity.revoked().len(), 1);
    assert!(!t.session.state.is_authenticated());
}

#[tokio::test]
async fn sign_out_without_token_skips_revoke() {
    let t = TestSession::spawn();

    t.session.auth.sign_out().await;

    assert!(t.sdk.identity.revoked().is_empty());
    assert!(!t.session.state.is_authenticated());
}

#[tokio::test]
async fn restored_session_survives_reload() {
    let first = TestSession::spawn();
    first.session.auth.authenticate().await;
    settle(&first).await;
    assert!(first.session.state.is_authenticated());

    let second = TestSession::spawn_with_storage(first.storage.clone(), |_| {});
    assert!(second.session.auth.restore_auth().await);
    assert_eq!(
        second.sdk.drive.token().unwrap().access_token,
        "ya29.fresh"
    );
}
