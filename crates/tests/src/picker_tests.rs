use std::sync::atomic::Ordering;

use drive_open_services::PickerError;
use drive_open_services::sdk::{PickedDocument, PickerAction, PickerResponse, ViewId, ViewMode};

use crate::fixtures::fake_sdk::PickerScript;
use crate::fixtures::test_session::TestSession;

fn picked(docs: Vec<PickedDocument>) -> PickerScript {
    PickerScript::Respond(PickerResponse {
        action: PickerAction::Picked,
        docs,
    })
}

fn site_dxf() -> PickedDocument {
    PickedDocument {
        id: "F9".into(),
        name: "site.dxf".into(),
        mime_type: "image/vnd.dxf".into(),
        size_bytes: Some(4096),
        last_edited_utc: Some(1_714_557_600_000),
    }
}

#[tokio::test]
async fn picking_a_file_sets_current_file() {
    let t = TestSession::spawn();
    t.sign_in().await;
    t.sdk.picker.script(picked(vec![site_dxf()]));

    let file = t.session.picker.open_file_picker().await.unwrap();

    assert_eq!(file.id, "F9");
    assert_eq!(file.name, "site.dxf");
    assert_eq!(file.size, "4096");
    assert_eq!(file.mime_type, "image/vnd.dxf");
    assert_eq!(t.session.state.current_file(), Some(file));

    let config = t.sdk.picker.last_config().unwrap();
    assert_eq!(config.oauth_token, "ya29.seeded");
    assert_eq!(config.developer_key, "test-api-key");
    assert_eq!(config.view.view_id, ViewId::Docs);
    assert_eq!(config.view.mode, ViewMode::List);
    assert!(config.view.enable_drives);
    assert_eq!(config.view.mime_types, t.settings.picker.mime_types);
}

#[tokio::test]
async fn picker_module_loads_once() {
    let t = TestSession::spawn();
    t.sign_in().await;
    t.sdk.picker.script(picked(vec![site_dxf()]));

    t.session.picker.open_file_picker().await.unwrap();
    t.session.picker.open_file_picker().await.unwrap();

    assert_eq!(t.sdk.picker.load_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn cancel_leaves_current_file_untouched() {
    let t = TestSession::spawn();
    t.sign_in().await;
    t.sdk.picker.script(PickerScript::Respond(PickerResponse {
        action: PickerAction::Cancel,
        docs: vec![],
    }));

    let err = t.session.picker.open_file_picker().await.unwrap_err();

    assert!(matches!(err, PickerError::Cancelled));
    assert_eq!(err.to_string(), "User cancelled file selection");
    assert!(t.session.state.current_file().is_none());
}

#[tokio::test]
async fn empty_pick_is_an_error() {
    let t = TestSession::spawn();
    t.sign_in().await;
    t.sdk.picker.script(picked(vec![]));

    assert!(matches!(
        t.session.picker.open_file_picker().await,
        Err(PickerError::NothingPicked)
    ));
}

#[tokio::test]
async fn requires_authentication() {
    let t = TestSession::spawn();
    t.sdk.picker.script(picked(vec![site_dxf()]));

    let err = t.session.picker.open_file_picker().await.unwrap_err();

    assert_eq!(err.to_string(), "Please authenticate first");
    assert!(t.sdk.picker.last_config().is_none());
    assert_eq!(t.sdk.picker.load_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn requires_api_key() {
    let t = TestSession::spawn_with_settings(|s| s.google.api_key.clear());
    t.session.state.mark_authenticated();

    assert!(matches!(
        t.session.picker.open_file_picker().await,
        Err(PickerError::MissingApiKey)
    ));
}

#[tokio::test]
async fn requires_installed_token() {
    let t = TestSession::spawn();
    t.session.state.mark_authenticated();

    assert!(matches!(
        t.session.picker.open_file_picker().await,
        Err(PickerError::NoAccessToken)
    ));
}

#[tokio::test]
async fn invalid_developer_key_explains_remedy() {
    let t = TestSession::spawn();
    t.sign_in().await;
    t.sdk
        .picker
        .script(PickerScript::FailBuild("The API developer key is invalid.".into()));

    let err = t.session.picker.open_file_picker().await.unwrap_err();

    let message = err.to_string();
    assert!(message.starts_with("Failed to open file picker. "));
    assert!(message.contains("DRIVE_OPEN__GOOGLE__API_KEY"));
}

#[tokio::test]
async fn other_construction_failures_ask_to_retry() {
    let t = TestSession::spawn();
    t.sign_in().await;
    t.sdk.picker.script(PickerScript::FailBuild("popup blocked".into()));

    let err = t.session.picker.open_file_picker().await.unwrap_err();
    assert_eq!(err.to_string(), "Failed to open file picker. Please try again.");
}
