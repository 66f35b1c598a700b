pub mod callback;
pub mod loader;
pub mod native;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use callback::{Pending, Responder, once};
pub use loader::SdkLoader;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("Failed to load {0}")]
    ScriptLoad(String),
    #[error("SDK initialization failed: {0}")]
    Init(String),
    #[error("SDK callback was dropped without a response")]
    CallbackDropped,
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{0}")]
    Other(String),
}

/// Token held in the file-API client's in-memory slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    pub expires_in: u64,
    pub scope: String,
    pub token_type: String,
}

/// Payload delivered by the identity SDK once per authorization request.
/// `error` is set on failure, the token fields on success.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

impl TokenResponse {
    pub fn granted(access_token: impl Into<String>, expires_in: u64, scope: impl Into<String>) -> Self {
        Self {
            access_token: Some(access_token.into()),
            expires_in: Some(expires_in),
            scope: Some(scope.into()),
            token_type: Some("Bearer".to_string()),
            ..Default::default()
        }
    }

    pub fn denied(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// Arguments for the file-API client's one-time `init`.
#[derive(Debug, Clone)]
pub struct ClientInit {
    pub api_key: String,
    pub discovery_docs: Vec<String>,
}

/// Raw Drive `files` resource; every field is optional because callers pick
/// the field mask.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFileResource {
    pub id: Option<String>,
    pub name: Option<String>,
    pub size: Option<String>,
    pub modified_time: Option<String>,
    pub mime_type: Option<String>,
    pub web_content_link: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileListResource {
    #[serde(default)]
    pub files: Vec<DriveFileResource>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct FileListQuery {
    pub q: Option<String>,
    pub page_size: Option<u32>,
    pub page_token: Option<String>,
    pub fields: Option<String>,
}

/// Injects an external script and waits for its load event.
#[async_trait]
pub trait ScriptHost: Send + Sync {
    async fn load_script(&self, src: &str) -> Result<(), SdkError>;
}

/// The Drive file-API client (`gapi.client` in the browser).
#[async_trait]
pub trait DriveClient: Send + Sync {
    async fn load(&self, modules: &str) -> Result<(), SdkError>;
    async fn init(&self, init: &ClientInit) -> Result<(), SdkError>;
    fn get_token(&self) -> Option<AccessToken>;
    fn set_token(&self, token: Option<AccessToken>);
    async fn get_file(&self, file_id: &str, fields: &str) -> Result<DriveFileResource, SdkError>;
    async fn list_files(&self, query: &FileListQuery) -> Result<FileListResource, SdkError>;
    /// Authenticated GET against an arbitrary Google endpoint.
    async fn request(&self, url: &str) -> Result<serde_json::Value, SdkError>;
}

/// The identity SDK (`google.accounts.oauth2`).
#[async_trait]
pub trait IdentityClient: Send + Sync {
    async fn init_token_client(
        &self,
        client_id: &str,
        scope: &str,
    ) -> Result<Arc<dyn TokenClient>, SdkError>;
    async fn revoke(&self, access_token: &str) -> Result<(), SdkError>;
}

pub trait TokenClient: Send + Sync {
    /// Starts an authorization request. The returned handle settles exactly
    /// once with the SDK's callback payload.
    fn request_access_token(&self) -> Pending<TokenResponse>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewId {
    Docs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    List,
    Grid,
}

#[derive(Debug, Clone)]
pub struct DocsView {
    pub view_id: ViewId,
    pub mime_types: Vec<String>,
    pub mode: ViewMode,
    pub enable_drives: bool,
}

#[derive(Debug, Clone)]
pub struct PickerConfig {
    pub oauth_token: String,
    pub developer_key: String,
    pub view: DocsView,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PickerAction {
    Picked,
    Cancel,
    Loaded,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickedDocument {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub size_bytes: Option<u64>,
    #[serde(default)]
    pub last_edited_utc: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickerResponse {
    pub action: PickerAction,
    #[serde(default)]
    pub docs: Vec<PickedDocument>,
}

/// The picker UI SDK (`google.picker`).
#[async_trait]
pub trait PickerSdk: Send + Sync {
    fn is_loaded(&self) -> bool;
    async fn load(&self) -> Result<(), SdkError>;
    /// Builds the picker and makes it visible; settles with the terminal
    /// outcome of the modal.
    fn show(&self, config: PickerConfig) -> Result<Pending<PickerResponse>, SdkError>;
}

/// Every external SDK a session depends on.
#[derive(Clone)]
pub struct SdkBundle {
    pub scripts: Arc<dyn ScriptHost>,
    pub drive: Arc<dyn DriveClient>,
    pub identity: Arc<dyn IdentityClient>,
    pub picker: Arc<dyn PickerSdk>,
}
