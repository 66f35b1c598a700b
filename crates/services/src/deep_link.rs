use std::sync::Arc;

use chrono::Utc;
use drive_open_config::DeepLinkSettings;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::auth::TokenLifecycle;
use crate::cloud_storage::{GoogleDriveFiles, Lookup};
use crate::sdk::SdkLoader;
use crate::session::{FileDescriptor, SessionState};
use crate::wait::{BoundedWait, WaitOutcome};

fn default_verb() -> String {
    "open".to_string()
}

/// A provider-initiated "open this file" request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeepLinkAction {
    #[serde(default = "default_verb")]
    pub action: String,
    pub file_id: String,
    pub file_name: String,
    pub mime_type: String,
}

impl DeepLinkAction {
    /// Reads `action`, `fileId`, `fileName` and `mimeType` from the page URL.
    /// All four must be present and non-empty.
    pub fn from_url(page_url: &str) -> Option<Self> {
        let url = Url::parse(page_url).ok()?;
        let param = |name: &str| {
            url.query_pairs()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.into_owned())
                .filter(|v| !v.is_empty())
        };

        Some(Self {
            action: param("action")?,
            file_id: param("fileId")?,
            file_name: param("fileName")?,
            mime_type: param("mimeType")?,
        })
    }

    pub fn is_open(&self) -> bool {
        self.action == "open"
    }

    /// Minimal descriptor built from the link itself.
    pub fn fallback_descriptor(&self) -> FileDescriptor {
        FileDescriptor {
            id: self.file_id.clone(),
            name: self.file_name.clone(),
            size: "0".to_string(),
            modified_time: Utc::now().to_rfc3339(),
            mime_type: self.mime_type.clone(),
        }
    }
}

/// Cross-origin message as delivered by the host window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub origin: String,
    pub data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct DriveAppPayload {
    #[serde(rename = "type")]
    kind: String,
    action: DeepLinkAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorSource {
    Metadata,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeepLinkOutcome {
    Opened {
        file: FileDescriptor,
        source: DescriptorSource,
    },
    Ignored,
}

/// Turns inbound "open with" triggers into a populated `current_file`.
pub struct DeepLinkHandler {
    settings: DeepLinkSettings,
    state: Arc<SessionState>,
    loader: Arc<SdkLoader>,
    auth: Arc<TokenLifecycle>,
    files: Arc<GoogleDriveFiles>,
}

impl DeepLinkHandler {
    pub fn new(
        settings: DeepLinkSettings,
        state: Arc<SessionState>,
        loader: Arc<SdkLoader>,
        auth: Arc<TokenLifecycle>,
        files: Arc<GoogleDriveFiles>,
    ) -> Self {
        Self {
            settings,
            state,
            loader,
            auth,
            files,
        }
    }

    /// Mount hook: restores the persisted session, then kicks off any open
    /// action carried by the page URL. The action runs in the background.
    pub async fn on_mount(self: &Arc<Self>, page_url: &str) -> MountReport {
        let restored = self.auth.restore_auth().await;
        let deep_link = DeepLinkAction::from_url(page_url).map(|action| self.spawn(action));
        MountReport {
            restored,
            deep_link,
        }
    }

    /// Accepts only provider-origin messages tagged as drive-app actions.
    pub fn accept_message(&self, message: &InboundMessage) -> Option<DeepLinkAction> {
        if message.origin != self.settings.provider_origin {
            debug!(origin = %message.origin, "Ignoring message from foreign origin");
            return None;
        }
        let payload: DriveAppPayload = serde_json::from_value(message.data.clone()).ok()?;
        if payload.kind != self.settings.message_type {
            debug!(kind = %payload.kind, "Ignoring message of another type");
            return None;
        }
        Some(payload.action)
    }

    /// Handles every accepted message until the sender side closes.
    pub fn listen(self: &Arc<Self>, mut messages: mpsc::Receiver<InboundMessage>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(message) = messages.recv().await {
                if let Some(action) = this.accept_message(&message) {
                    this.spawn(action);
                }
            }
            debug!("Message channel closed");
        })
    }

    fn spawn(self: &Arc<Self>, action: DeepLinkAction) -> JoinHandle<DeepLinkOutcome> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.handle_action(action).await })
    }

    /// Restore-or-authenticate, then resolve the file. Never fails: errors are
    /// logged and the link's own fields stand in for missing metadata.
    pub async fn handle_action(&self, action: DeepLinkAction) -> DeepLinkOutcome {
        info!(?action, "Drive App action");
        if !action.is_open() {
            debug!(verb = %action.action, "Unsupported drive action");
            return DeepLinkOutcome::Ignored;
        }

        if let Err(e) = self.loader.ensure_ready().await {
            warn!(error = %e, "SDK initialization failed while handling drive action");
        }

        if !self.state.is_authenticated() {
            self.auth.authenticate().await;
            let wait = BoundedWait::from_settings(&self.settings);
            if let WaitOutcome::TimedOut { attempts } = self.auth.wait_for_token(wait).await {
                warn!(attempts, "Access token did not arrive in time");
            }
        }

        let (file, source) = match self.files.lookup_file_details(&action.file_id).await {
            Lookup::Found(file) => (file, DescriptorSource::Metadata),
            Lookup::Unavailable(_) => (action.fallback_descriptor(), DescriptorSource::Fallback),
        };

        self.state.set_current_file(Some(file.clone()));
        info!(file_id = %file.id, ?source, "Drive file opened");
        DeepLinkOutcome::Opened { file, source }
    }
}

pub struct MountReport {
    pub restored: bool,
    pub deep_link: Option<JoinHandle<DeepLinkOutcome>>,
}
