use std::sync::Arc;

use drive_open_config::Settings;
use reqwest::Client;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::auth::TokenLifecycle;
use crate::cloud_storage::GoogleDriveFiles;
use crate::deep_link::{DeepLinkHandler, InboundMessage, MountReport};
use crate::picker::FilePicker;
use crate::sdk::{SdkBundle, SdkLoader};
use crate::session::{KeyValueStore, SessionState, TokenStore};

/// Everything one UI session needs, built once at startup and shared by
/// handle. Two contexts never share state.
#[derive(Clone)]
pub struct DriveSession {
    pub settings: Settings,
    pub state: Arc<SessionState>,
    pub loader: Arc<SdkLoader>,
    pub auth: Arc<TokenLifecycle>,
    pub files: Arc<GoogleDriveFiles>,
    pub picker: Arc<FilePicker>,
    pub deep_links: Arc<DeepLinkHandler>,
}

impl DriveSession {
    pub fn new(
        settings: Settings,
        sdk: SdkBundle,
        storage: Arc<dyn KeyValueStore>,
        http: Client,
    ) -> Self {
        let state = Arc::new(SessionState::new());
        let loader = Arc::new(SdkLoader::new(
            Arc::clone(&sdk.scripts),
            Arc::clone(&sdk.drive),
            Arc::clone(&sdk.identity),
            settings.clone(),
        ));
        let tokens = TokenStore::new(storage, settings.storage.token_key.clone());
        let auth = Arc::new(TokenLifecycle::new(
            settings.clone(),
            Arc::clone(&state),
            Arc::clone(&loader),
            Arc::clone(&sdk.drive),
            Arc::clone(&sdk.identity),
            tokens,
        ));
        let files = Arc::new(GoogleDriveFiles::new(
            http,
            settings.drive.api_base_url.clone(),
            Arc::clone(&sdk.drive),
            Arc::clone(&state),
            settings.picker.mime_types.clone(),
        ));
        let picker = Arc::new(FilePicker::new(
            Arc::clone(&sdk.picker),
            Arc::clone(&sdk.drive),
            Arc::clone(&state),
            settings.google.api_key.clone(),
            settings.picker.mime_types.clone(),
        ));
        let deep_links = Arc::new(DeepLinkHandler::new(
            settings.deep_link.clone(),
            Arc::clone(&state),
            Arc::clone(&loader),
            Arc::clone(&auth),
            Arc::clone(&files),
        ));

        Self {
            settings,
            state,
            loader,
            auth,
            files,
            picker,
            deep_links,
        }
    }

    /// Mount hook for the UI layer.
    pub async fn mount(&self, page_url: &str) -> MountReport {
        self.deep_links.on_mount(page_url).await
    }

    /// Starts consuming cross-origin messages.
    pub fn listen(&self, messages: mpsc::Receiver<InboundMessage>) -> JoinHandle<()> {
        self.deep_links.listen(messages)
    }
}
