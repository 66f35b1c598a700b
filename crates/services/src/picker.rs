use std::sync::Arc;

use chrono::{TimeZone, Utc};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::sdk::{
    DocsView, DriveClient, PickedDocument, PickerAction, PickerConfig, PickerSdk, SdkError,
    ViewId, ViewMode,
};
use crate::session::{FileDescriptor, SessionState};

const API_KEY_HELP: &str = "The Google API Key is invalid or not configured correctly. Please check:\n\
    1. DRIVE_OPEN__GOOGLE__API_KEY is set in your environment or config file\n\
    2. The API key is valid in Google Cloud Console\n\
    3. Google Picker API is enabled for your project\n\
    4. The API key has no restrictions or allows your domain";

#[derive(Debug, Error)]
pub enum PickerError {
    #[error("Please authenticate first")]
    NotAuthenticated,
    #[error("Google API Key is not configured. Please set DRIVE_OPEN__GOOGLE__API_KEY.")]
    MissingApiKey,
    #[error("No access token available. Please authenticate first.")]
    NoAccessToken,
    #[error("User cancelled file selection")]
    Cancelled,
    #[error("Picker returned no document")]
    NothingPicked,
    #[error("Unexpected picker outcome: {0:?}")]
    UnexpectedAction(PickerAction),
    #[error("Failed to open file picker. {0}")]
    Construction(String),
    #[error(transparent)]
    Sdk(#[from] SdkError),
}

/// Interactive file selection through the provider's picker UI.
pub struct FilePicker {
    picker: Arc<dyn PickerSdk>,
    drive: Arc<dyn DriveClient>,
    state: Arc<SessionState>,
    api_key: String,
    mime_types: Vec<String>,
}

impl FilePicker {
    pub fn new(
        picker: Arc<dyn PickerSdk>,
        drive: Arc<dyn DriveClient>,
        state: Arc<SessionState>,
        api_key: impl Into<String>,
        mime_types: Vec<String>,
    ) -> Self {
        Self {
            picker,
            drive,
            state,
            api_key: api_key.into(),
            mime_types,
        }
    }

    /// Shows the picker and waits for the user's choice. The picked file also
    /// becomes the session's current file.
    pub async fn open_file_picker(&self) -> Result<FileDescriptor, PickerError> {
        if !self.state.is_authenticated() {
            return Err(PickerError::NotAuthenticated);
        }
        if self.api_key.trim().is_empty() {
            return Err(PickerError::MissingApiKey);
        }
        let token = self
            .drive
            .get_token()
            .filter(|t| !t.access_token.is_empty())
            .ok_or(PickerError::NoAccessToken)?;

        if !self.picker.is_loaded() {
            debug!("Loading picker module");
            self.picker.load().await?;
        }

        let config = PickerConfig {
            oauth_token: token.access_token,
            developer_key: self.api_key.clone(),
            view: DocsView {
                view_id: ViewId::Docs,
                mime_types: self.mime_types.clone(),
                mode: ViewMode::List,
                enable_drives: true,
            },
        };

        let pending = self.picker.show(config).map_err(|e| {
            error!(error = %e, "Error creating picker");
            construction_error(&e)
        })?;
        let response = pending.wait().await?;

        match response.action {
            PickerAction::Picked => {
                let doc = response
                    .docs
                    .into_iter()
                    .next()
                    .ok_or(PickerError::NothingPicked)?;
                let file = descriptor_from_pick(doc);
                info!(file_id = %file.id, name = %file.name, "File picked");
                self.state.set_current_file(Some(file.clone()));
                Ok(file)
            }
            PickerAction::Cancel => Err(PickerError::Cancelled),
            other => Err(PickerError::UnexpectedAction(other)),
        }
    }
}

fn construction_error(err: &SdkError) -> PickerError {
    let message = err.to_string();
    if message.contains("developer key") || message.contains("API key") {
        PickerError::Construction(API_KEY_HELP.to_string())
    } else {
        PickerError::Construction("Please try again.".to_string())
    }
}

fn descriptor_from_pick(doc: PickedDocument) -> FileDescriptor {
    let modified_time = doc
        .last_edited_utc
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .map(|t| t.to_rfc3339())
        .unwrap_or_default();

    FileDescriptor {
        id: doc.id,
        name: doc.name,
        size: doc.size_bytes.unwrap_or(0).to_string(),
        modified_time,
        mime_type: doc.mime_type,
    }
}
