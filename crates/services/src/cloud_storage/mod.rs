pub mod google_drive;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sdk::SdkError;
use crate::session::FileDescriptor;

pub use google_drive::GoogleDriveFiles;

#[derive(Debug, Error)]
pub enum DriveError {
    #[error("Not authenticated")]
    NotAuthenticated,
    #[error("No access token available")]
    NoAccessToken,
    #[error("Failed to fetch file: {status} {reason}")]
    Http { status: u16, reason: String },
    #[error("Incomplete file metadata: missing {0}")]
    IncompleteMetadata(&'static str),
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error(transparent)]
    Sdk(#[from] SdkError),
}

/// Outcome of a failure-tolerant lookup: either the value, or the reason it
/// is unavailable. Never raised to the caller.
#[derive(Debug)]
pub enum Lookup<T> {
    Found(T),
    Unavailable(DriveError),
}

impl<T> Lookup<T> {
    pub fn found(self) -> Option<T> {
        match self {
            Lookup::Found(value) => Some(value),
            Lookup::Unavailable(_) => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }
}

impl<T> From<Result<T, DriveError>> for Lookup<T> {
    fn from(result: Result<T, DriveError>) -> Self {
        match result {
            Ok(value) => Lookup::Found(value),
            Err(e) => Lookup::Unavailable(e),
        }
    }
}

/// One page of a file listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilePage {
    pub files: Vec<FileDescriptor>,
    pub next_page_token: Option<String>,
}
