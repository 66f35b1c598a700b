use std::sync::Arc;

use reqwest::Client;
use tracing::{debug, error, warn};

use super::{DriveError, FilePage, Lookup};
use crate::sdk::{DriveClient, DriveFileResource, FileListQuery};
use crate::session::{FileDescriptor, SessionState};

const METADATA_FIELDS: &str = "id,name,size,modifiedTime,mimeType";
const DOWNLOAD_FIELDS: &str = "webContentLink";
const LIST_FIELDS: &str = "nextPageToken,files(id,name,size,modifiedTime,mimeType)";
const LIST_PAGE_SIZE: u32 = 100;

/// Typed file operations over the initialized Drive client. Every operation
/// requires an authenticated session.
pub struct GoogleDriveFiles {
    client: Client,
    api_base: String,
    drive: Arc<dyn DriveClient>,
    state: Arc<SessionState>,
    list_mime_types: Vec<String>,
}

impl GoogleDriveFiles {
    pub fn new(
        client: Client,
        api_base: impl Into<String>,
        drive: Arc<dyn DriveClient>,
        state: Arc<SessionState>,
        list_mime_types: Vec<String>,
    ) -> Self {
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            drive,
            state,
            list_mime_types,
        }
    }

    fn require_auth(&self) -> Result<(), DriveError> {
        if self.state.is_authenticated() {
            Ok(())
        } else {
            Err(DriveError::NotAuthenticated)
        }
    }

    /// Metadata lookup that fails hard.
    pub async fn get_file_details(&self, file_id: &str) -> Result<FileDescriptor, DriveError> {
        self.require_auth()?;
        let resource = self
            .drive
            .get_file(file_id, METADATA_FIELDS)
            .await
            .inspect_err(|e| error!(%file_id, error = %e, "Error getting file details"))?;
        descriptor_from(resource)
    }

    /// Metadata lookup for the deep-link path: failures come back as
    /// `Lookup::Unavailable` so the caller can synthesize a fallback.
    pub async fn lookup_file_details(&self, file_id: &str) -> Lookup<FileDescriptor> {
        let lookup: Lookup<FileDescriptor> = self.get_file_details(file_id).await.into();
        if let Lookup::Unavailable(e) = &lookup {
            warn!(%file_id, error = %e, "File details unavailable");
        }
        lookup
    }

    /// `webContentLink`, or an empty string when the provider has none.
    pub async fn get_file_download_url(&self, file_id: &str) -> Result<String, DriveError> {
        self.require_auth()?;
        let resource = self
            .drive
            .get_file(file_id, DOWNLOAD_FIELDS)
            .await
            .inspect_err(|e| error!(%file_id, error = %e, "Error getting download URL"))?;
        Ok(resource.web_content_link.unwrap_or_default())
    }

    /// Raw file bytes from the media endpoint, authorized with the token
    /// currently installed in the Drive client.
    pub async fn get_file_content(&self, file_id: &str) -> Result<Vec<u8>, DriveError> {
        self.require_auth()?;
        let token = self.drive.get_token().ok_or(DriveError::NoAccessToken)?;

        let url = format!(
            "{}/files/{}",
            self.api_base,
            urlencoding::encode(file_id)
        );
        let resp = self
            .client
            .get(url)
            .query(&[("alt", "media")])
            .bearer_auth(&token.access_token)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let err = DriveError::Http {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
            };
            error!(%file_id, error = %err, "Error getting file content");
            return Err(err);
        }

        let bytes = resp.bytes().await?;
        debug!(%file_id, len = bytes.len(), "Fetched file content");
        Ok(bytes.to_vec())
    }

    /// One page of non-trashed files restricted to the picker's MIME types.
    pub async fn list_files(&self, page_token: Option<&str>) -> Result<FilePage, DriveError> {
        self.require_auth()?;
        let query = FileListQuery {
            q: Some(list_query(&self.list_mime_types)),
            page_size: Some(LIST_PAGE_SIZE),
            page_token: page_token.map(str::to_string),
            fields: Some(LIST_FIELDS.to_string()),
        };
        let list = self.drive.list_files(&query).await?;

        let files = list
            .files
            .into_iter()
            .filter_map(|f| match descriptor_from(f) {
                Ok(d) => Some(d),
                Err(e) => {
                    warn!(error = %e, "Skipping file with incomplete metadata");
                    None
                }
            })
            .collect();

        Ok(FilePage {
            files,
            next_page_token: list.next_page_token,
        })
    }
}

fn descriptor_from(resource: DriveFileResource) -> Result<FileDescriptor, DriveError> {
    Ok(FileDescriptor {
        id: resource.id.ok_or(DriveError::IncompleteMetadata("id"))?,
        name: resource.name.ok_or(DriveError::IncompleteMetadata("name"))?,
        size: resource.size.unwrap_or_else(|| "0".to_string()),
        modified_time: resource
            .modified_time
            .ok_or(DriveError::IncompleteMetadata("modifiedTime"))?,
        mime_type: resource
            .mime_type
            .ok_or(DriveError::IncompleteMetadata("mimeType"))?,
    })
}

fn list_query(mime_types: &[String]) -> String {
    let mut q = "trashed = false".to_string();
    if !mime_types.is_empty() {
        let clauses: Vec<String> = mime_types
            .iter()
            .map(|m| format!("mimeType = '{}'", m.replace('\'', "\\'")))
            .collect();
        q.push_str(&format!(" and ({})", clauses.join(" or ")));
    }
    q
}
