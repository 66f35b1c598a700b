//! SDK bindings for running outside a browser: the Drive REST API over
//! reqwest, an identity client that hands out a pre-issued access token, and
//! no-op script/picker hosts.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashSet;
use drive_open_config::Settings;
use parking_lot::RwLock;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use super::{
    AccessToken, ClientInit, DriveClient, DriveFileResource, FileListQuery, FileListResource,
    IdentityClient, Pending, PickerConfig, PickerResponse, PickerSdk, ScriptHost, SdkBundle,
    SdkError, TokenClient, TokenResponse,
};

/// Native processes link their SDKs at build time; there is nothing to inject.
pub struct PreloadedScripts;

#[async_trait]
impl ScriptHost for PreloadedScripts {
    async fn load_script(&self, src: &str) -> Result<(), SdkError> {
        debug!(%src, "Script already linked into native runtime");
        Ok(())
    }
}

/// Drive v3 REST client with an in-memory bearer token slot.
pub struct RestDriveClient {
    client: Client,
    api_base: String,
    api_key: RwLock<Option<String>>,
    token: RwLock<Option<AccessToken>>,
    modules: DashSet<String>,
}

impl RestDriveClient {
    pub fn new(client: Client, api_base: impl Into<String>) -> Self {
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key: RwLock::new(None),
            token: RwLock::new(None),
            modules: DashSet::new(),
        }
    }

    pub fn is_module_loaded(&self, module: &str) -> bool {
        self.modules.contains(module)
    }

    /// Whether `url` targets the Drive API rather than another Google
    /// endpoint such as userinfo.
    fn is_drive_url(&self, url: &str) -> bool {
        url.strip_prefix(&self.api_base)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with(['/', '?']))
    }

    /// Adds the bearer token, and the API key when `with_key` is set. Only
    /// Drive API calls take the key.
    fn authorized(&self, mut builder: RequestBuilder, with_key: bool) -> RequestBuilder {
        if with_key {
            if let Some(key) = self.api_key.read().as_deref() {
                builder = builder.query(&[("key", key)]);
            }
        }
        if let Some(token) = self.token.read().as_ref() {
            builder = builder.bearer_auth(&token.access_token);
        }
        builder
    }

    async fn parse<T: DeserializeOwned>(resp: Response) -> Result<T, SdkError> {
        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(SdkError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(resp.json::<T>().await?)
    }
}

#[async_trait]
impl DriveClient for RestDriveClient {
    async fn load(&self, modules: &str) -> Result<(), SdkError> {
        for module in modules.split(':').filter(|m| !m.is_empty()) {
            self.modules.insert(module.to_string());
        }
        Ok(())
    }

    async fn init(&self, init: &ClientInit) -> Result<(), SdkError> {
        if init.api_key.is_empty() {
            return Err(SdkError::Init("API key is empty".to_string()));
        }
        *self.api_key.write() = Some(init.api_key.clone());
        info!(discovery_docs = ?init.discovery_docs, "REST Drive client ready");
        Ok(())
    }

    fn get_token(&self) -> Option<AccessToken> {
        self.token.read().clone()
    }

    fn set_token(&self, token: Option<AccessToken>) {
        *self.token.write() = token;
    }

    async fn get_file(&self, file_id: &str, fields: &str) -> Result<DriveFileResource, SdkError> {
        let url = format!("{}/files/{}", self.api_base, urlencoding::encode(file_id));
        let resp = self
            .authorized(self.client.get(url), true)
            .query(&[("fields", fields)])
            .send()
            .await?;
        Self::parse(resp).await
    }

    async fn list_files(&self, query: &FileListQuery) -> Result<FileListResource, SdkError> {
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(q) = &query.q {
            params.push(("q", q.clone()));
        }
        if let Some(size) = query.page_size {
            params.push(("pageSize", size.to_string()));
        }
        if let Some(token) = &query.page_token {
            params.push(("pageToken", token.clone()));
        }
        if let Some(fields) = &query.fields {
            params.push(("fields", fields.clone()));
        }

        let resp = self
            .authorized(self.client.get(format!("{}/files", self.api_base)), true)
            .query(&params)
            .send()
            .await?;
        Self::parse(resp).await
    }

    async fn request(&self, url: &str) -> Result<serde_json::Value, SdkError> {
        let with_key = self.is_drive_url(url);
        let resp = self.authorized(self.client.get(url), with_key).send().await?;
        Self::parse(resp).await
    }
}

/// Identity client backed by a token issued out of band.
pub struct StaticTokenIdentity {
    client: Client,
    access_token: Option<String>,
    expires_in: u64,
    revoke_url: String,
}

impl StaticTokenIdentity {
    pub fn new(
        client: Client,
        access_token: Option<String>,
        expires_in: u64,
        revoke_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            access_token: access_token.filter(|t| !t.trim().is_empty()),
            expires_in,
            revoke_url: revoke_url.into(),
        }
    }
}

struct StaticTokenClient {
    access_token: Option<String>,
    expires_in: u64,
    scope: String,
}

impl TokenClient for StaticTokenClient {
    fn request_access_token(&self) -> Pending<TokenResponse> {
        let response = match &self.access_token {
            Some(token) => TokenResponse::granted(token.clone(), self.expires_in, self.scope.clone()),
            None => TokenResponse {
                error_description: Some("no access token configured".to_string()),
                ..TokenResponse::denied("access_denied")
            },
        };
        Pending::ready(response)
    }
}

#[async_trait]
impl IdentityClient for StaticTokenIdentity {
    async fn init_token_client(
        &self,
        client_id: &str,
        scope: &str,
    ) -> Result<Arc<dyn TokenClient>, SdkError> {
        debug!(%client_id, "Static token client created");
        Ok(Arc::new(StaticTokenClient {
            access_token: self.access_token.clone(),
            expires_in: self.expires_in,
            scope: scope.to_string(),
        }))
    }

    async fn revoke(&self, access_token: &str) -> Result<(), SdkError> {
        let resp = self
            .client
            .post(&self.revoke_url)
            .form(&[("token", access_token)])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Token revocation rejected");
            return Err(SdkError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }
}

/// Picker host for sessions without a UI surface.
pub struct HeadlessPicker;

#[async_trait]
impl PickerSdk for HeadlessPicker {
    fn is_loaded(&self) -> bool {
        true
    }

    async fn load(&self) -> Result<(), SdkError> {
        Ok(())
    }

    fn show(&self, _config: PickerConfig) -> Result<Pending<PickerResponse>, SdkError> {
        Err(SdkError::Other(
            "the picker UI is not available in a headless session".to_string(),
        ))
    }
}

/// Wires the native bindings from settings.
pub fn native_bundle(settings: &Settings, client: Client) -> SdkBundle {
    SdkBundle {
        scripts: Arc::new(PreloadedScripts),
        drive: Arc::new(RestDriveClient::new(
            client.clone(),
            settings.drive.api_base_url.clone(),
        )),
        identity: Arc::new(StaticTokenIdentity::new(
            client,
            settings.identity.access_token.clone(),
            settings.identity.expires_in_secs,
            settings.identity.revoke_url.clone(),
        )),
        picker: Arc::new(HeadlessPicker),
    }
}
