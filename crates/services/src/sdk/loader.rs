use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use drive_open_config::Settings;
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{ClientInit, DriveClient, IdentityClient, ScriptHost, SdkError, TokenClient};

/// Monotonic readiness flags: false -> true, never reset.
#[derive(Debug, Default)]
pub struct SdkInitFlags {
    client_ready: AtomicBool,
    identity_ready: AtomicBool,
}

impl SdkInitFlags {
    pub fn client_ready(&self) -> bool {
        self.client_ready.load(Ordering::Acquire)
    }

    pub fn identity_ready(&self) -> bool {
        self.identity_ready.load(Ordering::Acquire)
    }

    pub fn all_ready(&self) -> bool {
        self.client_ready() && self.identity_ready()
    }
}

/// Loads and initializes the file-API and identity SDKs once per session.
pub struct SdkLoader {
    scripts: Arc<dyn ScriptHost>,
    drive: Arc<dyn DriveClient>,
    identity: Arc<dyn IdentityClient>,
    settings: Settings,
    flags: SdkInitFlags,
    token_client: RwLock<Option<Arc<dyn TokenClient>>>,
    init_lock: Mutex<()>,
}

impl SdkLoader {
    pub fn new(
        scripts: Arc<dyn ScriptHost>,
        drive: Arc<dyn DriveClient>,
        identity: Arc<dyn IdentityClient>,
        settings: Settings,
    ) -> Self {
        Self {
            scripts,
            drive,
            identity,
            settings,
            flags: SdkInitFlags::default(),
            token_client: RwLock::new(None),
            init_lock: Mutex::new(()),
        }
    }

    pub fn flags(&self) -> &SdkInitFlags {
        &self.flags
    }

    /// Token client created during identity initialization.
    pub fn token_client(&self) -> Option<Arc<dyn TokenClient>> {
        self.token_client.read().clone()
    }

    /// Idempotent. A failed stage leaves its flag unset so the next call
    /// retries it from scratch.
    pub async fn ensure_ready(&self) -> Result<(), SdkError> {
        if self.flags.all_ready() {
            return Ok(());
        }

        let _guard = self.init_lock.lock().await;
        // Another caller may have finished while we waited for the lock.
        if self.flags.all_ready() {
            return Ok(());
        }

        if !self.flags.client_ready() {
            self.init_client().await?;
            self.flags.client_ready.store(true, Ordering::Release);
        }

        if !self.flags.identity_ready() {
            let client = self
                .identity
                .init_token_client(&self.settings.google.client_id, &self.settings.google.scope)
                .await?;
            *self.token_client.write() = Some(client);
            self.flags.identity_ready.store(true, Ordering::Release);
            info!(scope = %self.settings.google.scope, "Identity token client initialized");
        }

        Ok(())
    }

    async fn init_client(&self) -> Result<(), SdkError> {
        let sdk = &self.settings.sdk;
        for src in [&sdk.api_script_url, &sdk.identity_script_url] {
            debug!(%src, "Loading SDK script");
            self.scripts.load_script(src).await?;
        }

        self.drive.load(&sdk.client_modules).await?;
        self.drive
            .init(&ClientInit {
                api_key: self.settings.google.api_key.clone(),
                discovery_docs: vec![self.settings.drive.discovery_doc.clone()],
            })
            .await?;

        info!(modules = %sdk.client_modules, "Drive client initialized");
        Ok(())
    }
}
