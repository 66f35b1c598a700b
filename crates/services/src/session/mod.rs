pub mod storage;
pub mod token;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

pub use storage::{FileStorage, KeyValueStore, MemoryStorage, StorageError};
pub use token::{PersistedToken, TokenStore};

/// File currently shown by the UI layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptor {
    pub id: String,
    pub name: String,
    pub size: String,
    pub modified_time: String,
    pub mime_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub picture: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPhase {
    Unauthenticated,
    Authenticating,
    Authenticated,
}

/// Reactive session fields. Components write, the UI layer subscribes.
pub struct SessionState {
    phase: Mutex<AuthPhase>,
    authenticated: watch::Sender<bool>,
    loading: watch::Sender<bool>,
    current_file: watch::Sender<Option<FileDescriptor>>,
    user_info: watch::Sender<Option<UserInfo>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            phase: Mutex::new(AuthPhase::Unauthenticated),
            authenticated: watch::Sender::new(false),
            loading: watch::Sender::new(false),
            current_file: watch::Sender::new(None),
            user_info: watch::Sender::new(None),
        }
    }

    pub fn phase(&self) -> AuthPhase {
        *self.phase.lock()
    }

    pub fn is_authenticated(&self) -> bool {
        *self.authenticated.borrow()
    }

    pub fn is_loading(&self) -> bool {
        *self.loading.borrow()
    }

    pub fn current_file(&self) -> Option<FileDescriptor> {
        self.current_file.borrow().clone()
    }

    pub fn user_info(&self) -> Option<UserInfo> {
        self.user_info.borrow().clone()
    }

    pub fn subscribe_authenticated(&self) -> watch::Receiver<bool> {
        self.authenticated.subscribe()
    }

    pub fn subscribe_loading(&self) -> watch::Receiver<bool> {
        self.loading.subscribe()
    }

    pub fn subscribe_current_file(&self) -> watch::Receiver<Option<FileDescriptor>> {
        self.current_file.subscribe()
    }

    pub fn subscribe_user_info(&self) -> watch::Receiver<Option<UserInfo>> {
        self.user_info.subscribe()
    }

    /// Only an unauthenticated session moves to `Authenticating`; a signed-in
    /// session re-requesting consent keeps its flag.
    pub fn mark_authenticating(&self) {
        let mut phase = self.phase.lock();
        if *phase == AuthPhase::Unauthenticated {
            *phase = AuthPhase::Authenticating;
        }
    }

    /// Falls back from `Authenticating` after a failed or abandoned request.
    pub fn abort_authenticating(&self) {
        let mut phase = self.phase.lock();
        if *phase == AuthPhase::Authenticating {
            *phase = AuthPhase::Unauthenticated;
        }
    }

    pub fn mark_authenticated(&self) {
        let mut phase = self.phase.lock();
        *phase = AuthPhase::Authenticated;
        self.authenticated.send_replace(true);
    }

    pub fn mark_signed_out(&self) {
        let mut phase = self.phase.lock();
        *phase = AuthPhase::Unauthenticated;
        self.authenticated.send_replace(false);
        self.user_info.send_replace(None);
    }

    pub fn set_loading(&self, loading: bool) {
        self.loading.send_replace(loading);
    }

    pub fn set_current_file(&self, file: Option<FileDescriptor>) {
        self.current_file.send_replace(file);
    }

    pub fn set_user_info(&self, info: Option<UserInfo>) {
        self.user_info.send_replace(info);
    }

    /// Sets `loading` until the returned guard is dropped.
    pub fn loading_guard(&self) -> LoadingGuard<'_> {
        self.set_loading(true);
        LoadingGuard { state: self }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

pub struct LoadingGuard<'a> {
    state: &'a SessionState,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.state.set_loading(false);
    }
}
