use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::storage::{KeyValueStore, StorageError};
use crate::sdk::AccessToken;

/// Token record persisted across restarts. `saved_at` is epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedToken {
    pub access_token: String,
    pub expires_in: u64,
    pub scope: String,
    pub token_type: String,
    pub saved_at: i64,
}

impl PersistedToken {
    pub fn new(token: &AccessToken, saved_at: i64) -> Self {
        Self {
            access_token: token.access_token.clone(),
            expires_in: token.expires_in,
            scope: token.scope.clone(),
            token_type: token.token_type.clone(),
            saved_at,
        }
    }

    /// Whole seconds since the record was saved (never negative).
    pub fn elapsed_secs(&self, now_ms: i64) -> i64 {
        now_ms.saturating_sub(self.saved_at).max(0) / 1000
    }

    /// `expires_in` as signed seconds, or `None` when no real token could
    /// carry it.
    fn lifetime_secs(&self) -> Option<i64> {
        i64::try_from(self.expires_in).ok()
    }

    /// Expired once `elapsed >= expires_in - buffer`. A lifetime outside the
    /// representable range counts as expired.
    pub fn is_expired_at(&self, now_ms: i64, buffer_secs: u64) -> bool {
        let Some(lifetime) = self.lifetime_secs() else {
            return true;
        };
        let buffer = i64::try_from(buffer_secs).unwrap_or(i64::MAX);
        self.elapsed_secs(now_ms) >= lifetime.saturating_sub(buffer)
    }

    /// Seconds of validity left, ignoring the buffer.
    pub fn remaining_secs(&self, now_ms: i64) -> u64 {
        let lifetime = self.lifetime_secs().unwrap_or(0);
        lifetime
            .saturating_sub(self.elapsed_secs(now_ms))
            .max(0)
            .unsigned_abs()
    }

    /// The token to install into the client, with its lifetime shortened by
    /// the time already spent on disk.
    pub fn to_access_token(&self, now_ms: i64) -> AccessToken {
        AccessToken {
            access_token: self.access_token.clone(),
            expires_in: self.remaining_secs(now_ms),
            scope: self.scope.clone(),
            token_type: self.token_type.clone(),
        }
    }
}

/// Reads and writes the single token record under a fixed key.
#[derive(Clone)]
pub struct TokenStore {
    storage: Arc<dyn KeyValueStore>,
    key: String,
}

impl TokenStore {
    pub fn new(storage: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn load(&self) -> Result<Option<PersistedToken>, StorageError> {
        let Some(raw) = self.storage.get(&self.key)? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StorageError::Corrupt {
                key: self.key.clone(),
                source,
            })
    }

    pub fn save(&self, token: &PersistedToken) -> Result<(), StorageError> {
        let raw = serde_json::to_string(token)?;
        self.storage.set(&self.key, &raw)
    }

    pub fn clear(&self) -> Result<(), StorageError> {
        self.storage.remove(&self.key)
    }
}
