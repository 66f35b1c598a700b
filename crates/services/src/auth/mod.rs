use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use drive_open_config::Settings;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::sdk::{AccessToken, DriveClient, IdentityClient, SdkError, SdkLoader, TokenResponse};
use crate::session::{PersistedToken, SessionState, StorageError, TokenStore, UserInfo};
use crate::wait::{BoundedWait, WaitOutcome};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Google API credentials not configured")]
    MissingCredentials,
    #[error("Identity token client is not initialized")]
    TokenClientUnavailable,
    #[error("Authorization denied: {0}")]
    Denied(String),
    #[error(transparent)]
    Sdk(#[from] SdkError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Drives authorization, persistence and invalidation of the access token.
pub struct TokenLifecycle {
    settings: Settings,
    state: Arc<SessionState>,
    loader: Arc<SdkLoader>,
    drive: Arc<dyn DriveClient>,
    identity: Arc<dyn IdentityClient>,
    tokens: TokenStore,
    in_flight: AtomicBool,
}

impl TokenLifecycle {
    pub fn new(
        settings: Settings,
        state: Arc<SessionState>,
        loader: Arc<SdkLoader>,
        drive: Arc<dyn DriveClient>,
        identity: Arc<dyn IdentityClient>,
        tokens: TokenStore,
    ) -> Self {
        Self {
            settings,
            state,
            loader,
            drive,
            identity,
            tokens,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    /// Whether an authorization request is waiting for its callback.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Dispatches a token request. Resolves once the request is sent, not
    /// when the token arrives; check `authenticated` afterwards. Failures are
    /// logged, never raised. A call made while another request is pending is
    /// coalesced into it.
    pub async fn authenticate(self: &Arc<Self>) {
        if !self.settings.google.has_credentials() {
            error!("{}", AuthError::MissingCredentials);
            return;
        }

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Authorization already in flight, coalescing");
            return;
        }

        let _loading = self.state.loading_guard();
        if let Err(e) = self.dispatch().await {
            error!(error = %e, "Authentication failed");
            self.in_flight.store(false, Ordering::Release);
            self.state.abort_authenticating();
        }
    }

    async fn dispatch(self: &Arc<Self>) -> Result<(), AuthError> {
        self.loader.ensure_ready().await?;
        let client = self
            .loader
            .token_client()
            .ok_or(AuthError::TokenClientUnavailable)?;

        self.state.mark_authenticating();
        let pending = client.request_access_token();
        debug!("Access token requested");

        let this = Arc::clone(self);
        tokio::spawn(async move {
            match pending.wait().await {
                Ok(response) => this.handle_token_response(response).await,
                Err(e) => {
                    warn!(error = %e, "Identity SDK never answered the token request");
                    this.state.abort_authenticating();
                }
            }
            this.in_flight.store(false, Ordering::Release);
        });

        Ok(())
    }

    /// Token callback. Invoked once per authorization attempt.
    pub async fn handle_token_response(&self, response: TokenResponse) {
        if let Some(err) = response.error.as_deref() {
            error!(
                error = %err,
                description = ?response.error_description,
                "Authentication error"
            );
            self.clear_persisted();
            self.state.abort_authenticating();
            return;
        }

        let Some(access_token) = response.access_token.filter(|t| !t.is_empty()) else {
            error!("{}", AuthError::Denied("token response carried no access token".into()));
            self.clear_persisted();
            self.state.abort_authenticating();
            return;
        };

        let token = AccessToken {
            access_token,
            expires_in: response.expires_in.unwrap_or(self.settings.identity.expires_in_secs),
            scope: response
                .scope
                .unwrap_or_else(|| self.settings.google.scope.clone()),
            token_type: response.token_type.unwrap_or_else(|| "Bearer".to_string()),
        };

        let record = PersistedToken::new(&token, Utc::now().timestamp_millis());
        if let Err(e) = self.tokens.save(&record) {
            warn!(error = %e, "Failed to persist access token");
        }

        // The flag flips before the token becomes visible, so anyone polling
        // the token slot already sees an authenticated session.
        self.state.mark_authenticated();
        self.drive.set_token(Some(token));
        info!(expires_in = record.expires_in, "Authenticated with Google Drive");

        if self.settings.google.fetch_profile {
            self.fetch_profile().await;
        }
    }

    async fn fetch_profile(&self) {
        match self.drive.request(&self.settings.google.userinfo_url).await {
            Ok(json) => match serde_json::from_value::<UserInfo>(json) {
                Ok(info) => {
                    debug!(email = %info.email, "User profile loaded");
                    self.state.set_user_info(Some(info));
                }
                Err(e) => warn!(error = %e, "Malformed userinfo response"),
            },
            Err(e) => warn!(error = %e, "Error getting user info"),
        }
    }

    /// Revokes and forgets the current token. Idempotent.
    pub async fn sign_out(&self) {
        if let Some(token) = self.drive.get_token() {
            if let Err(e) = self.identity.revoke(&token.access_token).await {
                warn!(error = %e, "Token revocation failed");
            }
            self.drive.set_token(None);
        }
        self.clear_persisted();
        self.state.mark_signed_out();
        info!("Signed out");
    }

    /// Reinstates a persisted token if it is still inside its validity
    /// window. Never fails; any problem removes the record.
    pub async fn restore_auth(&self) -> bool {
        let record = match self.tokens.load() {
            Ok(Some(record)) => record,
            Ok(None) => return false,
            Err(e) => {
                warn!(error = %e, "Discarding unreadable persisted token");
                self.clear_persisted();
                return false;
            }
        };

        let now = Utc::now().timestamp_millis();
        let buffer = self.settings.storage.expiry_buffer_secs;
        if record.is_expired_at(now, buffer) {
            info!(
                elapsed = record.elapsed_secs(now),
                expires_in = record.expires_in,
                "Persisted token expired"
            );
            self.clear_persisted();
            return false;
        }

        if let Err(e) = self.loader.ensure_ready().await {
            warn!(error = %e, "Failed to restore session");
            self.clear_persisted();
            return false;
        }

        self.state.mark_authenticated();
        self.drive.set_token(Some(record.to_access_token(now)));
        info!(remaining = record.remaining_secs(now), "Session restored");
        true
    }

    /// Polls the client's token slot until a token shows up.
    pub async fn wait_for_token(&self, wait: BoundedWait) -> WaitOutcome<AccessToken> {
        wait.until(|| self.drive.get_token()).await
    }

    fn clear_persisted(&self) {
        if let Err(e) = self.tokens.clear() {
            warn!(key = %self.tokens.key(), error = %e, "Failed to remove persisted token");
        }
    }
}
