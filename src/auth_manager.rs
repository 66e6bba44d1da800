//! Authorization Manager - OAuth2 token lifecycle
//!
//! Drives the identity handshake through
//! Uninitialized → Ready → Pending → Authorized | Failed, allowing at most one
//! request in flight. On success the credential is installed into the shared
//! [`Session`] before the caller sees the result.

use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;
use tokio::sync::OnceCell;

use crate::config::Settings;
use crate::session::{Credential, Session};
use crate::traits::{IdentityProvider, TokenClientHandle};

/// Errors surfaced by the Authorization Manager
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Unable to load the provider library: {0}")]
    Init(String),
    #[error("Authorization is not ready yet")]
    NotReady,
    #[error("An authorization request is already in progress")]
    RequestInFlight,
    #[error("Authorization failed: {0}")]
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Uninitialized,
    Initializing,
    /// Library or token client could not be set up; terminal for the process
    InitFailed(String),
    Ready,
    Pending,
    Authorized(Credential),
    Failed(String),
}

impl AuthState {
    /// Whether a new access request may start from this state
    fn accepts_request(&self) -> bool {
        matches!(
            self,
            AuthState::Ready | AuthState::Authorized(_) | AuthState::Failed(_)
        )
    }
}

pub struct AuthorizationManager {
    provider: Arc<dyn IdentityProvider>,
    settings: Settings,
    session: Arc<Session>,
    state: Mutex<AuthState>,
    token_client: OnceCell<Result<TokenClientHandle, AuthError>>,
}

impl AuthorizationManager {
    pub fn new(provider: Arc<dyn IdentityProvider>, settings: Settings, session: Arc<Session>) -> Self {
        Self {
            provider,
            settings,
            session,
            state: Mutex::new(AuthState::Uninitialized),
            token_client: OnceCell::new(),
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn state(&self) -> AuthState {
        self.lock_state().clone()
    }

    fn lock_state(&self) -> MutexGuard<'_, AuthState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, next: AuthState) {
        let mut state = self.lock_state();
        tracing::debug!(from = ?*state, to = ?next, "Authorization state change");
        *state = next;
    }

    /// Load the provider library and initialize the token client.
    ///
    /// Runs at most once per manager; later calls return the first outcome.
    pub async fn initialize(&self) -> Result<(), AuthError> {
        let outcome = self
            .token_client
            .get_or_init(|| async {
                self.set_state(AuthState::Initializing);
                let result = self.load().await;
                match &result {
                    Ok(_) => {
                        tracing::info!("Identity provider initialized");
                        self.set_state(AuthState::Ready);
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Identity provider initialization failed");
                        self.set_state(AuthState::InitFailed(e.to_string()));
                    }
                }
                result
            })
            .await;

        outcome.as_ref().map(|_| ()).map_err(|e| e.clone())
    }

    async fn load(&self) -> Result<TokenClientHandle, AuthError> {
        self.provider
            .init_client(&self.settings.api_key, &self.settings.discovery_docs)
            .await
            .map_err(|e| AuthError::Init(e.to_string()))?;

        self.provider
            .init_token_client(&self.settings.client_id, &self.settings.scopes)
            .map_err(|e| AuthError::Init(e.to_string()))
    }

    /// Ask the user for consent.
    ///
    /// Rejected with [`AuthError::NotReady`] before initialization has
    /// succeeded and with [`AuthError::RequestInFlight`] while another
    /// request is pending. Resolves exactly once per accepted request.
    pub async fn request_access(&self) -> Result<Credential, AuthError> {
        let handle = match self.token_client.get() {
            Some(Ok(handle)) => handle,
            _ => {
                tracing::warn!("Access requested before the identity provider was ready");
                return Err(AuthError::NotReady);
            }
        };

        {
            let mut state = self.lock_state();
            if *state == AuthState::Pending {
                tracing::warn!("Rejected access request: another request is pending");
                return Err(AuthError::RequestInFlight);
            }
            if !state.accepts_request() {
                return Err(AuthError::NotReady);
            }
            *state = AuthState::Pending;
        }
        tracing::info!("Requesting access token");

        let _guard = PendingGuard { state: &self.state };
        let outcome = self.provider.request_access_token(handle).await;

        match outcome {
            Ok(credential) => {
                let missing: Vec<&str> = self
                    .settings
                    .scopes
                    .iter()
                    .map(String::as_str)
                    .filter(|s| !credential.has_scope(s))
                    .collect();
                if !missing.is_empty() {
                    tracing::warn!(missing = ?missing, "Credential lacks requested scopes");
                }

                self.session.install(credential.clone());
                self.set_state(AuthState::Authorized(credential.clone()));
                tracing::info!("Authorization succeeded");
                Ok(credential)
            }
            Err(e) => {
                self.session.clear();
                tracing::warn!(error = %e, "Authorization failed");
                self.set_state(AuthState::Failed(e.to_string()));
                Err(AuthError::Failed(e.to_string()))
            }
        }
    }
}

/// Returns the manager to Ready if a pending request is dropped before the
/// provider answers.
struct PendingGuard<'a> {
    state: &'a Mutex<AuthState>,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if *state == AuthState::Pending {
            tracing::debug!("Pending authorization abandoned");
            *state = AuthState::Ready;
        }
    }
}
