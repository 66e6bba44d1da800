//! Test doubles for dependency injection
//!
//! Provides in-memory implementations of all external collaborators for
//! isolated testing.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::config::SCOPES;
use crate::session::Credential;
use crate::traits::{
    AccountSnapshot, AnalyticsProvider, DailyGainSample, GainsQuery, IdentityProvider,
    PresentationEvent, Presenter, ProviderError, TokenClientHandle,
};

// ============================================================================
// ScriptedIdentityProvider
// ============================================================================

/// What the user does on the consent screen
#[derive(Debug, Clone)]
pub enum ConsentBehavior {
    Grant(Credential),
    Deny(String),
}

/// Identity provider with scripted initialization and consent outcomes
///
/// A gated provider holds every consent request until the returned
/// [`Notify`] is signalled, which lets tests observe the Pending state.
pub struct ScriptedIdentityProvider {
    init_error: Option<ProviderError>,
    token_client_error: Option<ProviderError>,
    consent: ConsentBehavior,
    gate: Option<Arc<Notify>>,
    init_calls: Arc<Mutex<usize>>,
    token_requests: Arc<Mutex<usize>>,
}

impl ScriptedIdentityProvider {
    /// Grants a credential carrying all requested scopes
    pub fn new() -> Self {
        Self {
            init_error: None,
            token_client_error: None,
            consent: ConsentBehavior::Grant(Credential::new(
                "test-access-token",
                SCOPES.iter().map(|s| s.to_string()),
            )),
            gate: None,
            init_calls: Arc::new(Mutex::new(0)),
            token_requests: Arc::new(Mutex::new(0)),
        }
    }

    /// Always denies consent with the given provider error code
    pub fn denying(reason: &str) -> Self {
        Self::new().with_consent(ConsentBehavior::Deny(reason.to_string()))
    }

    /// Grants consent only once the returned gate is notified
    pub fn gated() -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let mut provider = Self::new();
        provider.gate = Some(gate.clone());
        (provider, gate)
    }

    pub fn with_consent(mut self, consent: ConsentBehavior) -> Self {
        self.consent = consent;
        self
    }

    pub fn with_init_error(mut self, error: ProviderError) -> Self {
        self.init_error = Some(error);
        self
    }

    pub fn with_token_client_error(mut self, error: ProviderError) -> Self {
        self.token_client_error = Some(error);
        self
    }

    /// Number of times the client library was loaded
    pub fn init_calls(&self) -> usize {
        *self.init_calls.lock().unwrap()
    }

    /// Number of consent requests made
    pub fn token_requests(&self) -> usize {
        *self.token_requests.lock().unwrap()
    }
}

impl Default for ScriptedIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityProvider for ScriptedIdentityProvider {
    async fn init_client(&self, _api_key: &str, _discovery_docs: &[String]) -> Result<(), ProviderError> {
        *self.init_calls.lock().unwrap() += 1;
        match &self.init_error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    fn init_token_client(
        &self,
        client_id: &str,
        scopes: &[String],
    ) -> Result<TokenClientHandle, ProviderError> {
        if let Some(e) = &self.token_client_error {
            return Err(e.clone());
        }
        Ok(TokenClientHandle {
            client_id: client_id.to_string(),
            scopes: scopes.to_vec(),
        })
    }

    async fn request_access_token(&self, _handle: &TokenClientHandle) -> Result<Credential, ProviderError> {
        *self.token_requests.lock().unwrap() += 1;
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        match &self.consent {
            ConsentBehavior::Grant(credential) => Ok(credential.clone()),
            ConsentBehavior::Deny(reason) => Err(ProviderError::AccessDenied(reason.clone())),
        }
    }
}

// ============================================================================
// RecordedAnalyticsProvider
// ============================================================================

/// Analytics provider returning canned data and recording every call
#[derive(Clone)]
pub struct RecordedAnalyticsProvider {
    accounts: Arc<Mutex<Result<Vec<AccountSnapshot>, ProviderError>>>,
    gains: Arc<Mutex<Result<Vec<DailyGainSample>, ProviderError>>>,
    calls: Arc<Mutex<Vec<&'static str>>>,
    queries: Arc<Mutex<Vec<GainsQuery>>>,
    tokens: Arc<Mutex<Vec<String>>>,
}

impl RecordedAnalyticsProvider {
    pub fn new(accounts: Vec<AccountSnapshot>, gains: Vec<DailyGainSample>) -> Self {
        Self {
            accounts: Arc::new(Mutex::new(Ok(accounts))),
            gains: Arc::new(Mutex::new(Ok(gains))),
            calls: Arc::new(Mutex::new(Vec::new())),
            queries: Arc::new(Mutex::new(Vec::new())),
            tokens: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_account_error(self, error: ProviderError) -> Self {
        *self.accounts.lock().unwrap() = Err(error);
        self
    }

    pub fn with_gains_error(self, error: ProviderError) -> Self {
        *self.gains.lock().unwrap() = Err(error);
        self
    }

    /// Endpoint names in call order: "channels" or "reports"
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last_query(&self) -> Option<GainsQuery> {
        self.queries.lock().unwrap().last().cloned()
    }

    /// Bearer tokens attached to each call
    pub fn tokens_seen(&self) -> Vec<String> {
        self.tokens.lock().unwrap().clone()
    }

    fn record(&self, call: &'static str, credential: &Credential) {
        self.calls.lock().unwrap().push(call);
        self.tokens
            .lock()
            .unwrap()
            .push(credential.access_token().to_string());
    }
}

#[async_trait]
impl AnalyticsProvider for RecordedAnalyticsProvider {
    async fn list_channel_statistics(
        &self,
        credential: &Credential,
    ) -> Result<Vec<AccountSnapshot>, ProviderError> {
        self.record("channels", credential);
        self.accounts.lock().unwrap().clone()
    }

    async fn query_daily_gains(
        &self,
        credential: &Credential,
        query: &GainsQuery,
    ) -> Result<Vec<DailyGainSample>, ProviderError> {
        self.record("reports", credential);
        self.queries.lock().unwrap().push(query.clone());
        self.gains.lock().unwrap().clone()
    }
}

// ============================================================================
// RecordedPresenter
// ============================================================================

/// Presenter that records every event it is shown
#[derive(Clone, Default)]
pub struct RecordedPresenter {
    events: Arc<Mutex<Vec<PresentationEvent>>>,
}

impl RecordedPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PresentationEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Current loading flag as the UI would show it
    pub fn is_loading(&self) -> bool {
        self.events
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find_map(|e| match e {
                PresentationEvent::Loading(flag) => Some(*flag),
                _ => None,
            })
            .unwrap_or(false)
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

impl Presenter for RecordedPresenter {
    fn present(&self, event: PresentationEvent) {
        self.events.lock().unwrap().push(event);
    }
}

// ============================================================================
// Tests
// ============================================================================
