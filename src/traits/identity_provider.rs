//! Identity provider trait for the OAuth2 token handshake

use thiserror::Error;

use crate::session::Credential;

/// Errors raised at the provider boundary (identity and analytics).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("HTTP error: {0}")]
    Http(u16),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Access denied: {0}")]
    AccessDenied(String),
    #[error("Malformed response: {0}")]
    Malformed(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ProviderError::Malformed(e.to_string())
        } else {
            ProviderError::Network(e.to_string())
        }
    }
}

/// An initialized token client: the OAuth client id and the scopes it asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClientHandle {
    pub client_id: String,
    pub scopes: Vec<String>,
}

/// Trait for the external identity provider
///
/// Production: Google OAuth2 installed-app flow
/// Testing: Scripted outcomes
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Load the provider's client library (discovery documents) with the API key
    async fn init_client(&self, api_key: &str, discovery_docs: &[String]) -> Result<(), ProviderError>;

    /// Prepare a token client for the given OAuth client id and scopes
    fn init_token_client(
        &self,
        client_id: &str,
        scopes: &[String],
    ) -> Result<TokenClientHandle, ProviderError>;

    /// Ask the user for consent and resolve to a credential or an error.
    /// Resolves exactly once per call.
    async fn request_access_token(&self, handle: &TokenClientHandle) -> Result<Credential, ProviderError>;
}
