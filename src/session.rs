//! Session-scoped credential holder
//!
//! The session owns the single active bearer credential for the lifetime of
//! the process. It is never persisted.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

/// Bearer token plus the scopes the user granted.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    access_token: String,
    scopes: BTreeSet<String>,
    expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    pub fn new(access_token: impl Into<String>, scopes: impl IntoIterator<Item = String>) -> Self {
        Self {
            access_token: access_token.into(),
            scopes: scopes.into_iter().collect(),
            expires_at: None,
        }
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn scopes(&self) -> impl Iterator<Item = &str> {
        self.scopes.iter().map(String::as_str)
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.contains(scope)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// A credential without an expiry never expires on our side; the provider
    /// will reject it with 401 once it does.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

// Keep tokens out of logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("scopes", &self.scopes)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Holds the active credential shared by the authorization manager (writer)
/// and the projection engine (reader).
#[derive(Debug, Default)]
pub struct Session {
    active: RwLock<Option<Credential>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a credential as the bearer for all subsequent provider calls.
    pub fn install(&self, credential: Credential) {
        tracing::debug!(
            scopes = credential.scopes.len(),
            expires_at = ?credential.expires_at,
            "Installing active credential"
        );
        *self.active.write().unwrap_or_else(|e| e.into_inner()) = Some(credential);
    }

    /// Drop the active credential, if any.
    pub fn clear(&self) {
        *self.active.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// The active credential if present and not expired.
    pub fn active_credential(&self) -> Option<Credential> {
        self.active_credential_at(Utc::now())
    }

    pub fn active_credential_at(&self, now: DateTime<Utc>) -> Option<Credential> {
        self.active
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .filter(|c| !c.is_expired_at(now))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn credential() -> Credential {
        Credential::new(
            "ya29.token",
            vec!["https://www.googleapis.com/auth/youtube.readonly".to_string()],
        )
    }

    #[test]
    fn empty_session_has_no_credential() {
        let session = Session::new();
        assert!(session.active_credential().is_none());
    }

    #[test]
    fn install_then_clear() {
        let session = Session::new();
        session.install(credential());
        assert_eq!(session.active_credential().unwrap().access_token(), "ya29.token");

        session.clear();
        assert!(session.active_credential().is_none());
    }

    #[test]
    fn expired_credential_is_not_active() {
        let now = Utc::now();
        let session = Session::new();
        session.install(credential().with_expiry(now - Duration::seconds(1)));

        assert!(session.active_credential_at(now).is_none());
        assert!(session
            .active_credential_at(now - Duration::seconds(10))
            .is_some());
    }

    #[test]
    fn debug_output_redacts_token() {
        let rendered = format!("{:?}", credential());
        assert!(!rendered.contains("ya29.token"));
        assert!(rendered.contains("redacted"));
    }

    #[test]
    fn scope_lookup() {
        let cred = credential();
        assert!(cred.has_scope("https://www.googleapis.com/auth/youtube.readonly"));
        assert!(!cred.has_scope("https://www.googleapis.com/auth/yt-analytics.readonly"));
        assert_eq!(cred.scopes().count(), 1);
    }
}
