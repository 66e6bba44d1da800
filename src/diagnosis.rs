//! Error classification and user-friendly guidance for failed countdowns

use serde::{Deserialize, Serialize};

use crate::auth_manager::AuthError;
use crate::projection::ProjectionError;

/// Classification categories for countdown failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    LibraryUnavailable, // provider client library could not load
    NotReady,           // asked before initialization finished
    AlreadyInProgress,  // second sign-in while one is pending
    AuthDenied,         // consent denied or cancelled
    AuthRequired,       // no or expired credential, 401/403
    NoChannel,          // identity owns no channel
    NoHistory,          // no rows in the trailing window
    FetchFailed,        // network or payload problem
}

/// Structured diagnosis of a failure with user-facing text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDiagnosis {
    pub category: ErrorCategory,
    pub user_message: String,
    pub guidance: String,
    /// Whether repeating the same action may succeed without the user
    /// changing anything outside this app
    pub retryable: bool,
}

impl ErrorDiagnosis {
    fn new(category: ErrorCategory, user_message: impl Into<String>, guidance: impl Into<String>, retryable: bool) -> Self {
        Self {
            category,
            user_message: user_message.into(),
            guidance: guidance.into(),
            retryable,
        }
    }
}

pub fn diagnose_auth(error: &AuthError) -> ErrorDiagnosis {
    match error {
        AuthError::Init(_) => ErrorDiagnosis::new(
            ErrorCategory::LibraryUnavailable,
            "Error: Unable to load Google API.",
            "Check your internet connection and API key, then start again.",
            false,
        ),
        AuthError::NotReady => ErrorDiagnosis::new(
            ErrorCategory::NotReady,
            "Still connecting to Google. Please try again in a moment.",
            "Wait for initialization to finish before signing in.",
            true,
        ),
        AuthError::RequestInFlight => ErrorDiagnosis::new(
            ErrorCategory::AlreadyInProgress,
            "Sign-in is already in progress.",
            "Finish the consent screen that is already open.",
            true,
        ),
        AuthError::Failed(_) => ErrorDiagnosis::new(
            ErrorCategory::AuthDenied,
            "Authentication failed. Please try again.",
            "Grant read-only access to your YouTube account on the consent screen.",
            true,
        ),
    }
}

pub fn diagnose_projection(error: &ProjectionError) -> ErrorDiagnosis {
    let message = error.to_string();
    match error {
        ProjectionError::AuthRequired => ErrorDiagnosis::new(
            ErrorCategory::AuthRequired,
            message,
            "Your sign-in expired or was revoked. Connect to YouTube again.",
            false,
        ),
        ProjectionError::NoAccount => ErrorDiagnosis::new(
            ErrorCategory::NoChannel,
            message,
            "Sign in with the Google account that owns your YouTube channel.",
            false,
        ),
        ProjectionError::NoHistory => ErrorDiagnosis::new(
            ErrorCategory::NoHistory,
            message,
            "YouTube Analytics has no data for this window yet. New channels can take a few days to report.",
            false,
        ),
        ProjectionError::Fetch => ErrorDiagnosis::new(
            ErrorCategory::FetchFailed,
            message,
            "Check your connection and try again.",
            true,
        ),
    }
}
