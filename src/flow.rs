//! Countdown flow - the "Connect to YouTube" action
//!
//! Sequences authorization and projection and reports progress to the
//! presentation layer. Every `Loading(true)` is paired with exactly one
//! `Loading(false)`.

use std::sync::Arc;

use crate::auth_manager::{AuthError, AuthState, AuthorizationManager};
use crate::diagnosis::diagnose_auth;
use crate::projection::{ProjectionEngine, ProjectionResult};
use crate::traits::{PresentationEvent, Presenter};

pub struct CountdownFlow {
    auth: Arc<AuthorizationManager>,
    engine: Arc<ProjectionEngine>,
    presenter: Arc<dyn Presenter>,
}

impl CountdownFlow {
    pub fn new(
        auth: Arc<AuthorizationManager>,
        engine: Arc<ProjectionEngine>,
        presenter: Arc<dyn Presenter>,
    ) -> Self {
        Self { auth, engine, presenter }
    }

    /// Load the provider library. Failures are shown to the user and
    /// returned; they are not retried.
    pub async fn initialize(&self) -> Result<(), AuthError> {
        self.auth.initialize().await.inspect_err(|e| {
            self.presenter
                .present(PresentationEvent::AuthorizationError(diagnose_auth(e).user_message));
        })
    }

    /// Request access, then project. Returns the projection that was shown,
    /// or the authorization error.
    pub async fn connect(&self) -> Result<ProjectionResult, AuthError> {
        if self.auth.state() == AuthState::Pending {
            let error = AuthError::RequestInFlight;
            tracing::debug!("Connect ignored: authorization already pending");
            self.presenter
                .present(PresentationEvent::AuthorizationError(diagnose_auth(&error).user_message));
            return Err(error);
        }

        self.presenter.present(PresentationEvent::Loading(true));

        let outcome = match self.auth.request_access().await {
            Ok(_) => {
                let result = self.engine.project(self.auth.session()).await;
                tracing::info!(result = %result, "Countdown ready");
                self.presenter.present(PresentationEvent::Projection(result.clone()));
                Ok(result)
            }
            Err(e) => {
                self.presenter
                    .present(PresentationEvent::AuthorizationError(diagnose_auth(&e).user_message));
                Err(e)
            }
        };

        self.presenter.present(PresentationEvent::Loading(false));
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::growth::Countdown;
    use crate::mocks::{RecordedAnalyticsProvider, RecordedPresenter, ScriptedIdentityProvider};
    use crate::session::Session;
    use crate::traits::{AccountSnapshot, DailyGainSample, IdentityProvider};

    fn flow(identity: Arc<dyn IdentityProvider>, analytics: RecordedAnalyticsProvider) -> (CountdownFlow, RecordedPresenter) {
        let settings = Settings::default();
        let auth = Arc::new(AuthorizationManager::new(identity, settings.clone(), Arc::new(Session::new())));
        let engine = Arc::new(ProjectionEngine::new(Arc::new(analytics), &settings));
        let presenter = RecordedPresenter::new();
        (CountdownFlow::new(auth, engine, Arc::new(presenter.clone())), presenter)
    }

    fn growing_channel() -> RecordedAnalyticsProvider {
        let today = chrono::Local::now().date_naive();
        RecordedAnalyticsProvider::new(
            vec![AccountSnapshot { current_count: 99_000 }],
            vec![DailyGainSample { date: today, gained: 100 }],
        )
    }

    #[tokio::test]
    async fn connect_shows_projection_between_loading_flags() {
        let (flow, presenter) = flow(Arc::new(ScriptedIdentityProvider::new()), growing_channel());
        flow.initialize().await.unwrap();

        let result = flow.connect().await.unwrap();

        let expected = ProjectionResult::Success {
            current_count: 99_000,
            countdown: Countdown { years: 0, months: 0, days: 10 },
        };
        assert_eq!(result, expected);
        assert_eq!(
            presenter.events(),
            vec![
                PresentationEvent::Loading(true),
                PresentationEvent::Projection(expected),
                PresentationEvent::Loading(false),
            ]
        );
    }

    #[tokio::test]
    async fn denied_consent_shows_auth_error_and_stops_loading() {
        let analytics = growing_channel();
        let (flow, presenter) = flow(Arc::new(ScriptedIdentityProvider::denying("access_denied")), analytics.clone());
        flow.initialize().await.unwrap();

        let result = flow.connect().await;

        assert!(matches!(result, Err(AuthError::Failed(_))));
        assert_eq!(
            presenter.events(),
            vec![
                PresentationEvent::Loading(true),
                PresentationEvent::AuthorizationError("Authentication failed. Please try again.".to_string()),
                PresentationEvent::Loading(false),
            ]
        );
        assert!(analytics.calls().is_empty());
    }

    #[tokio::test]
    async fn connect_before_initialize_is_not_ready() {
        let (flow, presenter) = flow(Arc::new(ScriptedIdentityProvider::new()), growing_channel());

        let result = flow.connect().await;

        assert_eq!(result, Err(AuthError::NotReady));
        assert_eq!(presenter.events().last(), Some(&PresentationEvent::Loading(false)));
    }

    #[tokio::test]
    async fn init_failure_is_presented() {
        let identity = ScriptedIdentityProvider::new()
            .with_init_error(crate::traits::ProviderError::Network("offline".to_string()));
        let (flow, presenter) = flow(Arc::new(identity), growing_channel());

        assert!(flow.initialize().await.is_err());
        assert_eq!(
            presenter.events(),
            vec![PresentationEvent::AuthorizationError(
                "Error: Unable to load Google API.".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn connect_while_pending_does_not_touch_loading() {
        let (identity, gate) = ScriptedIdentityProvider::gated();
        let (flow, presenter) = flow(Arc::new(identity), growing_channel());
        let flow = Arc::new(flow);
        flow.initialize().await.unwrap();

        let first = tokio::spawn({
            let flow = flow.clone();
            async move { flow.connect().await }
        });
        while flow.auth.state() != AuthState::Pending {
            tokio::task::yield_now().await;
        }

        assert_eq!(flow.connect().await, Err(AuthError::RequestInFlight));
        gate.notify_one();
        assert!(first.await.unwrap().is_ok());

        let loading: Vec<_> = presenter
            .events()
            .into_iter()
            .filter(|e| matches!(e, PresentationEvent::Loading(_)))
            .collect();
        assert_eq!(
            loading,
            vec![PresentationEvent::Loading(true), PresentationEvent::Loading(false)]
        );
    }
}
