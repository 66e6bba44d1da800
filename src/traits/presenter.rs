//! Presentation boundary: what the core emits for a UI to render

use crate::projection::ProjectionResult;

#[derive(Debug, Clone, PartialEq)]
pub enum PresentationEvent {
    Loading(bool),
    Projection(ProjectionResult),
    AuthorizationError(String),
}

/// Trait for the presentation layer
///
/// Production: console output in the `countdown` binary
/// Testing: Recorded events
pub trait Presenter: Send + Sync {
    fn present(&self, event: PresentationEvent);
}
