//! Trait definitions for dependency injection
//!
//! The identity provider, the analytics provider and the presentation layer
//! are all external collaborators, abstracted behind traits to enable testing.

mod analytics_provider;
mod identity_provider;
mod presenter;

pub use analytics_provider::{AccountSnapshot, AnalyticsProvider, DailyGainSample, GainsQuery};
pub use identity_provider::{IdentityProvider, ProviderError, TokenClientHandle};
pub use presenter::{PresentationEvent, Presenter};

#[cfg(test)]
pub use analytics_provider::MockAnalyticsProvider;
#[cfg(test)]
pub use identity_provider::MockIdentityProvider;
