//! Production implementations of traits

mod google_identity;
mod youtube_analytics;

pub use google_identity::{authorization_url, parse_redirect, GoogleIdentityProvider, RedirectOutcome};
pub use youtube_analytics::{parse_channel_list, parse_report, YouTubeAnalyticsClient};
