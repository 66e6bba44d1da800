//! Projection Engine
//!
//! Fetches the channel's subscriber count, then its daily gains over the
//! trailing window (strictly in that order), and projects how long the
//! channel needs to reach the target.

use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;
use thiserror::Error;

use crate::config::{Settings, TARGET_COUNT, WINDOW_DAYS};
use crate::growth::{average_daily_growth, estimate_days, Countdown};
use crate::session::Session;
use crate::traits::{AccountSnapshot, AnalyticsProvider, DailyGainSample, GainsQuery, ProviderError};

/// Reasons no projection could be produced. The display text is what the
/// user sees.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProjectionError {
    #[error("Please sign in again to continue.")]
    AuthRequired,
    #[error("No channel found for this account.")]
    NoAccount,
    #[error("No subscriber history found for the last {} days.", WINDOW_DAYS)]
    NoHistory,
    #[error("Failed to fetch data")]
    Fetch,
}

impl From<ProviderError> for ProjectionError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::Unauthorized => ProjectionError::AuthRequired,
            other => {
                tracing::warn!(error = %other, "Provider call failed");
                ProjectionError::Fetch
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectionResult {
    /// Time left until the target, with the subscriber count it starts from
    Success { current_count: u64, countdown: Countdown },
    InsufficientGrowth,
    Error(ProjectionError),
}

impl fmt::Display for ProjectionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectionResult::Success { countdown: c, .. } if c.is_zero() => {
                write!(f, "You have already reached {} subscribers", compact_count(TARGET_COUNT))
            }
            ProjectionResult::Success { countdown: c, .. } => write!(
                f,
                "{} years, {} months, {} days until {} subscribers",
                c.years,
                c.months,
                c.days,
                compact_count(TARGET_COUNT)
            ),
            ProjectionResult::InsufficientGrowth => write!(
                f,
                "Your channel has not grown over the last {} days, so no date can be projected.",
                WINDOW_DAYS
            ),
            ProjectionResult::Error(e) => write!(f, "{}", e),
        }
    }
}

/// 100000 -> "100K", 1500000 -> "1.5M"
fn compact_count(n: u64) -> String {
    match n {
        n if n >= 1_000_000 && n % 100_000 == 0 => trim_suffix(n / 100_000, "M"),
        n if n >= 1_000 && n % 100 == 0 => trim_suffix(n / 100, "K"),
        n => n.to_string(),
    }
}

fn trim_suffix(tenths: u64, unit: &str) -> String {
    if tenths % 10 == 0 {
        format!("{}{}", tenths / 10, unit)
    } else {
        format!("{}.{}{}", tenths / 10, tenths % 10, unit)
    }
}

/// Project time-to-target from already fetched data.
pub fn project_from(account: AccountSnapshot, samples: &[DailyGainSample], target: u64) -> ProjectionResult {
    let Some(avg) = average_daily_growth(samples) else {
        return ProjectionResult::Error(ProjectionError::NoHistory);
    };
    if avg <= 0.0 {
        return ProjectionResult::InsufficientGrowth;
    }

    let remaining = target.saturating_sub(account.current_count);
    if remaining == 0 {
        tracing::info!(current = account.current_count, target_count = target, "Target already reached");
        return ProjectionResult::Success {
            current_count: account.current_count,
            countdown: Countdown::default(),
        };
    }

    let days = estimate_days(remaining, avg);
    tracing::debug!(remaining, avg_daily_growth = avg, samples = samples.len(), days, "Projected");
    ProjectionResult::Success {
        current_count: account.current_count,
        countdown: Countdown::from_days(days),
    }
}

pub struct ProjectionEngine {
    analytics: Arc<dyn AnalyticsProvider>,
    target_count: u64,
    window_days: u64,
}

impl ProjectionEngine {
    pub fn new(analytics: Arc<dyn AnalyticsProvider>, settings: &Settings) -> Self {
        Self {
            analytics,
            target_count: settings.target_count,
            window_days: settings.window_days,
        }
    }

    /// Project using the session's active credential, with the window ending today.
    pub async fn project(&self, session: &Session) -> ProjectionResult {
        self.project_on(session, chrono::Local::now().date_naive()).await
    }

    /// Same as [`project`](Self::project) with an explicit window end date.
    pub async fn project_on(&self, session: &Session, today: NaiveDate) -> ProjectionResult {
        match self.fetch_and_project(session, today).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(error = ?e, "Projection failed");
                ProjectionResult::Error(e)
            }
        }
    }

    async fn fetch_and_project(
        &self,
        session: &Session,
        today: NaiveDate,
    ) -> Result<ProjectionResult, ProjectionError> {
        let credential = session
            .active_credential()
            .ok_or(ProjectionError::AuthRequired)?;

        let account = self
            .analytics
            .list_channel_statistics(&credential)
            .await?
            .into_iter()
            .next()
            .ok_or(ProjectionError::NoAccount)?;
        tracing::info!(subscribers = account.current_count, "Fetched channel statistics");

        let query = GainsQuery::trailing_window(today, self.window_days);
        let samples = self.analytics.query_daily_gains(&credential, &query).await?;
        tracing::info!(
            samples = samples.len(),
            start = %query.start_date,
            end = %query.end_date,
            "Fetched daily gains"
        );

        Ok(project_from(account, &samples, self.target_count))
    }
}
