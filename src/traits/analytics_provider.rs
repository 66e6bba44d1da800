//! Analytics provider trait: channel statistics and daily subscriber gains

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use super::ProviderError;
use crate::session::Credential;

/// Current cumulative subscriber count of the authorized channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub current_count: u64,
}

/// Net subscribers gained on one calendar day (may be zero or negative)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyGainSample {
    pub date: NaiveDate,
    pub gained: i64,
}

/// Parameters of a daily-gains report query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GainsQuery {
    pub ids: String,
    pub metrics: String,
    pub dimensions: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl GainsQuery {
    /// Query for `[end - window_days, end]`, both ends inclusive.
    pub fn trailing_window(end: NaiveDate, window_days: u64) -> Self {
        let start_date = end.checked_sub_days(Days::new(window_days)).unwrap_or(NaiveDate::MIN);
        Self {
            ids: "channel==MINE".to_string(),
            metrics: "subscribersGained".to_string(),
            dimensions: "day".to_string(),
            start_date,
            end_date: end,
        }
    }
}

/// Trait for the external analytics provider
///
/// Production: YouTube Data API + YouTube Analytics API via reqwest
/// Testing: Recorded responses
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait AnalyticsProvider: Send + Sync {
    /// One snapshot per channel owned by the credential's identity
    async fn list_channel_statistics(
        &self,
        credential: &Credential,
    ) -> Result<Vec<AccountSnapshot>, ProviderError>;

    /// Daily gain samples, ascending by date; days without data are absent
    async fn query_daily_gains(
        &self,
        credential: &Credential,
        query: &GainsQuery,
    ) -> Result<Vec<DailyGainSample>, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_window_is_inclusive_thirty_days() {
        let end = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        let query = GainsQuery::trailing_window(end, 30);

        assert_eq!(query.start_date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(query.end_date, end);
        assert_eq!(query.ids, "channel==MINE");
        assert_eq!(query.metrics, "subscribersGained");
        assert_eq!(query.dimensions, "day");
    }

    #[test]
    fn trailing_window_crosses_year_boundary() {
        let end = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();
        let query = GainsQuery::trailing_window(end, 30);
        assert_eq!(query.start_date, NaiveDate::from_ymd_opt(2024, 12, 11).unwrap());
    }
}
