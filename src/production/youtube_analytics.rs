//! YouTube Data + Analytics API client
//!
//! Auth: bearer token from the session credential; see [`classify_failure`]
//! for which rejections count as an unusable credential. Responses are validated
//! into [`AccountSnapshot`] / [`DailyGainSample`] here; anything missing or
//! mistyped becomes [`ProviderError::Malformed`].

use std::time::Duration;

use chrono::NaiveDate;
use reqwest::{Client, Response};
use serde::Deserialize;

use crate::session::Credential;
use crate::traits::{AccountSnapshot, AnalyticsProvider, DailyGainSample, GainsQuery, ProviderError};

const CHANNELS_URL: &str = "https://www.googleapis.com/youtube/v3/channels";
const REPORTS_URL: &str = "https://youtubeanalytics.googleapis.com/v2/reports";
const TIMEOUT_SECONDS: u64 = 25;

#[derive(Deserialize)]
struct ChannelListResponse {
    // Absent when the identity owns no channel
    #[serde(default)]
    items: Vec<ChannelItem>,
}

#[derive(Deserialize)]
struct ChannelItem {
    statistics: ChannelStatistics,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelStatistics {
    #[serde(default)]
    subscriber_count: Option<String>,
    #[serde(default)]
    hidden_subscriber_count: bool,
}

#[derive(Deserialize)]
struct ReportResponse {
    // Absent when the window has no data
    #[serde(default)]
    rows: Vec<Vec<serde_json::Value>>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<ErrorReason>,
}

#[derive(Deserialize)]
struct ErrorReason {
    #[serde(default)]
    reason: String,
}

/// Map a non-2xx status to a provider error.
///
/// 401 and a 403 whose reason is `insufficientPermissions` mean the
/// credential itself is unusable. Any other 403 (quota, API disabled) is a
/// plain HTTP failure.
pub fn classify_failure(status: u16, body: &str) -> ProviderError {
    match status {
        401 => ProviderError::Unauthorized,
        403 => {
            let reasons = serde_json::from_str::<ErrorResponse>(body)
                .map(|r| r.error.errors)
                .unwrap_or_default();
            if reasons.iter().any(|r| r.reason == "insufficientPermissions") {
                ProviderError::Unauthorized
            } else {
                ProviderError::Http(403)
            }
        }
        other => ProviderError::Http(other),
    }
}

/// Validate a `channels.list?part=statistics` body.
pub fn parse_channel_list(body: &str) -> Result<Vec<AccountSnapshot>, ProviderError> {
    let list: ChannelListResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::Malformed(format!("channels.list: {}", e)))?;

    list.items
        .into_iter()
        .map(|item| {
            let stats = item.statistics;
            let raw = stats.subscriber_count.ok_or_else(|| {
                ProviderError::Malformed(if stats.hidden_subscriber_count {
                    "subscriber count is hidden".to_string()
                } else {
                    "statistics.subscriberCount missing".to_string()
                })
            })?;
            let current_count = raw
                .parse::<u64>()
                .map_err(|_| ProviderError::Malformed(format!("subscriberCount {:?} is not a count", raw)))?;
            Ok(AccountSnapshot { current_count })
        })
        .collect()
}

/// Validate a `reports.query` body with rows of `[day, value]`, returned
/// ascending by day.
pub fn parse_report(body: &str) -> Result<Vec<DailyGainSample>, ProviderError> {
    let report: ReportResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::Malformed(format!("reports.query: {}", e)))?;

    let mut samples = report
        .rows
        .iter()
        .enumerate()
        .map(|(i, row)| parse_row(i, row))
        .collect::<Result<Vec<_>, _>>()?;
    samples.sort_by_key(|s| s.date);
    Ok(samples)
}

fn parse_row(index: usize, row: &[serde_json::Value]) -> Result<DailyGainSample, ProviderError> {
    let malformed = |what: &str| ProviderError::Malformed(format!("rows[{}]: {}", index, what));

    let [day, value, ..] = row else {
        return Err(malformed("expected [day, value]"));
    };
    let date = day
        .as_str()
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        .ok_or_else(|| malformed("day is not a YYYY-MM-DD date"))?;
    let gained = value
        .as_i64()
        .or_else(|| value.as_f64().filter(|v| v.fract() == 0.0).map(|v| v as i64))
        .ok_or_else(|| malformed("value is not an integer"))?;

    Ok(DailyGainSample { date, gained })
}

pub struct YouTubeAnalyticsClient {
    client: Client,
}

impl YouTubeAnalyticsClient {
    pub fn new() -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECONDS))
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        tracing::debug!("Initialized analytics client with {}s timeout", TIMEOUT_SECONDS);
        Ok(Self { client })
    }

    /// Map auth failures and non-2xx statuses, then read the body.
    async fn read_body(resp: Response, api: &str) -> Result<String, ProviderError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let err = classify_failure(status.as_u16(), &body);
            if err == ProviderError::Unauthorized {
                tracing::warn!(api = %api, status = %status, "Provider rejected credential");
            } else {
                tracing::warn!(api = %api, status = %status, body = %body, "Provider HTTP error");
            }
            return Err(err);
        }
        Ok(resp.text().await?)
    }
}

#[async_trait::async_trait]
impl AnalyticsProvider for YouTubeAnalyticsClient {
    async fn list_channel_statistics(
        &self,
        credential: &Credential,
    ) -> Result<Vec<AccountSnapshot>, ProviderError> {
        let resp = self
            .client
            .get(CHANNELS_URL)
            .query(&[("part", "statistics"), ("mine", "true")])
            .bearer_auth(credential.access_token())
            .send()
            .await?;

        let body = Self::read_body(resp, "channels.list").await?;
        parse_channel_list(&body)
    }

    async fn query_daily_gains(
        &self,
        credential: &Credential,
        query: &GainsQuery,
    ) -> Result<Vec<DailyGainSample>, ProviderError> {
        let start = query.start_date.format("%Y-%m-%d").to_string();
        let end = query.end_date.format("%Y-%m-%d").to_string();
        let resp = self
            .client
            .get(REPORTS_URL)
            .query(&[
                ("ids", query.ids.as_str()),
                ("metrics", query.metrics.as_str()),
                ("dimensions", query.dimensions.as_str()),
                ("startDate", start.as_str()),
                ("endDate", end.as_str()),
                ("sort", query.dimensions.as_str()),
            ])
            .bearer_auth(credential.access_token())
            .send()
            .await?;

        let body = Self::read_body(resp, "reports.query").await?;
        parse_report(&body)
    }
}
