//! Growth arithmetic: average daily gain, days to target, and the
//! calendar-naive years/months/days breakdown.
//!
//! Years are always 365 days and months always 30 days. The decomposition
//! must stay exactly reversible: `years * 365 + months * 30 + days`.

use serde::{Deserialize, Serialize};

use crate::traits::DailyGainSample;

pub const DAYS_PER_YEAR: u64 = 365;
pub const DAYS_PER_MONTH: u64 = 30;

/// Time remaining until the target, in calendar-naive units
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Countdown {
    pub years: u64,
    pub months: u64,
    pub days: u64,
}

impl Countdown {
    pub fn from_days(estimated_days: u64) -> Self {
        let rest = estimated_days % DAYS_PER_YEAR;
        Self {
            years: estimated_days / DAYS_PER_YEAR,
            months: rest / DAYS_PER_MONTH,
            days: rest % DAYS_PER_MONTH,
        }
    }

    pub fn total_days(&self) -> u64 {
        self.years * DAYS_PER_YEAR + self.months * DAYS_PER_MONTH + self.days
    }

    pub fn is_zero(&self) -> bool {
        self.total_days() == 0
    }
}

/// Sum of gains divided by the number of samples actually returned.
///
/// A sparse history averages over fewer days than the window; the result is
/// taken at face value. Returns `None` for an empty history.
pub fn average_daily_growth(samples: &[DailyGainSample]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    let total: i64 = samples.iter().map(|s| s.gained).sum();
    Some(total as f64 / samples.len() as f64)
}

/// `ceil(remaining / avg_daily_growth)`; zero when nothing remains.
///
/// Callers must only pass a positive growth rate.
pub fn estimate_days(remaining: u64, avg_daily_growth: f64) -> u64 {
    debug_assert!(avg_daily_growth > 0.0);
    if remaining == 0 {
        return 0;
    }
    (remaining as f64 / avg_daily_growth).ceil() as u64
}
