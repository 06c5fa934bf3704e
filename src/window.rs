//! Aggregation time windows and hour-bucket helpers.

use chrono::{DateTime, Duration, Local, LocalResult, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Trailing time range over which requests are aggregated.
///
/// `Today` means local midnight to now; the rest are fixed trailing
/// minute offsets from now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Window {
    #[serde(rename = "today")]
    Today,
    #[serde(rename = "last_30m")]
    Last30m,
    #[serde(rename = "last_60m")]
    Last60m,
    #[serde(rename = "last_3h")]
    Last3h,
    #[serde(rename = "last_6h")]
    Last6h,
    #[serde(rename = "last_12h")]
    Last12h,
    #[serde(rename = "last_24h")]
    Last24h,
}

impl Window {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "today" => Some(Self::Today),
            "last_30m" => Some(Self::Last30m),
            "last_60m" => Some(Self::Last60m),
            "last_3h" => Some(Self::Last3h),
            "last_6h" => Some(Self::Last6h),
            "last_12h" => Some(Self::Last12h),
            "last_24h" => Some(Self::Last24h),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Today => "today",
            Self::Last30m => "last_30m",
            Self::Last60m => "last_60m",
            Self::Last3h => "last_3h",
            Self::Last6h => "last_6h",
            Self::Last12h => "last_12h",
            Self::Last24h => "last_24h",
        }
    }

    /// Trailing offset in minutes; `None` for `Today`.
    pub fn minutes(&self) -> Option<i64> {
        match self {
            Self::Today => None,
            Self::Last30m => Some(30),
            Self::Last60m => Some(60),
            Self::Last3h => Some(180),
            Self::Last6h => Some(360),
            Self::Last12h => Some(720),
            Self::Last24h => Some(1440),
        }
    }

    /// Inclusive start of the window ending at `now`.
    pub fn start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self.minutes() {
            Some(m) => now - Duration::minutes(m),
            None => local_midnight(now),
        }
    }
}

/// Local midnight of the day containing `now`, expressed in UTC.
fn local_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    let local_day = now.with_timezone(&Local).date_naive();
    let midnight = match local_day.and_hms_opt(0, 0, 0) {
        Some(t) => t,
        None => return now,
    };
    match Local.from_local_datetime(&midnight) {
        LocalResult::Single(t) | LocalResult::Ambiguous(t, _) => t.with_timezone(&Utc),
        // Midnight skipped by a DST jump; fall back to the raw instant.
        LocalResult::None => now,
    }
}

/// Truncate to the start of the hour containing `t`.
pub fn hour_start(t: DateTime<Utc>) -> DateTime<Utc> {
    t.with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(t)
}
