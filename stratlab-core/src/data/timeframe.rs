//! Bar interval: parsing, bucketing, annualization.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Trading days per year used for annualization.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;
/// Regular session length in hours.
pub const SESSION_HOURS: f64 = 6.5;

/// Fixed bar interval.
///
/// Serialized as its short string form (`"5min"`, `"1h"`, `"1d"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Timeframe {
    Minutes(u32),
    Hours(u32),
    Days(u32),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("invalid timeframe '{0}' (expected e.g. 1min, 15min, 1h, 1d)")]
pub struct TimeframeError(pub String);

impl Timeframe {
    pub fn duration(&self) -> Duration {
        match *self {
            Timeframe::Minutes(n) => Duration::minutes(n as i64),
            Timeframe::Hours(n) => Duration::hours(n as i64),
            Timeframe::Days(n) => Duration::days(n as i64),
        }
    }

    pub fn seconds(&self) -> i64 {
        self.duration().num_seconds()
    }

    /// Bars per year, assuming equity market sessions.
    pub fn periods_per_year(&self) -> f64 {
        match *self {
            Timeframe::Minutes(n) => TRADING_DAYS_PER_YEAR * SESSION_HOURS * 60.0 / n as f64,
            Timeframe::Hours(n) => TRADING_DAYS_PER_YEAR * SESSION_HOURS / n as f64,
            Timeframe::Days(n) => TRADING_DAYS_PER_YEAR / n as f64,
        }
    }

    /// Start of the bucket containing `time`: epoch seconds floored to a
    /// multiple of the interval.
    pub fn bucket_start(&self, time: DateTime<Utc>) -> DateTime<Utc> {
        let step = self.seconds();
        let secs = time.timestamp();
        let floored = secs - secs.rem_euclid(step);
        DateTime::<Utc>::from_timestamp(floored, 0).unwrap_or(time)
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timeframe::Minutes(n) => write!(f, "{n}min"),
            Timeframe::Hours(n) => write!(f, "{n}h"),
            Timeframe::Days(n) => write!(f, "{n}d"),
        }
    }
}

impl FromStr for Timeframe {
    type Err = TimeframeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let split = lower
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(lower.len());
        let (digits, unit) = lower.split_at(split);
        let n: u32 = if digits.is_empty() {
            1
        } else {
            digits.parse().map_err(|_| TimeframeError(s.to_string()))?
        };
        if n == 0 {
            return Err(TimeframeError(s.to_string()));
        }
        match unit {
            "m" | "min" | "mins" | "minute" | "minutes" | "t" => Ok(Timeframe::Minutes(n)),
            "h" | "hr" | "hour" | "hours" => Ok(Timeframe::Hours(n)),
            "d" | "day" | "days" => Ok(Timeframe::Days(n)),
            _ => Err(TimeframeError(s.to_string())),
        }
    }
}

impl TryFrom<String> for Timeframe {
    type Error = TimeframeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Timeframe> for String {
    fn from(tf: Timeframe) -> Self {
        tf.to_string()
    }
}
