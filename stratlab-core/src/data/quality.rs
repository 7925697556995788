//! Data quality checks.
//!
//! Validation never drops or repairs rows. It produces a [`QualityReport`]
//! listing every issue found; the caller decides whether to proceed or abort.

use crate::domain::Bar;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One finding from the validation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QualityIssue {
    /// Step between consecutive bars exceeds the allowed maximum.
    Gap {
        after: DateTime<Utc>,
        before: DateTime<Utc>,
        gap_secs: i64,
    },
    DuplicateTimestamp { time: DateTime<Utc> },
    /// Row earlier than its predecessor in source order.
    OutOfOrder { index: usize, time: DateTime<Utc> },
    /// NaN or infinite price field (a missing value in the source).
    NonFiniteValue { time: DateTime<Utc> },
    InvalidOhlc { time: DateTime<Utc> },
    NonPositiveVolume { time: DateTime<Utc> },
    TooFewBars { count: usize, min: usize },
}

/// Thresholds applied by the validation pass and by `load_checked`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityPolicy {
    /// A step larger than this is a gap. `None` uses the bar interval itself.
    pub max_gap_secs: Option<i64>,
    /// Fewer bars than this is reported as `TooFewBars`.
    pub min_bars: usize,
    /// Gaps tolerated before the report counts as failing. `None` tolerates any.
    pub max_gaps: Option<usize>,
}

impl Default for QualityPolicy {
    fn default() -> Self {
        Self {
            max_gap_secs: None,
            min_bars: 10,
            max_gaps: None,
        }
    }
}

/// Structured result of validating one series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub issues: Vec<QualityIssue>,
}

impl QualityReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn gaps(&self) -> usize {
        self.count(|i| matches!(i, QualityIssue::Gap { .. }))
    }

    pub fn duplicates(&self) -> usize {
        self.count(|i| matches!(i, QualityIssue::DuplicateTimestamp { .. }))
    }

    fn count(&self, pred: impl Fn(&QualityIssue) -> bool) -> usize {
        self.issues.iter().filter(|i| pred(i)).count()
    }

    /// Whether the issues go beyond what `policy` tolerates.
    ///
    /// Duplicates, ordering violations, missing values and broken OHLC always
    /// fail. Gaps fail only past `max_gaps`. Non-positive volume is a warning.
    pub fn exceeds(&self, policy: &QualityPolicy) -> bool {
        let hard = self.issues.iter().any(|i| {
            matches!(
                i,
                QualityIssue::DuplicateTimestamp { .. }
                    | QualityIssue::OutOfOrder { .. }
                    | QualityIssue::NonFiniteValue { .. }
                    | QualityIssue::InvalidOhlc { .. }
                    | QualityIssue::TooFewBars { .. }
            )
        });
        let too_many_gaps = policy.max_gaps.is_some_and(|max| self.gaps() > max);
        hard || too_many_gaps
    }
}

impl fmt::Display for QualityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_clean() {
            return write!(f, "no issues");
        }
        let mut counts: Vec<(&str, usize)> = Vec::new();
        for issue in &self.issues {
            let name = match issue {
                QualityIssue::Gap { .. } => "gap",
                QualityIssue::DuplicateTimestamp { .. } => "duplicate timestamp",
                QualityIssue::OutOfOrder { .. } => "out of order",
                QualityIssue::NonFiniteValue { .. } => "missing value",
                QualityIssue::InvalidOhlc { .. } => "invalid OHLC",
                QualityIssue::NonPositiveVolume { .. } => "non-positive volume",
                QualityIssue::TooFewBars { .. } => "too few bars",
            };
            match counts.iter_mut().find(|(n, _)| *n == name) {
                Some((_, c)) => *c += 1,
                None => counts.push((name, 1)),
            }
        }
        let parts: Vec<String> = counts.iter().map(|(n, c)| format!("{c} {n}")).collect();
        write!(f, "{}", parts.join(", "))
    }
}

/// Validate a series in source order against an expected bar interval.
pub fn validate(bars: &[Bar], interval_secs: i64, policy: &QualityPolicy) -> QualityReport {
    let mut issues = Vec::new();
    let max_gap = policy.max_gap_secs.unwrap_or(interval_secs);

    if bars.len() < policy.min_bars {
        issues.push(QualityIssue::TooFewBars {
            count: bars.len(),
            min: policy.min_bars,
        });
    }

    for (i, bar) in bars.iter().enumerate() {
        if bar.has_non_finite() {
            issues.push(QualityIssue::NonFiniteValue { time: bar.time });
        } else if !bar.is_consistent() {
            issues.push(QualityIssue::InvalidOhlc { time: bar.time });
        }
        if bar.volume == 0 {
            issues.push(QualityIssue::NonPositiveVolume { time: bar.time });
        }

        if i == 0 {
            continue;
        }
        let prev = &bars[i - 1];
        let step = (bar.time - prev.time).num_seconds();
        if step == 0 {
            issues.push(QualityIssue::DuplicateTimestamp { time: bar.time });
        } else if step < 0 {
            issues.push(QualityIssue::OutOfOrder {
                index: i,
                time: bar.time,
            });
        } else if step > max_gap {
            issues.push(QualityIssue::Gap {
                after: prev.time,
                before: bar.time,
                gap_secs: step,
            });
        }
    }

    QualityReport { issues }
}
