use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Mark-to-market account value after a bar has been processed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub time: DateTime<Utc>,
    pub equity: f64,
}

impl EquityPoint {
    pub fn new(time: DateTime<Utc>, equity: f64) -> Self {
        Self { time, equity }
    }
}
