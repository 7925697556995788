//! Open exposure in one symbol during a simulation run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Direction of an exposure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// +1.0 for long, -1.0 for short.
    pub fn sign(self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }
}

/// An open position. At most one exists per symbol per run (no pyramiding).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub side: Side,
    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,
    pub size: f64,
    // ── Bookkeeping ──
    pub entry_bar: usize,
    pub entry_commission: f64,
}

impl Position {
    /// Unrealized PnL at `price`, before exit costs.
    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        (price - self.entry_price) * self.size * self.side.sign()
    }

    /// Signed market value: positive for long, negative for short.
    pub fn market_value(&self, price: f64) -> f64 {
        self.size * price * self.side.sign()
    }
}
