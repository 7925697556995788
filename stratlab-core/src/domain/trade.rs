//! A closed round trip.

use super::position::Side;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What closed the position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    Signal,
    StopLoss,
    TakeProfit,
    EndOfData,
}

/// A completed round-trip trade: entry → exit. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub side: Side,

    // ── Entry ──
    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,

    // ── Exit ──
    pub exit_time: DateTime<Utc>,
    pub exit_price: f64,
    pub exit_reason: ExitReason,

    // ── Size ──
    pub size: f64,

    // ── PnL ──
    /// Net of commission on both legs.
    pub pnl: f64,
    pub commission: f64,

    // ── Duration ──
    pub bars_held: usize,
}

impl Trade {
    /// Net return as a fraction of entry notional.
    pub fn net_return(&self) -> f64 {
        let notional = self.entry_price * self.size;
        if notional == 0.0 {
            return 0.0;
        }
        self.pnl / notional
    }

    pub fn is_winner(&self) -> bool {
        self.pnl > 0.0
    }

    pub fn duration_secs(&self) -> f64 {
        (self.exit_time - self.entry_time).num_seconds() as f64
    }
}
