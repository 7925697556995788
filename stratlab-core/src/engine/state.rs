//! Per-run account state: cash plus at most one open position.

use crate::domain::{Position, Side};

/// Position state of the single-symbol state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Flat,
    Long,
    Short,
}

#[derive(Debug, Clone)]
pub struct EngineState {
    pub cash: f64,
    pub position: Option<Position>,
}

impl EngineState {
    pub fn new(initial_cash: f64) -> Self {
        Self {
            cash: initial_cash,
            position: None,
        }
    }

    pub fn phase(&self) -> Phase {
        match self.position.as_ref().map(|p| p.side) {
            None => Phase::Flat,
            Some(Side::Long) => Phase::Long,
            Some(Side::Short) => Phase::Short,
        }
    }

    /// Cash plus signed mark-to-market value of the open position.
    pub fn equity(&self, mark: f64) -> f64 {
        self.cash
            + self
                .position
                .as_ref()
                .map_or(0.0, |p| p.market_value(mark))
    }
}
