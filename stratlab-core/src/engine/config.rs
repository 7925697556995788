//! Engine configuration.

use super::SimulationError;
use serde::{Deserialize, Serialize};

/// How many units an entry buys or sells.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", content = "value", rename_all = "snake_case")]
pub enum SizingRule {
    /// Commit this fraction of available cash (times the strategy's
    /// `position_size`), in whole units, commission included.
    CashFraction(f64),
    /// Always trade this many units.
    FixedUnits(f64),
}

impl Default for SizingRule {
    fn default() -> Self {
        SizingRule::CashFraction(1.0)
    }
}

/// Configuration for a single simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub initial_cash: f64,
    /// Fraction of notional charged per fill (0.002 = 0.2%).
    pub commission_rate: f64,
    /// Adverse price offset per fill, in basis points.
    pub slippage_bps: f64,
    pub sizing: SizingRule,
    /// When false, `Enter(Short)` signals are ignored.
    pub allow_short: bool,
    /// Close any open position at the last bar's close.
    pub close_at_end: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_cash: 100_000.0,
            commission_rate: 0.002,
            slippage_bps: 0.0,
            sizing: SizingRule::default(),
            allow_short: false,
            close_at_end: true,
        }
    }
}

impl EngineConfig {
    pub fn frictionless(initial_cash: f64) -> Self {
        Self {
            initial_cash,
            commission_rate: 0.0,
            slippage_bps: 0.0,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), SimulationError> {
        let invalid = |msg: String| Err(SimulationError::InvalidConfig(msg));
        if !(self.initial_cash.is_finite() && self.initial_cash > 0.0) {
            return invalid(format!("initial_cash must be positive, got {}", self.initial_cash));
        }
        if !(0.0..1.0).contains(&self.commission_rate) {
            return invalid(format!(
                "commission_rate must be in [0, 1), got {}",
                self.commission_rate
            ));
        }
        if !(0.0..10_000.0).contains(&self.slippage_bps) {
            return invalid(format!(
                "slippage_bps must be in [0, 10000), got {}",
                self.slippage_bps
            ));
        }
        match self.sizing {
            SizingRule::CashFraction(f) if !(f > 0.0 && f <= 1.0) => {
                invalid(format!("cash fraction must be in (0, 1], got {f}"))
            }
            SizingRule::FixedUnits(n) if !(n.is_finite() && n > 0.0) => {
                invalid(format!("fixed units must be positive, got {n}"))
            }
            _ => Ok(()),
        }
    }
}
