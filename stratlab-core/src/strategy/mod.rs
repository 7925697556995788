//! Strategy abstraction.
//!
//! A strategy has a fixed lifecycle: `initialize` once with the full bar
//! history (precompute indicator series), then `on_bar` once per bar in time
//! order. It never sees cash or equity, only its own open position.
//!
//! Stop-loss and take-profit are declared through [`RiskThresholds`] and
//! enforced by the engine, not by the strategy.

pub mod bollinger;
pub mod ma_crossover;
pub mod macd;
pub mod params;
pub mod registry;
pub mod vwap_reversion;

pub use bollinger::BollingerReversion;
pub use ma_crossover::{MaCrossover, MaType};
pub use macd::MacdCrossover;
pub use params::{ParamReader, RiskParams};
pub use registry::StrategyKind;
pub use vwap_reversion::VwapReversion;

use crate::domain::{Bar, Position, Side};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum StrategyError {
    #[error("invalid parameters for {strategy}: {reason}")]
    InvalidParameters { strategy: String, reason: String },

    #[error("unknown strategy '{0}'")]
    UnknownStrategy(String),
}

/// What a strategy wants done at the current bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signal {
    None,
    Enter(Side),
    Exit,
}

/// Fractional offsets from entry price. `None` disables the check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskThresholds {
    pub stop_loss_pct: Option<f64>,
    pub take_profit_pct: Option<f64>,
}

/// Per-bar view handed to `on_bar`.
#[derive(Debug, Clone, Copy)]
pub struct BarContext<'a> {
    pub index: usize,
    pub bar: &'a Bar,
    /// Bars up to and including `index`.
    pub history: &'a [Bar],
    pub position: Option<&'a Position>,
}

impl BarContext<'_> {
    pub fn is_flat(&self) -> bool {
        self.position.is_none()
    }

    pub fn side(&self) -> Option<Side> {
        self.position.map(|p| p.side)
    }
}

pub trait Strategy: Send {
    /// Registry id, e.g. "ma_crossover".
    fn id(&self) -> &str;

    /// Precompute indicator state from the full series.
    fn initialize(&mut self, history: &[Bar]);

    fn on_bar(&mut self, ctx: &BarContext<'_>) -> Signal;

    fn risk(&self) -> RiskThresholds;

    /// Fraction of available cash the default sizing rule commits, in (0, 1].
    fn position_size(&self) -> f64 {
        1.0
    }
}

/// Shared crossover decision used by the MA and MACD variants.
///
/// Bullish cross: enter long when flat, or exit a short. Bearish cross: exit a
/// long, or enter short when flat and shorting is allowed.
pub(crate) fn crossover_signal(
    ctx: &BarContext<'_>,
    bullish: bool,
    bearish: bool,
    allow_short: bool,
) -> Signal {
    match ctx.side() {
        None if bullish => Signal::Enter(Side::Long),
        None if bearish && allow_short => Signal::Enter(Side::Short),
        Some(Side::Long) if bearish => Signal::Exit,
        Some(Side::Short) if bullish => Signal::Exit,
        _ => Signal::None,
    }
}
