//! Moving-average crossover.
//!
//! Long when the fast average crosses above the slow one; exit on the reverse
//! cross. With `allow_short`, a bearish cross while flat opens a short.

use super::params::{ParamReader, RiskParams};
use super::{crossover_signal, BarContext, RiskThresholds, Signal, Strategy, StrategyError};
use crate::domain::{Bar, ParameterSet};
use crate::indicators::{crossed_above, Ema, Indicator, Sma};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaType {
    Sma,
    Ema,
}

#[derive(Debug, Clone)]
pub struct MaCrossover {
    fast: usize,
    slow: usize,
    ma_type: MaType,
    allow_short: bool,
    risk: RiskParams,
    fast_ma: Vec<f64>,
    slow_ma: Vec<f64>,
}

impl MaCrossover {
    pub const ID: &'static str = "ma_crossover";

    pub fn from_params(params: &ParameterSet) -> Result<Self, StrategyError> {
        let mut r = ParamReader::new(Self::ID, params);
        let fast = r.period("fast", 5)?;
        let slow = r.period("slow", 100)?;
        let ma_type = match r.text("ma_type", "ema")?.as_str() {
            "sma" => MaType::Sma,
            "ema" => MaType::Ema,
            other => return Err(r.invalid(format!("ma_type must be 'sma' or 'ema', got '{other}'"))),
        };
        let allow_short = r.flag("allow_short", false)?;
        let risk = RiskParams::read(&mut r)?;
        if fast >= slow {
            return Err(r.invalid(format!("fast ({fast}) must be less than slow ({slow})")));
        }
        r.finish()?;
        Ok(Self {
            fast,
            slow,
            ma_type,
            allow_short,
            risk,
            fast_ma: Vec::new(),
            slow_ma: Vec::new(),
        })
    }

    fn average(&self, period: usize, bars: &[Bar]) -> Vec<f64> {
        match self.ma_type {
            MaType::Sma => Sma::new(period).compute(bars),
            MaType::Ema => Ema::new(period).compute(bars),
        }
    }
}

impl Strategy for MaCrossover {
    fn id(&self) -> &str {
        Self::ID
    }

    fn initialize(&mut self, history: &[Bar]) {
        self.fast_ma = self.average(self.fast, history);
        self.slow_ma = self.average(self.slow, history);
    }

    fn on_bar(&mut self, ctx: &BarContext<'_>) -> Signal {
        let i = ctx.index;
        let bullish = crossed_above(&self.fast_ma, &self.slow_ma, i);
        let bearish = crossed_above(&self.slow_ma, &self.fast_ma, i);
        crossover_signal(ctx, bullish, bearish, self.allow_short)
    }

    fn risk(&self) -> RiskThresholds {
        self.risk.thresholds()
    }

    fn position_size(&self) -> f64 {
        self.risk.position_size
    }
}
