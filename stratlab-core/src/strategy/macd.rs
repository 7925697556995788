//! MACD / signal-line crossover.

use super::params::{ParamReader, RiskParams};
use super::{crossover_signal, BarContext, RiskThresholds, Signal, Strategy, StrategyError};
use crate::domain::{Bar, ParameterSet};
use crate::indicators::{crossed_above, Macd, MacdLine};

#[derive(Debug, Clone)]
pub struct MacdCrossover {
    fast: usize,
    slow: usize,
    signal: usize,
    allow_short: bool,
    risk: RiskParams,
    macd: Vec<f64>,
    signal_line: Vec<f64>,
}

impl MacdCrossover {
    pub const ID: &'static str = "macd";

    pub fn from_params(params: &ParameterSet) -> Result<Self, StrategyError> {
        let mut r = ParamReader::new(Self::ID, params);
        let fast = r.period("fast", 12)?;
        let slow = r.period("slow", 50)?;
        let signal = r.period("signal", 9)?;
        let allow_short = r.flag("allow_short", false)?;
        let risk = RiskParams::read(&mut r)?;
        if fast >= slow {
            return Err(r.invalid(format!("fast ({fast}) must be less than slow ({slow})")));
        }
        r.finish()?;
        Ok(Self {
            fast,
            slow,
            signal,
            allow_short,
            risk,
            macd: Vec::new(),
            signal_line: Vec::new(),
        })
    }
}

impl Strategy for MacdCrossover {
    fn id(&self) -> &str {
        Self::ID
    }

    fn initialize(&mut self, history: &[Bar]) {
        let (macd, signal) =
            Macd::new(self.fast, self.slow, self.signal, MacdLine::Macd).lines(history);
        self.macd = macd;
        self.signal_line = signal;
    }

    fn on_bar(&mut self, ctx: &BarContext<'_>) -> Signal {
        let i = ctx.index;
        let bullish = crossed_above(&self.macd, &self.signal_line, i);
        let bearish = crossed_above(&self.signal_line, &self.macd, i);
        crossover_signal(ctx, bullish, bearish, self.allow_short)
    }

    fn risk(&self) -> RiskThresholds {
        self.risk.thresholds()
    }

    fn position_size(&self) -> f64 {
        self.risk.position_size
    }
}
