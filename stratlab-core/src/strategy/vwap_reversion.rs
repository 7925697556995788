//! VWAP reversion: buy when price trades a set fraction below cumulative VWAP,
//! exit once it is back at or above VWAP.

use super::params::{ParamReader, RiskParams};
use super::{BarContext, RiskThresholds, Signal, Strategy, StrategyError};
use crate::domain::{Bar, ParameterSet, Side};
use crate::indicators::{Indicator, Vwap};

#[derive(Debug, Clone)]
pub struct VwapReversion {
    deviation_pct: f64,
    risk: RiskParams,
    vwap: Vec<f64>,
}

impl VwapReversion {
    pub const ID: &'static str = "vwap_reversion";

    pub fn from_params(params: &ParameterSet) -> Result<Self, StrategyError> {
        let mut r = ParamReader::new(Self::ID, params);
        let deviation_pct = r.float("deviation_pct", 0.01)?;
        let risk = RiskParams::read(&mut r)?;
        if !(deviation_pct > 0.0 && deviation_pct < 1.0) {
            return Err(r.invalid(format!(
                "deviation_pct must be in (0, 1), got {deviation_pct}"
            )));
        }
        r.finish()?;
        Ok(Self {
            deviation_pct,
            risk,
            vwap: Vec::new(),
        })
    }
}

impl Strategy for VwapReversion {
    fn id(&self) -> &str {
        Self::ID
    }

    fn initialize(&mut self, history: &[Bar]) {
        self.vwap = Vwap::new().compute(history);
    }

    fn on_bar(&mut self, ctx: &BarContext<'_>) -> Signal {
        let vwap = match self.vwap.get(ctx.index) {
            Some(&v) if v.is_finite() && v > 0.0 => v,
            _ => return Signal::None,
        };
        let deviation = (ctx.bar.close - vwap) / vwap;
        match ctx.side() {
            None if deviation < -self.deviation_pct => Signal::Enter(Side::Long),
            Some(Side::Long) if deviation >= 0.0 => Signal::Exit,
            _ => Signal::None,
        }
    }

    fn risk(&self) -> RiskThresholds {
        self.risk.thresholds()
    }

    fn position_size(&self) -> f64 {
        self.risk.position_size
    }
}
