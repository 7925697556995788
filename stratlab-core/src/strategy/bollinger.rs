//! Bollinger band mean reversion: buy at or below the lower band, exit once
//! price is back to the middle band.

use super::params::{ParamReader, RiskParams};
use super::{BarContext, RiskThresholds, Signal, Strategy, StrategyError};
use crate::domain::{Bar, ParameterSet, Side};
use crate::indicators::{Bollinger, BollingerBand, Indicator};

#[derive(Debug, Clone)]
pub struct BollingerReversion {
    period: usize,
    devfactor: f64,
    risk: RiskParams,
    lower: Vec<f64>,
    middle: Vec<f64>,
}

impl BollingerReversion {
    pub const ID: &'static str = "bollinger";

    pub fn from_params(params: &ParameterSet) -> Result<Self, StrategyError> {
        let mut r = ParamReader::new(Self::ID, params);
        let period = r.period("period", 20)?;
        let devfactor = r.float("devfactor", 2.0)?;
        let risk = RiskParams::read(&mut r)?;
        if period < 2 {
            return Err(r.invalid(format!("period must be >= 2, got {period}")));
        }
        if devfactor <= 0.0 {
            return Err(r.invalid(format!("devfactor must be positive, got {devfactor}")));
        }
        r.finish()?;
        Ok(Self {
            period,
            devfactor,
            risk,
            lower: Vec::new(),
            middle: Vec::new(),
        })
    }
}

impl Strategy for BollingerReversion {
    fn id(&self) -> &str {
        Self::ID
    }

    fn initialize(&mut self, history: &[Bar]) {
        self.lower =
            Bollinger::new(self.period, self.devfactor, BollingerBand::Lower).compute(history);
        self.middle =
            Bollinger::new(self.period, self.devfactor, BollingerBand::Middle).compute(history);
    }

    fn on_bar(&mut self, ctx: &BarContext<'_>) -> Signal {
        let (Some(&lower), Some(&middle)) =
            (self.lower.get(ctx.index), self.middle.get(ctx.index))
        else {
            return Signal::None;
        };
        if lower.is_nan() || middle.is_nan() {
            return Signal::None;
        }
        let close = ctx.bar.close;
        match ctx.side() {
            None if close <= lower => Signal::Enter(Side::Long),
            Some(Side::Long) if close >= middle => Signal::Exit,
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::test_bars;
    use crate::strategy::testing::entries_and_exits;

    #[test]
    fn buys_the_dip_and_exits_at_mean() {
        let mut closes = vec![100.0, 101.0, 100.0, 101.0, 100.0, 101.0];
        closes.push(90.0); // well below lower band
        closes.extend([95.0, 99.0, 103.0]);
        let bars = test_bars(&closes);
        let mut s = BollingerReversion::from_params(
            &ParameterSet::new().with("period", 5).with("devfactor", 1.5),
        )
        .unwrap();
        let (entries, exits) = entries_and_exits(&mut s, &bars);
        assert_eq!(entries, vec![6]);
        assert_eq!(exits.len(), 1);
        assert!(exits[0] > 6);
    }

    #[test]
    fn rejects_degenerate_bands() {
        assert!(BollingerReversion::from_params(&ParameterSet::new().with("period", 1)).is_err());
        assert!(
            BollingerReversion::from_params(&ParameterSet::new().with("devfactor", 0.0)).is_err()
        );
    }
}
