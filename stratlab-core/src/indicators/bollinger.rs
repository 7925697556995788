//! Bollinger Bands.
//!
//! Middle = SMA(period); upper/lower = middle ± devfactor × population std.
//! Each band is a separate named instance. Lookback: period - 1.

use super::{closes, rolling_std, sma_of_series, Indicator};
use crate::domain::Bar;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BollingerBand {
    Upper,
    Middle,
    Lower,
}

#[derive(Debug, Clone)]
pub struct Bollinger {
    period: usize,
    devfactor: f64,
    band: BollingerBand,
    name: String,
}

impl Bollinger {
    pub fn new(period: usize, devfactor: f64, band: BollingerBand) -> Self {
        assert!(period >= 1, "Bollinger period must be >= 1");
        let tag = match band {
            BollingerBand::Upper => "upper",
            BollingerBand::Middle => "middle",
            BollingerBand::Lower => "lower",
        };
        Self {
            period,
            devfactor,
            band,
            name: format!("bb_{tag}_{period}_{devfactor}"),
        }
    }
}

impl Indicator for Bollinger {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let values = closes(bars);
        let middle = sma_of_series(&values, self.period);
        if self.band == BollingerBand::Middle {
            return middle;
        }
        let sign = if self.band == BollingerBand::Upper { 1.0 } else { -1.0 };
        let std = rolling_std(&values, self.period);
        middle
            .iter()
            .zip(&std)
            .map(|(m, s)| m + sign * self.devfactor * s)
            .collect()
    }
}
