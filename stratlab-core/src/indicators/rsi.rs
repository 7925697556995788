//! Relative Strength Index (RSI), Wilder smoothing.
//!
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss). Lookback: period.
//! avg_loss == 0 → 100; both zero → 50.

use super::{closes, Indicator};
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    name: String,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "RSI period must be >= 1");
        Self {
            period,
            name: format!("rsi_{period}"),
        }
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let values = closes(bars);
        let n = values.len();
        let mut result = vec![f64::NAN; n];
        if n < self.period + 1 {
            return result;
        }

        let changes: Vec<f64> = (1..n).map(|i| values[i] - values[i - 1]).collect();
        if changes[..self.period].iter().any(|c| !c.is_finite()) {
            return result;
        }
        let p = self.period as f64;
        let mut avg_gain = changes[..self.period].iter().map(|c| c.max(0.0)).sum::<f64>() / p;
        let mut avg_loss = changes[..self.period].iter().map(|c| (-c).max(0.0)).sum::<f64>() / p;
        result[self.period] = rsi_value(avg_gain, avg_loss);

        for i in (self.period + 1)..n {
            let ch = changes[i - 1];
            if !ch.is_finite() {
                break;
            }
            avg_gain = (avg_gain * (p - 1.0) + ch.max(0.0)) / p;
            avg_loss = (avg_loss * (p - 1.0) + (-ch).max(0.0)) / p;
            result[i] = rsi_value(avg_gain, avg_loss);
        }
        result
    }
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        if avg_gain == 0.0 {
            50.0
        } else {
            100.0
        }
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}
