//! Cumulative VWAP: Σ(typical price × volume) / Σ volume from the first bar.
//!
//! A bar carrying its own `vwap` contributes that price instead of the typical
//! price. Undefined (NaN) until some volume has traded.

use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone, Default)]
pub struct Vwap;

impl Vwap {
    pub fn new() -> Self {
        Self
    }
}

impl Indicator for Vwap {
    fn name(&self) -> &str {
        "vwap"
    }

    fn lookback(&self) -> usize {
        0
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let mut cum_pv = 0.0;
        let mut cum_vol = 0.0;
        bars.iter()
            .map(|bar| {
                let price = bar.vwap.unwrap_or_else(|| bar.typical_price());
                let vol = bar.volume as f64;
                cum_pv += price * vol;
                cum_vol += vol;
                if cum_vol > 0.0 {
                    cum_pv / cum_vol
                } else {
                    f64::NAN
                }
            })
            .collect()
    }
}
