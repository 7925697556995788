//! Simple Moving Average (SMA).
//!
//! Rolling mean of close prices. Lookback: period - 1.

use super::{closes, Indicator};
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    name: String,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "SMA period must be >= 1");
        Self {
            period,
            name: format!("sma_{period}"),
        }
    }
}

impl Indicator for Sma {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        sma_of_series(&closes(bars), self.period)
    }
}

/// Rolling mean of an arbitrary series. A window containing NaN yields NaN.
pub fn sma_of_series(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 || n < period {
        return result;
    }

    let mut sum = 0.0;
    let mut nan_count = 0usize;
    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            nan_count += 1;
        } else {
            sum += v;
        }
        if i >= period {
            let leaving = values[i - period];
            if leaving.is_nan() {
                nan_count -= 1;
            } else {
                sum -= leaving;
            }
        }
        if i + 1 >= period && nan_count == 0 {
            result[i] = sum / period as f64;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars};

    #[test]
    fn sma_basic() {
        let bars = make_bars(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let out = Sma::new(3).compute(&bars);
        assert!(out[0].is_nan() && out[1].is_nan());
        assert_approx(out[2], 2.0, 1e-12);
        assert_approx(out[3], 3.0, 1e-12);
        assert_approx(out[4], 4.0, 1e-12);
    }

    #[test]
    fn sma_nan_leaves_window() {
        let out = sma_of_series(&[1.0, f64::NAN, 3.0, 4.0, 5.0], 2);
        assert!(out[1].is_nan());
        assert!(out[2].is_nan());
        assert_approx(out[3], 3.5, 1e-12);
        assert_approx(out[4], 4.5, 1e-12);
    }

    #[test]
    fn sma_short_input_all_nan() {
        assert!(sma_of_series(&[1.0, 2.0], 3).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn no_lookahead() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + (i as f64 * 0.7).sin()).collect();
        let full = sma_of_series(&closes, 5);
        let truncated = sma_of_series(&closes[..20], 5);
        for i in 4..20 {
            assert_eq!(full[i], truncated[i]);
        }
    }
}
