//! Indicator library.
//!
//! Every indicator maps a bar series to a value series of the same length.
//! Warm-up positions are `f64::NAN`. No value at index t depends on bars after t,
//! so a strategy may precompute full series in `initialize` and read index t in
//! `on_bar` without look-ahead.

pub mod adx;
pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;
pub mod vwap;

pub use adx::Adx;
pub use atr::{true_range, wilder_smooth, Atr};
pub use bollinger::{Bollinger, BollingerBand};
pub use ema::{ema_of_series, Ema};
pub use macd::{Macd, MacdLine};
pub use rsi::Rsi;
pub use sma::{sma_of_series, Sma};
pub use vwap::Vwap;

use crate::domain::Bar;

/// An indicator computed over a whole bar series.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "sma_20").
    fn name(&self) -> &str;

    /// Number of leading NaN values in the output.
    fn lookback(&self) -> usize;

    /// Output has the same length as `bars`.
    fn compute(&self, bars: &[Bar]) -> Vec<f64>;
}

/// Close prices as a plain series.
pub fn closes(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}

/// Rolling population standard deviation. NaN when the window holds a NaN.
pub fn rolling_std(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut out = vec![f64::NAN; n];
    if period == 0 || n < period {
        return out;
    }
    for i in (period - 1)..n {
        let window = &values[i + 1 - period..=i];
        if window.iter().any(|v| !v.is_finite()) {
            continue;
        }
        let mean = window.iter().sum::<f64>() / period as f64;
        let var = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / period as f64;
        out[i] = var.sqrt();
    }
    out
}

/// `a` crosses above `b` at index `i`: below-or-equal at i-1, strictly above at i.
pub fn crossed_above(a: &[f64], b: &[f64], i: usize) -> bool {
    if i == 0 || i >= a.len() || i >= b.len() {
        return false;
    }
    let (a0, a1, b0, b1) = (a[i - 1], a[i], b[i - 1], b[i]);
    if [a0, a1, b0, b1].iter().any(|v| v.is_nan()) {
        return false;
    }
    a0 <= b0 && a1 > b1
}

#[cfg(test)]
pub(crate) fn make_bars(closes: &[f64]) -> Vec<Bar> {
    crate::data::test_bars(closes)
}

/// Daily bars from `(high, low, close)` rows; open = close.
#[cfg(test)]
pub(crate) fn make_ohlc(rows: &[(f64, f64, f64)]) -> Vec<Bar> {
    let closes: Vec<f64> = rows.iter().map(|r| r.2).collect();
    crate::data::test_bars(&closes)
        .into_iter()
        .zip(rows)
        .map(|(bar, &(high, low, close))| Bar {
            open: close,
            high,
            low,
            ..bar
        })
        .collect()
}

#[cfg(test)]
pub(crate) fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rolling_std_population() {
        let out = rolling_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0], 8);
        assert!(out[..7].iter().all(|v| v.is_nan()));
        assert_approx(out[7], 2.0, 1e-12);
    }

    #[test]
    fn rolling_std_nan_window() {
        let out = rolling_std(&[1.0, f64::NAN, 3.0, 4.0], 2);
        assert!(out[1].is_nan());
        assert!(out[2].is_nan());
        assert_approx(out[3], 0.5, 1e-12);
    }

    #[test]
    fn crossover_detection() {
        let fast = [1.0, 2.0, 3.0, 2.0];
        let slow = [2.0, 2.0, 2.0, 2.5];
        assert!(!crossed_above(&fast, &slow, 1)); // touch, not cross
        assert!(crossed_above(&fast, &slow, 2));
        assert!(crossed_above(&slow, &fast, 3));
        assert!(!crossed_above(&fast, &slow, 0));
        assert!(!crossed_above(&[f64::NAN, 3.0], &[2.0, 2.0], 1));
    }
}
