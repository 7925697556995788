//! Average True Range, Wilder smoothing.
//!
//! TR[t] = max(high - low, |high - close[t-1]|, |low - close[t-1]|). The first
//! bar has no previous close, so TR[0] is NaN and ATR starts at index `period`
//! as the mean of TR[1..=period].

use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    name: String,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ATR period must be >= 1");
        Self {
            period,
            name: format!("atr_{period}"),
        }
    }
}

pub fn true_range(bars: &[Bar]) -> Vec<f64> {
    let mut tr = vec![f64::NAN; bars.len()];
    for (i, w) in bars.windows(2).enumerate() {
        let (prev, bar) = (&w[0], &w[1]);
        let pc = prev.close;
        tr[i + 1] = (bar.high - bar.low)
            .max((bar.high - pc).abs())
            .max((bar.low - pc).abs());
    }
    tr
}

/// Wilder smoothing (alpha = 1/period), seeded with the mean of the first
/// `period` consecutive finite values. A non-finite value after the seed ends
/// the output (remaining positions stay NaN).
pub fn wilder_smooth(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 {
        return out;
    }
    let p = period as f64;
    let (mut run, mut sum) = (0usize, 0.0);
    let mut prev: Option<f64> = None;
    for (i, &v) in values.iter().enumerate() {
        if !v.is_finite() {
            if prev.is_some() {
                break;
            }
            run = 0;
            sum = 0.0;
            continue;
        }
        let next = match prev {
            Some(last) => (last * (p - 1.0) + v) / p,
            None => {
                run += 1;
                sum += v;
                if run < period {
                    continue;
                }
                sum / p
            }
        };
        out[i] = next;
        prev = Some(next);
    }
    out
}

impl Indicator for Atr {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        wilder_smooth(&true_range(bars), self.period)
    }
}
