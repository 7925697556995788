//! Average Directional Index (Wilder).
//!
//! +DM / -DM from consecutive highs and lows, Wilder-smoothed alongside true
//! range into +DI / -DI; DX = 100·|+DI − −DI| / (+DI + −DI); ADX is DX smoothed
//! again. First value at index `2·period − 1`.

use super::atr::{true_range, wilder_smooth};
use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Adx {
    period: usize,
    name: String,
}

impl Adx {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ADX period must be >= 1");
        Self {
            period,
            name: format!("adx_{period}"),
        }
    }
}

impl Indicator for Adx {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        2 * self.period - 1
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let n = bars.len();
        let mut plus_dm = vec![f64::NAN; n];
        let mut minus_dm = vec![f64::NAN; n];
        for i in 1..n {
            let up = bars[i].high - bars[i - 1].high;
            let down = bars[i - 1].low - bars[i].low;
            if !(up.is_finite() && down.is_finite()) {
                continue;
            }
            plus_dm[i] = if up > down && up > 0.0 { up } else { 0.0 };
            minus_dm[i] = if down > up && down > 0.0 { down } else { 0.0 };
        }

        let tr = wilder_smooth(&true_range(bars), self.period);
        let plus = wilder_smooth(&plus_dm, self.period);
        let minus = wilder_smooth(&minus_dm, self.period);

        let dx: Vec<f64> = (0..n)
            .map(|i| {
                if !(tr[i].is_finite() && plus[i].is_finite() && minus[i].is_finite())
                    || tr[i] == 0.0
                {
                    return f64::NAN;
                }
                let plus_di = 100.0 * plus[i] / tr[i];
                let minus_di = 100.0 * minus[i] / tr[i];
                let sum = plus_di + minus_di;
                if sum == 0.0 {
                    0.0
                } else {
                    100.0 * (plus_di - minus_di).abs() / sum
                }
            })
            .collect();
        wilder_smooth(&dx, self.period)
    }
}
