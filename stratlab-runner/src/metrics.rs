//! Performance metrics: pure functions from an equity curve and trade list to
//! scalar statistics.
//!
//! Percent-valued fields are in percent (25.0 means 25%). Ratios are unitless.
//! Undefined values are reported, never panicked on: zero-variance Sharpe is 0,
//! a profit factor without losing trades is `None`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use stratlab_core::domain::{EquityPoint, Trade};

const SECONDS_PER_YEAR: f64 = 365.25 * 86_400.0;

/// Aggregate performance metrics for a single run (or an aggregated portfolio curve).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    // ── Returns ──
    pub total_return_pct: f64,
    pub annualized_return_pct: f64,
    pub final_equity: f64,

    // ── Risk-adjusted ──
    pub sharpe: f64,
    pub sortino: f64,
    pub calmar: f64,

    // ── Risk ──
    pub max_drawdown_pct: f64,
    pub volatility_pct: f64,

    // ── Trades ──
    pub total_trades: usize,
    pub win_rate_pct: f64,
    pub avg_trade_pct: f64,
    /// `None` when there is no gross loss to divide by.
    pub profit_factor: Option<f64>,
    pub avg_trade_duration_secs: f64,
}

impl PerformanceMetrics {
    /// Compute all metrics.
    ///
    /// `initial_equity` is the starting account value (the curve starts after
    /// the first bar). `periods_per_year` scales Sharpe, Sortino and volatility
    /// and should match the bar timeframe.
    pub fn compute(
        initial_equity: f64,
        equity_curve: &[EquityPoint],
        trades: &[Trade],
        periods_per_year: f64,
    ) -> Self {
        let values: Vec<f64> = std::iter::once(initial_equity)
            .chain(equity_curve.iter().map(|p| p.equity))
            .collect();
        let returns = periodic_returns(&values);
        let final_equity = equity_curve.last().map_or(initial_equity, |p| p.equity);
        let annualized = annualized_return_pct(initial_equity, equity_curve);
        let max_dd = max_drawdown_pct(&values);

        Self {
            total_return_pct: total_return_pct(initial_equity, final_equity),
            annualized_return_pct: annualized,
            final_equity,
            sharpe: sharpe_ratio(&returns, periods_per_year),
            sortino: sortino_ratio(&returns, periods_per_year),
            calmar: calmar_ratio(annualized, max_dd),
            max_drawdown_pct: max_dd,
            volatility_pct: volatility_pct(&returns, periods_per_year),
            total_trades: trades.len(),
            win_rate_pct: win_rate_pct(trades),
            avg_trade_pct: avg_trade_pct(trades),
            profit_factor: profit_factor(trades),
            avg_trade_duration_secs: avg_trade_duration_secs(trades),
        }
    }
}

// ─── Metric selector ────────────────────────────────────────────────

/// Whether larger or smaller values of a metric are better.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Maximize,
    Minimize,
}

impl Direction {
    /// True if `a` is strictly better than `b`.
    pub fn is_better(&self, a: f64, b: f64) -> bool {
        match self {
            Direction::Maximize => a > b,
            Direction::Minimize => a < b,
        }
    }

    /// Ordering with the best value first; undefined values sort last.
    pub fn rank_order(&self, a: Option<f64>, b: Option<f64>) -> std::cmp::Ordering {
        use std::cmp::Ordering;
        match (a, b) {
            (Some(x), Some(y)) => {
                let ord = x.partial_cmp(&y).unwrap_or(Ordering::Equal);
                match self {
                    Direction::Maximize => ord.reverse(),
                    Direction::Minimize => ord,
                }
            }
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
}

/// A named statistic of [`PerformanceMetrics`], used to select and rank runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    TotalReturnPct,
    AnnualizedReturnPct,
    #[default]
    Sharpe,
    Sortino,
    Calmar,
    MaxDrawdownPct,
    VolatilityPct,
    TotalTrades,
    WinRatePct,
    AvgTradePct,
    ProfitFactor,
    AvgTradeDurationSecs,
    FinalEquity,
}

impl Metric {
    pub fn all() -> &'static [Metric] {
        &[
            Metric::TotalReturnPct,
            Metric::AnnualizedReturnPct,
            Metric::Sharpe,
            Metric::Sortino,
            Metric::Calmar,
            Metric::MaxDrawdownPct,
            Metric::VolatilityPct,
            Metric::TotalTrades,
            Metric::WinRatePct,
            Metric::AvgTradePct,
            Metric::ProfitFactor,
            Metric::AvgTradeDurationSecs,
            Metric::FinalEquity,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::TotalReturnPct => "total_return_pct",
            Metric::AnnualizedReturnPct => "annualized_return_pct",
            Metric::Sharpe => "sharpe",
            Metric::Sortino => "sortino",
            Metric::Calmar => "calmar",
            Metric::MaxDrawdownPct => "max_drawdown_pct",
            Metric::VolatilityPct => "volatility_pct",
            Metric::TotalTrades => "total_trades",
            Metric::WinRatePct => "win_rate_pct",
            Metric::AvgTradePct => "avg_trade_pct",
            Metric::ProfitFactor => "profit_factor",
            Metric::AvgTradeDurationSecs => "avg_trade_duration_secs",
            Metric::FinalEquity => "final_equity",
        }
    }

    /// Extract this metric. `None` means undefined (or non-finite).
    pub fn value(&self, m: &PerformanceMetrics) -> Option<f64> {
        let v = match self {
            Metric::TotalReturnPct => m.total_return_pct,
            Metric::AnnualizedReturnPct => m.annualized_return_pct,
            Metric::Sharpe => m.sharpe,
            Metric::Sortino => m.sortino,
            Metric::Calmar => m.calmar,
            Metric::MaxDrawdownPct => m.max_drawdown_pct,
            Metric::VolatilityPct => m.volatility_pct,
            Metric::TotalTrades => m.total_trades as f64,
            Metric::WinRatePct => m.win_rate_pct,
            Metric::AvgTradePct => m.avg_trade_pct,
            Metric::ProfitFactor => m.profit_factor?,
            Metric::AvgTradeDurationSecs => m.avg_trade_duration_secs,
            Metric::FinalEquity => m.final_equity,
        };
        v.is_finite().then_some(v)
    }

    /// Drawdown and volatility rank smaller-is-better; everything else larger.
    pub fn default_direction(&self) -> Direction {
        match self {
            Metric::MaxDrawdownPct | Metric::VolatilityPct => Direction::Minimize,
            _ => Direction::Maximize,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("unknown metric '{0}'")]
pub struct UnknownMetric(pub String);

impl FromStr for Metric {
    type Err = UnknownMetric;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metric::all()
            .iter()
            .copied()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| UnknownMetric(s.to_string()))
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// (final / initial − 1) in percent. 0 when the initial value is not positive.
pub fn total_return_pct(initial: f64, final_equity: f64) -> f64 {
    if initial <= 0.0 {
        return 0.0;
    }
    (final_equity / initial - 1.0) * 100.0
}

/// Compound annual growth over the calendar time spanned by the curve.
///
/// 0 for fewer than two points, zero elapsed time, or a wiped-out account.
pub fn annualized_return_pct(initial: f64, equity_curve: &[EquityPoint]) -> f64 {
    let (Some(first), Some(last)) = (equity_curve.first(), equity_curve.last()) else {
        return 0.0;
    };
    let years = (last.time - first.time).num_seconds() as f64 / SECONDS_PER_YEAR;
    if years <= 0.0 || initial <= 0.0 || last.equity <= 0.0 {
        return 0.0;
    }
    let cagr = ((last.equity / initial).powf(1.0 / years) - 1.0) * 100.0;
    // Very short spans can overflow; treat as undefined.
    if cagr.is_finite() {
        cagr
    } else {
        0.0
    }
}

/// Simple returns between consecutive values; a non-positive base yields 0.
pub fn periodic_returns(values: &[f64]) -> Vec<f64> {
    values
        .windows(2)
        .map(|w| if w[0] > 0.0 { w[1] / w[0] - 1.0 } else { 0.0 })
        .collect()
}

/// mean / sample std × √periods_per_year. 0 for zero variance or < 2 returns.
pub fn sharpe_ratio(returns: &[f64], periods_per_year: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let std = std_dev(returns);
    if std < 1e-15 {
        return 0.0;
    }
    mean(returns) / std * periods_per_year.sqrt()
}

/// Like Sharpe, with downside deviation √(Σ min(r, 0)² / n) as denominator.
pub fn sortino_ratio(returns: &[f64], periods_per_year: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let downside_sq: f64 = returns
        .iter()
        .filter(|&&r| r < 0.0)
        .map(|r| r * r)
        .sum();
    let downside = (downside_sq / returns.len() as f64).sqrt();
    if downside < 1e-15 {
        return 0.0;
    }
    mean(returns) / downside * periods_per_year.sqrt()
}

/// Annualized return over max drawdown; 0 when there was no drawdown.
pub fn calmar_ratio(annualized_return_pct: f64, max_drawdown_pct: f64) -> f64 {
    if max_drawdown_pct <= 0.0 {
        return 0.0;
    }
    annualized_return_pct / max_drawdown_pct
}

/// Largest peak-to-trough decline, as a positive percent of the peak.
pub fn max_drawdown_pct(values: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;
    for &v in values {
        peak = peak.max(v);
        if peak > 0.0 {
            worst = worst.max((peak - v) / peak);
        }
    }
    worst * 100.0
}

/// Annualized standard deviation of periodic returns, in percent.
pub fn volatility_pct(returns: &[f64], periods_per_year: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    std_dev(returns) * periods_per_year.sqrt() * 100.0
}

/// Winning trades over all closed trades, in percent. 0 without trades.
pub fn win_rate_pct(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let wins = trades.iter().filter(|t| t.is_winner()).count();
    wins as f64 / trades.len() as f64 * 100.0
}

/// Mean net return per trade, in percent of entry notional.
pub fn avg_trade_pct(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().map(|t| t.net_return()).sum::<f64>() / trades.len() as f64 * 100.0
}

/// Gross profit / gross loss. `None` when gross loss is zero.
pub fn profit_factor(trades: &[Trade]) -> Option<f64> {
    let gross_profit: f64 = trades.iter().filter(|t| t.pnl > 0.0).map(|t| t.pnl).sum();
    let gross_loss: f64 = trades
        .iter()
        .filter(|t| t.pnl < 0.0)
        .map(|t| t.pnl.abs())
        .sum();
    if gross_loss == 0.0 {
        return None;
    }
    Some(gross_profit / gross_loss)
}

pub fn avg_trade_duration_secs(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().map(|t| t.duration_secs()).sum::<f64>() / trades.len() as f64
}

// ─── Helpers ────────────────────────────────────────────────────────

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n − 1).
fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use stratlab_core::domain::{ExitReason, Side};

    fn curve(values: &[f64]) -> Vec<EquityPoint> {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| EquityPoint::new(t0 + Duration::days(i as i64), v))
            .collect()
    }

    fn trade(pnl: f64, days: i64) -> Trade {
        let entry = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Trade {
            side: Side::Long,
            entry_time: entry,
            entry_price: 100.0,
            exit_time: entry + Duration::days(days),
            exit_price: 100.0 + pnl / 10.0,
            exit_reason: ExitReason::Signal,
            size: 10.0,
            pnl,
            commission: 0.0,
            bars_held: days as usize,
        }
    }

    #[test]
    fn max_drawdown_reference_curve() {
        assert!((max_drawdown_pct(&[100.0, 120.0, 90.0, 110.0]) - 25.0).abs() < 1e-10);
    }

    #[test]
    fn max_drawdown_monotonic_is_zero() {
        assert_eq!(max_drawdown_pct(&[100.0, 101.0, 150.0]), 0.0);
        assert_eq!(max_drawdown_pct(&[]), 0.0);
    }

    #[test]
    fn zero_trades_are_well_defined() {
        let m = PerformanceMetrics::compute(100.0, &curve(&[100.0, 100.0]), &[], 252.0);
        assert_eq!(m.win_rate_pct, 0.0);
        assert_eq!(m.profit_factor, None);
        assert_eq!(m.total_trades, 0);
        assert_eq!(m.avg_trade_duration_secs, 0.0);
        assert_eq!(Metric::ProfitFactor.value(&m), None);
    }

    #[test]
    fn zero_variance_sharpe_is_zero() {
        assert_eq!(sharpe_ratio(&[0.01, 0.01, 0.01], 252.0), 0.0);
        assert_eq!(sharpe_ratio(&[0.01], 252.0), 0.0);
    }

    #[test]
    fn sharpe_matches_hand_computation() {
        let r: [f64; 3] = [0.01, -0.02, 0.03];
        let mean = 0.02 / 3.0;
        let var = r.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / 2.0;
        let expected = mean / var.sqrt() * 252.0_f64.sqrt();
        assert!((sharpe_ratio(&r, 252.0) - expected).abs() < 1e-12);
    }

    #[test]
    fn sortino_ignores_upside() {
        assert_eq!(sortino_ratio(&[0.01, 0.02], 252.0), 0.0);
        assert!(sortino_ratio(&[0.03, -0.01, 0.02], 252.0) > 0.0);
    }

    #[test]
    fn profit_factor_and_win_rate() {
        let trades = vec![trade(30.0, 1), trade(-10.0, 3), trade(20.0, 2)];
        assert_eq!(profit_factor(&trades), Some(5.0));
        assert!((win_rate_pct(&trades) - 200.0 / 3.0).abs() < 1e-10);
        assert_eq!(avg_trade_duration_secs(&trades), 2.0 * 86_400.0);
        assert!((avg_trade_pct(&trades) - (4.0 / 3.0)).abs() < 1e-10);
    }

    #[test]
    fn profit_factor_without_losses_is_undefined() {
        assert_eq!(profit_factor(&[trade(5.0, 1)]), None);
    }

    #[test]
    fn total_and_annualized_return() {
        assert!((total_return_pct(100.0, 125.0) - 25.0).abs() < 1e-12);
        let t0 = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let two_years = vec![
            EquityPoint::new(t0, 100.0),
            EquityPoint::new(t0 + Duration::seconds((2.0 * SECONDS_PER_YEAR) as i64), 121.0),
        ];
        assert!((annualized_return_pct(100.0, &two_years) - 10.0).abs() < 1e-6);
        assert_eq!(annualized_return_pct(100.0, &two_years[..1]), 0.0);
    }

    #[test]
    fn compute_uses_initial_equity_as_baseline() {
        let m = PerformanceMetrics::compute(100.0, &curve(&[120.0, 90.0, 110.0]), &[], 252.0);
        assert!((m.max_drawdown_pct - 25.0).abs() < 1e-10);
        assert!((m.total_return_pct - 10.0).abs() < 1e-10);
        assert_eq!(m.final_equity, 110.0);
        assert!(m.volatility_pct > 0.0);
        assert!(m.calmar != 0.0);
    }

    #[test]
    fn metric_names_round_trip_and_directions() {
        for m in Metric::all() {
            assert_eq!(m.as_str().parse::<Metric>().unwrap(), *m);
            let json = serde_json::to_string(m).unwrap();
            assert_eq!(json, format!("\"{}\"", m.as_str()));
        }
        assert_eq!(Metric::MaxDrawdownPct.default_direction(), Direction::Minimize);
        assert_eq!(Metric::Sharpe.default_direction(), Direction::Maximize);
        assert!("bogus".parse::<Metric>().is_err());
    }

    #[test]
    fn rank_order_puts_undefined_last() {
        use std::cmp::Ordering;
        let d = Direction::Maximize;
        assert_eq!(d.rank_order(Some(2.0), Some(1.0)), Ordering::Less);
        assert_eq!(d.rank_order(None, Some(1.0)), Ordering::Greater);
        assert_eq!(Direction::Minimize.rank_order(Some(2.0), Some(1.0)), Ordering::Greater);
    }
}
