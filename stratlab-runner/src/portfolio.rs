//! Portfolio aggregation: independent per-symbol runs combined into one
//! equity curve.
//!
//! Curves are aligned on the union of all timestamps. A symbol with no bar at
//! a timestamp contributes its last known equity; before its first bar it
//! contributes its allocated starting cash.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use stratlab_core::data::Timeframe;
use stratlab_core::domain::{Bar, EquityPoint, ParameterSet, Trade};
use stratlab_core::engine::EngineConfig;
use stratlab_core::strategy::StrategyKind;

use crate::metrics::PerformanceMetrics;
use crate::runner::{run_on_bars, RunError, SimulationResult};

#[derive(Debug, Error)]
pub enum PortfolioError {
    #[error("portfolio has no symbols")]
    NoSymbols,
    #[error("invalid allocation: {0}")]
    InvalidAllocation(String),
    #[error("{symbol}: {source}")]
    Symbol {
        symbol: String,
        #[source]
        source: RunError,
    },
}

/// How starting cash is split across symbols.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "weights", rename_all = "snake_case")]
pub enum Allocation {
    #[default]
    Equal,
    /// Relative weights, normalized to sum to 1. Every symbol needs one.
    Weights(BTreeMap<String, f64>),
}

impl Allocation {
    /// Fraction of total cash per symbol; sums to 1.
    pub fn shares(&self, symbols: &[String]) -> Result<BTreeMap<String, f64>, PortfolioError> {
        if symbols.is_empty() {
            return Err(PortfolioError::NoSymbols);
        }
        match self {
            Allocation::Equal => {
                let share = 1.0 / symbols.len() as f64;
                Ok(symbols.iter().map(|s| (s.clone(), share)).collect())
            }
            Allocation::Weights(weights) => {
                let mut raw = BTreeMap::new();
                for symbol in symbols {
                    let w = *weights.get(symbol).ok_or_else(|| {
                        PortfolioError::InvalidAllocation(format!("no weight for {symbol}"))
                    })?;
                    if !(w.is_finite() && w > 0.0) {
                        return Err(PortfolioError::InvalidAllocation(format!(
                            "weight for {symbol} must be positive, got {w}"
                        )));
                    }
                    raw.insert(symbol.clone(), w);
                }
                if let Some(extra) = weights.keys().find(|k| !raw.contains_key(*k)) {
                    return Err(PortfolioError::InvalidAllocation(format!(
                        "weight for unknown symbol {extra}"
                    )));
                }
                let total: f64 = raw.values().sum();
                Ok(raw.into_iter().map(|(s, w)| (s, w / total)).collect())
            }
        }
    }
}

/// A trade tagged with the symbol it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioTrade {
    pub symbol: String,
    pub trade: Trade,
}

#[derive(Debug, Clone)]
pub struct PortfolioResult {
    /// Per-symbol results, in symbol order.
    pub results: BTreeMap<String, SimulationResult>,
    pub allocations: BTreeMap<String, f64>,
    pub initial_cash: f64,
    /// Sum of the aligned per-symbol curves.
    pub equity_curve: Vec<EquityPoint>,
    pub metrics: PerformanceMetrics,
    /// All trades ordered by exit time.
    pub trades: Vec<PortfolioTrade>,
}

/// Union timeline of several curves with forward-carried values.
///
/// Returns the sorted union of timestamps and, per curve, its value at each
/// of them: the latest point at or before it, or `None` before the curve
/// starts.
pub fn align_on_union(curves: &[&[EquityPoint]]) -> (Vec<DateTime<Utc>>, Vec<Vec<Option<f64>>>) {
    let times: Vec<DateTime<Utc>> = curves
        .iter()
        .flat_map(|c| c.iter().map(|p| p.time))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let columns = curves
        .iter()
        .map(|curve| {
            let mut next = 0;
            let mut last = None;
            times
                .iter()
                .map(|t| {
                    while next < curve.len() && curve[next].time <= *t {
                        last = Some(curve[next].equity);
                        next += 1;
                    }
                    last
                })
                .collect()
        })
        .collect();
    (times, columns)
}

/// Run `strategy` on each symbol with its cash share and aggregate.
///
/// Symbols run in parallel; if any fail, the first failing symbol in symbol
/// order is reported.
pub fn run_portfolio(
    strategy: StrategyKind,
    params: &ParameterSet,
    series: &BTreeMap<String, Vec<Bar>>,
    timeframe: Timeframe,
    engine: &EngineConfig,
    allocation: &Allocation,
) -> Result<PortfolioResult, PortfolioError> {
    let symbols: Vec<String> = series.keys().cloned().collect();
    let allocations = allocation.shares(&symbols)?;

    let runs: Vec<(String, Result<SimulationResult, RunError>)> = series
        .par_iter()
        .map(|(symbol, bars)| {
            let share = allocations.get(symbol).copied().unwrap_or(0.0);
            let config = EngineConfig {
                initial_cash: engine.initial_cash * share,
                ..engine.clone()
            };
            let result = run_on_bars(strategy, params, symbol, bars, timeframe, &config);
            (symbol.clone(), result)
        })
        .collect();

    let mut results = BTreeMap::new();
    for (symbol, result) in runs {
        match result {
            Ok(r) => {
                results.insert(symbol, r);
            }
            Err(source) => return Err(PortfolioError::Symbol { symbol, source }),
        }
    }

    let curves: Vec<&[EquityPoint]> = results.values().map(|r| r.equity_curve.as_slice()).collect();
    let starts: Vec<f64> = results.values().map(|r| r.initial_cash).collect();
    let (times, columns) = align_on_union(&curves);
    let equity_curve: Vec<EquityPoint> = times
        .iter()
        .enumerate()
        .map(|(i, &t)| {
            let total = columns
                .iter()
                .zip(&starts)
                .map(|(col, start)| col[i].unwrap_or(*start))
                .sum();
            EquityPoint::new(t, total)
        })
        .collect();

    let mut trades: Vec<PortfolioTrade> = results
        .iter()
        .flat_map(|(symbol, r)| {
            r.trades.iter().map(move |t| PortfolioTrade {
                symbol: symbol.clone(),
                trade: t.clone(),
            })
        })
        .collect();
    trades.sort_by_key(|t| t.trade.exit_time);

    let initial_cash: f64 = starts.iter().sum();
    let flat: Vec<Trade> = trades.iter().map(|t| t.trade.clone()).collect();
    let metrics = PerformanceMetrics::compute(
        initial_cash,
        &equity_curve,
        &flat,
        timeframe.periods_per_year(),
    );

    info!(
        strategy = strategy.id(),
        symbols = results.len(),
        trades = trades.len(),
        total_return_pct = metrics.total_return_pct,
        "portfolio complete"
    );

    Ok(PortfolioResult {
        results,
        allocations,
        initial_cash,
        equity_curve,
        metrics,
        trades,
    })
}
