//! Single-run pipeline: strategy registry → engine → metrics.
//!
//! Two entry points:
//! - `run_on_bars()`: takes a pre-loaded series. Used by the optimizer and
//!   the portfolio aggregator.
//! - `run_single()`: loads the series through a `BarLoader` first. Errors
//!   propagate directly; nothing is caught here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use stratlab_core::data::{BarLoader, DataError, Timeframe};
use stratlab_core::domain::{Bar, EquityPoint, ParameterSet, Trade};
use stratlab_core::engine::{simulate, EngineConfig, SimulationError};
use stratlab_core::fingerprint::Fingerprint;
use stratlab_core::strategy::{StrategyError, StrategyKind};

use crate::metrics::PerformanceMetrics;

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Strategy(#[from] StrategyError),
    #[error(transparent)]
    Simulation(#[from] SimulationError),
    #[error(transparent)]
    Data(#[from] DataError),
}

/// Complete, immutable output of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub strategy_id: String,
    pub symbol: String,
    pub parameters: ParameterSet,
    pub fingerprint: Fingerprint,
    pub timeframe: Timeframe,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub initial_cash: f64,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub metrics: PerformanceMetrics,
}

/// Run one strategy over an already loaded series.
pub fn run_on_bars(
    strategy: StrategyKind,
    params: &ParameterSet,
    symbol: &str,
    bars: &[Bar],
    timeframe: Timeframe,
    engine: &EngineConfig,
) -> Result<SimulationResult, RunError> {
    let fingerprint = Fingerprint::compute(strategy.id(), symbol, params);
    run_with_fingerprint(strategy, params, symbol, bars, timeframe, engine, fingerprint)
}

/// As [`run_on_bars`], with a caller-supplied (typically scoped) fingerprint.
pub(crate) fn run_with_fingerprint(
    strategy: StrategyKind,
    params: &ParameterSet,
    symbol: &str,
    bars: &[Bar],
    timeframe: Timeframe,
    engine: &EngineConfig,
    fingerprint: Fingerprint,
) -> Result<SimulationResult, RunError> {
    let mut instance = strategy.build(params)?;
    let output = simulate(instance.as_mut(), symbol, bars, engine)?;
    let metrics = PerformanceMetrics::compute(
        output.initial_cash,
        &output.equity_curve,
        &output.trades,
        timeframe.periods_per_year(),
    );
    debug!(
        strategy = strategy.id(),
        symbol,
        fingerprint = fingerprint.short(),
        trades = output.trades.len(),
        sharpe = metrics.sharpe,
        "run complete"
    );

    // simulate() rejects empty series, so both ends exist.
    let (start, end) = match (bars.first(), bars.last()) {
        (Some(first), Some(last)) => (first.time, last.time),
        _ => return Err(SimulationError::EmptySeries.into()),
    };

    Ok(SimulationResult {
        strategy_id: strategy.id().to_string(),
        symbol: symbol.to_string(),
        parameters: params.clone(),
        fingerprint,
        timeframe,
        start,
        end,
        initial_cash: output.initial_cash,
        trades: output.trades,
        equity_curve: output.equity_curve,
        metrics,
    })
}

/// Load `symbol` in `[start, end]` at `timeframe`, then run.
#[allow(clippy::too_many_arguments)]
pub fn run_single(
    loader: &BarLoader,
    strategy: StrategyKind,
    params: &ParameterSet,
    symbol: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    timeframe: Timeframe,
    engine: &EngineConfig,
) -> Result<SimulationResult, RunError> {
    // Validate before touching storage.
    strategy.validate(params)?;
    let loaded = loader.load(symbol, start, end, timeframe)?;
    run_on_bars(strategy, params, symbol, &loaded.bars, timeframe, engine)
}
