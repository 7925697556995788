//! Parameter optimization: grid and random search over one strategy and symbol.
//!
//! Every candidate point is validated by the strategy first (rejections are
//! counted, not run), fingerprinted, looked up in the run cache, and otherwise
//! simulated. Runs share nothing but the read-only bars and the cache, so they
//! fan out over rayon. Per-run failures are recorded and the batch continues;
//! only a batch with no successful run is an error.

pub mod cache;
pub mod space;

pub use cache::{CacheError, CachePersistence, RunCache};
pub use space::{ParamDistribution, ParamGrid, RandomSpace, SearchSpace};

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use stratlab_core::data::{BarLoader, DataError, Timeframe};
use stratlab_core::domain::{Bar, ParamValue, ParameterSet};
use stratlab_core::engine::EngineConfig;
use stratlab_core::fingerprint::{DatasetHash, Fingerprint};
use stratlab_core::strategy::StrategyKind;

use crate::metrics::{Direction, Metric};
use crate::runner::{run_with_fingerprint, SimulationResult};

#[derive(Debug, Error)]
pub enum OptimizeError {
    #[error("search space is empty")]
    EmptySearchSpace,
    #[error("invalid search space: {0}")]
    InvalidSpace(String),
    #[error("no parameter set succeeded ({summary})")]
    NoSuccessfulRuns { summary: OptimizationSummary },
    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Data(#[from] DataError),
}

/// Optimizer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Statistic the best run is chosen by.
    pub metric: Metric,
    /// `None` uses the metric's natural direction.
    pub direction: Option<Direction>,
    /// Worker threads; `None` uses the global rayon pool.
    pub max_workers: Option<usize>,
    pub cache: CachePersistence,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            metric: Metric::Sharpe,
            direction: None,
            max_workers: None,
            cache: CachePersistence::Memory,
        }
    }
}

impl OptimizerConfig {
    pub fn direction(&self) -> Direction {
        self.direction
            .unwrap_or_else(|| self.metric.default_direction())
    }
}

/// One optimization: which strategy, which symbol, which space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationRequest {
    pub strategy: StrategyKind,
    pub symbol: String,
    pub timeframe: Timeframe,
    pub space: SearchSpace,
    /// Fixed parameters under every point; point values win on conflict.
    #[serde(default)]
    pub base: ParameterSet,
}

// ─── Outcomes ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum RunStatus {
    Completed { cached: bool },
    /// Failed strategy validation; never simulated.
    Rejected(String),
    Failed(String),
    /// Not started because cancellation was requested.
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Position in the enumeration sequence.
    pub index: usize,
    pub parameters: ParameterSet,
    /// `None` for rejected points.
    pub fingerprint: Option<Fingerprint>,
    pub status: RunStatus,
    pub result: Option<Arc<SimulationResult>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizationSummary {
    pub total: usize,
    pub completed: usize,
    pub cache_hits: usize,
    pub rejected: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl OptimizationSummary {
    fn of(outcomes: &[RunOutcome]) -> Self {
        let mut s = Self {
            total: outcomes.len(),
            ..Self::default()
        };
        for o in outcomes {
            match o.status {
                RunStatus::Completed { cached } => {
                    s.completed += 1;
                    if cached {
                        s.cache_hits += 1;
                    }
                }
                RunStatus::Rejected(_) => s.rejected += 1,
                RunStatus::Failed(_) => s.failed += 1,
                RunStatus::Cancelled => s.cancelled += 1,
            }
        }
        s
    }
}

impl std::fmt::Display for OptimizationSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} total: {} completed ({} cached), {} rejected, {} failed, {} cancelled",
            self.total, self.completed, self.cache_hits, self.rejected, self.failed, self.cancelled
        )
    }
}

/// Metric values over a two-axis grid. `cells[i][j]` belongs to
/// `x_values[i]`, `y_values[j]`; `None` where the run did not complete or the
/// metric is undefined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heatmap {
    pub metric: Metric,
    pub x_name: String,
    pub y_name: String,
    pub x_values: Vec<ParamValue>,
    pub y_values: Vec<ParamValue>,
    pub cells: Vec<Vec<Option<f64>>>,
}

#[derive(Debug, Clone)]
pub struct OptimizationReport {
    pub strategy_id: String,
    pub symbol: String,
    pub metric: Metric,
    pub direction: Direction,
    /// In enumeration order regardless of completion order.
    pub outcomes: Vec<RunOutcome>,
    pub summary: OptimizationSummary,
    /// Index into `outcomes` of the winning run.
    pub best_index: Option<usize>,
    pub heatmap: Option<Heatmap>,
}

impl OptimizationReport {
    pub fn best(&self) -> Option<&RunOutcome> {
        self.best_index.map(|i| &self.outcomes[i])
    }

    pub fn best_result(&self) -> Option<&SimulationResult> {
        self.best().and_then(|o| o.result.as_deref())
    }

    /// Completed results in enumeration order.
    pub fn results(&self) -> impl Iterator<Item = &SimulationResult> {
        self.outcomes.iter().filter_map(|o| o.result.as_deref())
    }
}

/// Per-symbol reports from [`Optimizer::optimize_symbols`].
#[derive(Debug, Default)]
pub struct MultiSymbolReport {
    pub reports: BTreeMap<String, OptimizationReport>,
    pub failures: Vec<(String, OptimizeError)>,
}

// ─── Optimizer ──────────────────────────────────────────────────────

pub struct Optimizer {
    config: OptimizerConfig,
    engine: EngineConfig,
    cache: Arc<RunCache>,
    pool: Option<rayon::ThreadPool>,
}

impl Optimizer {
    pub fn new(config: OptimizerConfig, engine: EngineConfig) -> Result<Self, OptimizeError> {
        let cache = Arc::new(RunCache::from_persistence(&config.cache)?);
        let pool = match config.max_workers {
            Some(n) => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .build()
                    .map_err(|e| OptimizeError::ThreadPool(e.to_string()))?,
            ),
            None => None,
        };
        Ok(Self {
            config,
            engine,
            cache,
            pool,
        })
    }

    /// Share a cache across optimizers (or sessions).
    pub fn with_cache(mut self, cache: Arc<RunCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn cache(&self) -> &Arc<RunCache> {
        &self.cache
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Run every point of `request.space` over `bars`.
    ///
    /// `cancel` is checked before each run starts; runs already in flight
    /// finish, later ones are marked `Cancelled`, and completed results are
    /// kept in the report.
    pub fn optimize(
        &self,
        request: &OptimizationRequest,
        bars: &[Bar],
        cancel: Option<&AtomicBool>,
    ) -> Result<OptimizationReport, OptimizeError> {
        let points = request.space.points()?;
        let strategy = request.strategy;
        let scope = self.scope(bars);
        info!(
            strategy = strategy.id(),
            symbol = request.symbol.as_str(),
            points = points.len(),
            metric = %self.config.metric,
            "optimization started"
        );

        // Strategy validation is cheap and sequential; only accepted points
        // are fingerprinted and scheduled.
        let candidates: Vec<(usize, ParameterSet, Result<Fingerprint, String>)> = points
            .into_iter()
            .enumerate()
            .map(|(index, point)| {
                let params = request.base.merged(&point);
                let checked = strategy
                    .validate(&params)
                    .map(|()| {
                        Fingerprint::compute_scoped(strategy.id(), &request.symbol, &params, &scope)
                    })
                    .map_err(|e| e.to_string());
                (index, params, checked)
            })
            .collect();

        let execute = || -> Vec<RunOutcome> {
            candidates
                .par_iter()
                .map(|(index, params, checked)| match checked {
                    Ok(fingerprint) => {
                        self.run_point(*index, params, fingerprint, request, bars, cancel)
                    }
                    Err(reason) => RunOutcome {
                        index: *index,
                        parameters: params.clone(),
                        fingerprint: None,
                        status: RunStatus::Rejected(reason.clone()),
                        result: None,
                    },
                })
                .collect()
        };
        let outcomes = match &self.pool {
            Some(pool) => pool.install(execute),
            None => execute(),
        };

        let summary = OptimizationSummary::of(&outcomes);
        info!(
            strategy = strategy.id(),
            symbol = request.symbol.as_str(),
            %summary,
            "optimization finished"
        );
        if summary.completed == 0 {
            return Err(OptimizeError::NoSuccessfulRuns { summary });
        }

        let metric = self.config.metric;
        let direction = self.config.direction();
        let best_index = select_best(&outcomes, metric, direction);
        let heatmap = request
            .space
            .grid_2d()
            .map(|(x, y)| build_heatmap(metric, x, y, &outcomes));

        Ok(OptimizationReport {
            strategy_id: strategy.id().to_string(),
            symbol: request.symbol.clone(),
            metric,
            direction,
            outcomes,
            summary,
            best_index,
            heatmap,
        })
    }

    /// Load each symbol and optimize it with `template` (its `symbol` is
    /// replaced). Load or optimization failures are collected per symbol.
    pub fn optimize_symbols(
        &self,
        loader: &BarLoader,
        symbols: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        template: &OptimizationRequest,
        cancel: Option<&AtomicBool>,
    ) -> MultiSymbolReport {
        let mut out = MultiSymbolReport::default();
        for symbol in symbols {
            if cancel.is_some_and(|f| f.load(Ordering::Relaxed)) {
                break;
            }
            let request = OptimizationRequest {
                symbol: symbol.clone(),
                ..template.clone()
            };
            let outcome = loader
                .load(symbol, start, end, template.timeframe)
                .map_err(OptimizeError::from)
                .and_then(|loaded| self.optimize(&request, &loaded.bars, cancel));
            match outcome {
                Ok(report) => {
                    out.reports.insert(symbol.clone(), report);
                }
                Err(e) => {
                    warn!(symbol = symbol.as_str(), error = %e, "symbol optimization failed");
                    out.failures.push((symbol.clone(), e));
                }
            }
        }
        out
    }

    fn run_point(
        &self,
        index: usize,
        params: &ParameterSet,
        fingerprint: &Fingerprint,
        request: &OptimizationRequest,
        bars: &[Bar],
        cancel: Option<&AtomicBool>,
    ) -> RunOutcome {
        let outcome = |status, result| RunOutcome {
            index,
            parameters: params.clone(),
            fingerprint: Some(fingerprint.clone()),
            status,
            result,
        };

        if cancel.is_some_and(|f| f.load(Ordering::Relaxed)) {
            return outcome(RunStatus::Cancelled, None);
        }
        if let Some(hit) = self.cache.get(fingerprint) {
            return outcome(RunStatus::Completed { cached: true }, Some(hit));
        }

        match run_with_fingerprint(
            request.strategy,
            params,
            &request.symbol,
            bars,
            request.timeframe,
            &self.engine,
            fingerprint.clone(),
        ) {
            Ok(result) => {
                let result = Arc::new(result);
                self.cache.put(Arc::clone(&result));
                outcome(RunStatus::Completed { cached: false }, Some(result))
            }
            Err(e) => {
                warn!(index, params = %params, error = %e, "run failed");
                outcome(RunStatus::Failed(e.to_string()), None)
            }
        }
    }

    /// Cache scope: the dataset and engine settings a result depends on
    /// besides strategy, symbol and parameters.
    fn scope(&self, bars: &[Bar]) -> String {
        let engine = serde_json::to_string(&self.engine).unwrap_or_default();
        format!(
            "{}:{}",
            DatasetHash::of_bars(bars),
            blake3::hash(engine.as_bytes()).to_hex()
        )
    }
}

/// First completed run with the best defined metric value (ties keep the
/// earlier enumeration index).
fn select_best(outcomes: &[RunOutcome], metric: Metric, direction: Direction) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, o) in outcomes.iter().enumerate() {
        let Some(value) = o.result.as_ref().and_then(|r| metric.value(&r.metrics)) else {
            continue;
        };
        match best {
            Some((_, current)) if !direction.is_better(value, current) => {}
            _ => best = Some((i, value)),
        }
    }
    best.map(|(i, _)| i)
}

fn build_heatmap(
    metric: Metric,
    (x_name, x_values): &(String, Vec<ParamValue>),
    (y_name, y_values): &(String, Vec<ParamValue>),
    outcomes: &[RunOutcome],
) -> Heatmap {
    // Enumeration order is row-major with the last (y) axis fastest.
    let cells = (0..x_values.len())
        .map(|i| {
            (0..y_values.len())
                .map(|j| {
                    outcomes
                        .get(i * y_values.len() + j)
                        .and_then(|o| o.result.as_ref())
                        .and_then(|r| metric.value(&r.metrics))
                })
                .collect()
        })
        .collect();
    Heatmap {
        metric,
        x_name: x_name.clone(),
        y_name: y_name.clone(),
        x_values: x_values.clone(),
        y_values: y_values.clone(),
        cells,
    }
}
