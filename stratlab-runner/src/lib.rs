//! Stratlab Runner: single runs, metrics, optimization, results and portfolios.
//!
//! Built on `stratlab-core`, this crate provides:
//! - A run pipeline that loads bars, simulates, and scores the result
//! - Performance metrics and metric selection for ranking
//! - Grid and seeded random parameter search with a fingerprint-keyed cache
//! - An append-only JSONL results store and a run comparator
//! - Multi-symbol portfolio aggregation
//! - TOML configuration and tracing setup

pub mod compare;
pub mod config;
pub mod metrics;
pub mod optimizer;
pub mod portfolio;
pub mod runner;
pub mod store;
pub mod telemetry;

pub use compare::{AlignedCurves, Comparator, ComparisonRow, ComparisonTable, RankedRun};
pub use config::{ConfigError, DataConfig, SourceConfig, StoreConfig, StratlabConfig};
pub use metrics::{Direction, Metric, PerformanceMetrics, UnknownMetric};
pub use optimizer::{
    CachePersistence, Heatmap, MultiSymbolReport, OptimizationReport, OptimizationRequest,
    OptimizationSummary, OptimizeError, Optimizer, OptimizerConfig, ParamDistribution, ParamGrid,
    RandomSpace, RunCache, RunOutcome, RunStatus, SearchSpace,
};
pub use portfolio::{
    align_on_union, run_portfolio, Allocation, PortfolioError, PortfolioResult, PortfolioTrade,
};
pub use runner::{run_on_bars, run_single, RunError, SimulationResult};
pub use store::{
    JsonlResultStore, MemoryResultStore, ResultStore, RunRecord, StoreError, SCHEMA_VERSION,
};
pub use telemetry::init_tracing;
