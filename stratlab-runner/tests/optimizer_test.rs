//! Optimizer integration: grids, random search, caching, cancellation,
//! multi-symbol batches.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use stratlab_core::data::{BarLoader, DataError, MemoryBarSource, Timeframe};
use stratlab_core::domain::{Bar, ParamValue, ParameterSet};
use stratlab_core::engine::EngineConfig;
use stratlab_core::strategy::StrategyKind;
use stratlab_runner::{
    run_on_bars, CachePersistence, Direction, Metric, OptimizationRequest, OptimizeError,
    Optimizer, OptimizerConfig, ParamDistribution, ParamGrid, RandomSpace, RunStatus,
    SearchSpace,
};

// ── Helpers ──────────────────────────────────────────────────────────

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2021, 1, 4, 0, 0, 0).unwrap()
}

/// Daily bars oscillating around 100 so crossover strategies trade.
fn wave(n: usize, phase: f64) -> Vec<Bar> {
    let mut prev = 100.0;
    (0..n)
        .map(|i| {
            let close = 100.0 + 12.0 * ((i as f64 + phase) * std::f64::consts::TAU / 45.0).sin();
            let open = prev;
            prev = close;
            Bar {
                time: t0() + Duration::days(i as i64),
                open,
                high: open.max(close) + 0.8,
                low: open.min(close) - 0.8,
                close,
                volume: 5_000,
                vwap: None,
            }
        })
        .collect()
}

/// Daily bars around `level`, priced so that small accounts cannot buy a unit.
fn expensive_wave(n: usize, level: f64) -> Vec<Bar> {
    wave(n, 0.0)
        .into_iter()
        .map(|b| Bar {
            open: b.open / 100.0 * level,
            high: b.high / 100.0 * level,
            low: b.low / 100.0 * level,
            close: b.close / 100.0 * level,
            ..b
        })
        .collect()
}

fn crossover_grid(fast: &[i64], slow: &[i64]) -> OptimizationRequest {
    OptimizationRequest {
        strategy: StrategyKind::MaCrossover,
        symbol: "WAVE".into(),
        timeframe: Timeframe::Days(1),
        space: SearchSpace::Grid(
            ParamGrid::new()
                .axis("fast", fast.iter().copied())
                .axis("slow", slow.iter().copied()),
        ),
        base: ParameterSet::new().with("ma_type", "sma"),
    }
}

fn optimizer(config: OptimizerConfig) -> Optimizer {
    Optimizer::new(config, EngineConfig::default()).unwrap()
}

// ── Grid search ─────────────────────────────────────────────────────

#[test]
fn grid_runs_every_point_once() {
    let bars = wave(300, 0.0);
    let opt = optimizer(OptimizerConfig::default());
    let report = opt
        .optimize(&crossover_grid(&[3, 5, 8], &[20, 30]), &bars, None)
        .unwrap();

    assert_eq!(report.summary.total, 6);
    assert_eq!(report.summary.completed, 6);
    assert_eq!(report.summary.cache_hits, 0);
    assert_eq!(report.outcomes.len(), 6);

    let fingerprints: HashSet<_> = report
        .outcomes
        .iter()
        .map(|o| o.fingerprint.clone().unwrap())
        .collect();
    assert_eq!(fingerprints.len(), 6);

    // Enumeration order, last axis fastest.
    let firsts: Vec<_> = report
        .outcomes
        .iter()
        .take(2)
        .map(|o| (o.parameters.get("fast").cloned(), o.parameters.get("slow").cloned()))
        .collect();
    assert_eq!(
        firsts,
        vec![
            (Some(ParamValue::Int(3)), Some(ParamValue::Int(20))),
            (Some(ParamValue::Int(3)), Some(ParamValue::Int(30))),
        ]
    );
    for (i, o) in report.outcomes.iter().enumerate() {
        assert_eq!(o.index, i);
        assert_eq!(o.parameters.get("ma_type"), Some(&ParamValue::from("sma")));
    }
}

#[test]
fn parallel_results_match_sequential_runs() {
    let bars = wave(300, 3.0);
    let opt = optimizer(OptimizerConfig {
        max_workers: Some(3),
        ..OptimizerConfig::default()
    });
    let report = opt
        .optimize(&crossover_grid(&[3, 5, 8], &[20, 30]), &bars, None)
        .unwrap();

    for outcome in &report.outcomes {
        let result = outcome.result.as_ref().unwrap();
        let direct = run_on_bars(
            StrategyKind::MaCrossover,
            &outcome.parameters,
            "WAVE",
            &bars,
            Timeframe::Days(1),
            &EngineConfig::default(),
        )
        .unwrap();
        assert_eq!(result.trades, direct.trades);
        assert_eq!(result.equity_curve, direct.equity_curve);
    }
}

#[test]
fn best_run_follows_metric_direction() {
    let bars = wave(300, 0.0);
    let request = crossover_grid(&[3, 5, 8], &[20, 30]);

    let max = optimizer(OptimizerConfig {
        metric: Metric::TotalReturnPct,
        ..OptimizerConfig::default()
    })
    .optimize(&request, &bars, None)
    .unwrap();
    let best = max.best_result().unwrap().metrics.total_return_pct;
    assert!(max.results().all(|r| r.metrics.total_return_pct <= best));

    let min = optimizer(OptimizerConfig {
        metric: Metric::TotalReturnPct,
        direction: Some(Direction::Minimize),
        ..OptimizerConfig::default()
    })
    .optimize(&request, &bars, None)
    .unwrap();
    let worst = min.best_result().unwrap().metrics.total_return_pct;
    assert!(min.results().all(|r| r.metrics.total_return_pct >= worst));
    assert_eq!(min.direction, Direction::Minimize);
}

#[test]
fn invalid_points_are_rejected_not_run() {
    let bars = wave(200, 0.0);
    let report = optimizer(OptimizerConfig::default())
        .optimize(&crossover_grid(&[10, 20], &[20, 30]), &bars, None)
        .unwrap();

    assert_eq!(report.summary.total, 4);
    assert_eq!(report.summary.rejected, 1);
    assert_eq!(report.summary.completed, 3);
    let rejected = &report.outcomes[2];
    assert!(matches!(rejected.status, RunStatus::Rejected(_)));
    assert!(rejected.fingerprint.is_none());
    assert!(rejected.result.is_none());
}

#[test]
fn heatmap_covers_both_axes() {
    let bars = wave(200, 0.0);
    let report = optimizer(OptimizerConfig::default())
        .optimize(&crossover_grid(&[10, 20, 25], &[20, 30]), &bars, None)
        .unwrap();
    let heatmap = report.heatmap.unwrap();

    assert_eq!(heatmap.x_name, "fast");
    assert_eq!(heatmap.y_name, "slow");
    assert_eq!(heatmap.cells.len(), 3);
    assert!(heatmap.cells.iter().all(|row| row.len() == 2));
    // fast >= slow was rejected.
    assert_eq!(heatmap.cells[1][0], None);
    assert_eq!(heatmap.cells[2][0], None);
}

// ── Cache ───────────────────────────────────────────────────────────

#[test]
fn second_pass_is_served_from_cache() {
    let bars = wave(250, 0.0);
    let request = crossover_grid(&[3, 5], &[20, 30]);
    let opt = optimizer(OptimizerConfig::default());

    let first = opt.optimize(&request, &bars, None).unwrap();
    let second = opt.optimize(&request, &bars, None).unwrap();

    assert_eq!(first.summary.cache_hits, 0);
    assert_eq!(second.summary.cache_hits, 4);
    assert_eq!(opt.cache().len(), 4);
    for (a, b) in first.outcomes.iter().zip(&second.outcomes) {
        assert!(Arc::ptr_eq(a.result.as_ref().unwrap(), b.result.as_ref().unwrap()));
    }
}

#[test]
fn cache_is_scoped_to_the_dataset() {
    let request = crossover_grid(&[3, 5], &[20]);
    let opt = optimizer(OptimizerConfig::default());

    opt.optimize(&request, &wave(250, 0.0), None).unwrap();
    let other = opt.optimize(&request, &wave(250, 7.0), None).unwrap();

    assert_eq!(other.summary.cache_hits, 0);
    assert_eq!(opt.cache().len(), 4);
}

#[test]
fn directory_cache_survives_a_new_optimizer() {
    let dir = tempfile::tempdir().unwrap();
    let config = OptimizerConfig {
        cache: CachePersistence::Directory(dir.path().to_path_buf()),
        ..OptimizerConfig::default()
    };
    let bars = wave(250, 0.0);
    let request = crossover_grid(&[3, 5], &[20, 30]);

    let first = optimizer(config.clone()).optimize(&request, &bars, None).unwrap();
    let second = optimizer(config).optimize(&request, &bars, None).unwrap();

    assert_eq!(second.summary.cache_hits, 4);
    for (a, b) in first.outcomes.iter().zip(&second.outcomes) {
        let (a, b) = (a.result.as_ref().unwrap(), b.result.as_ref().unwrap());
        assert_eq!(a.fingerprint, b.fingerprint);
        assert_eq!(a.trades.len(), b.trades.len());
    }
}

// ── Cancellation ────────────────────────────────────────────────────

#[test]
fn cancelled_before_start_runs_nothing() {
    let bars = wave(200, 0.0);
    let cancel = AtomicBool::new(true);
    let err = optimizer(OptimizerConfig::default())
        .optimize(&crossover_grid(&[3, 5], &[20, 30]), &bars, Some(&cancel))
        .unwrap_err();

    match err {
        OptimizeError::NoSuccessfulRuns { summary } => {
            assert_eq!(summary.total, 4);
            assert_eq!(summary.cancelled, 4);
            assert_eq!(summary.completed, 0);
        }
        other => panic!("expected NoSuccessfulRuns, got {other:?}"),
    }
}

#[test]
fn cancellation_is_checked_before_the_cache() {
    let bars = wave(200, 0.0);
    let opt = optimizer(OptimizerConfig::default());
    let request = crossover_grid(&[3, 5], &[20, 30]);
    opt.optimize(&request, &bars, None).unwrap();

    // Cancellation is checked before the cache, so nothing completes.
    let cancel = AtomicBool::new(true);
    assert!(matches!(
        opt.optimize(&request, &bars, Some(&cancel)),
        Err(OptimizeError::NoSuccessfulRuns { .. })
    ));
}

#[test]
fn cancellation_mid_batch_keeps_completed_runs() {
    let bars = wave(3_000, 0.0);
    let fast: Vec<i64> = (2..=4).collect();
    let slow: Vec<i64> = (20..60).collect();
    let request = crossover_grid(&fast, &slow);
    let opt = optimizer(OptimizerConfig {
        max_workers: Some(1),
        ..OptimizerConfig::default()
    });
    let cancel = AtomicBool::new(false);
    let done = AtomicBool::new(false);
    let cache = Arc::clone(opt.cache());

    let report = std::thread::scope(|scope| {
        scope.spawn(|| {
            // Raise the flag as soon as the first run lands in the cache.
            while !done.load(Ordering::Relaxed) {
                if !cache.is_empty() {
                    cancel.store(true, Ordering::Relaxed);
                    break;
                }
                std::hint::spin_loop();
            }
        });
        let report = opt.optimize(&request, &bars, Some(&cancel));
        done.store(true, Ordering::Relaxed);
        report
    })
    .unwrap();

    let s = report.summary;
    assert_eq!(s.total, 120);
    assert!(s.completed >= 1);
    assert!(s.cancelled >= 1);
    assert_eq!(s.completed + s.cancelled, s.total);
    for outcome in &report.outcomes {
        match outcome.status {
            RunStatus::Completed { .. } => assert!(outcome.result.is_some()),
            RunStatus::Cancelled => assert!(outcome.result.is_none()),
            ref other => panic!("unexpected status {other:?}"),
        }
    }
    assert!(report.best().is_some_and(|b| b.result.is_some()));
}

// ── Failures ────────────────────────────────────────────────────────

#[test]
fn failed_runs_do_not_abort_the_batch() {
    // One unit costs ~5000; the account holds 1000.
    let bars = expensive_wave(90, 5_000.0);
    let engine = EngineConfig {
        initial_cash: 1_000.0,
        ..EngineConfig::default()
    };
    let opt = Optimizer::new(OptimizerConfig::default(), engine).unwrap();

    // slow = 100 never warms up on 90 bars, so that run never trades.
    let report = opt
        .optimize(&crossover_grid(&[3], &[8, 100]), &bars, None)
        .unwrap();

    assert_eq!(report.summary.total, 2);
    assert_eq!(report.summary.failed, 1);
    assert_eq!(report.summary.completed, 1);
    match &report.outcomes[0].status {
        RunStatus::Failed(reason) => assert!(reason.contains("insufficient cash"), "{reason}"),
        other => panic!("expected Failed, got {other:?}"),
    }
    assert!(report.outcomes[0].result.is_none());
    assert_eq!(report.outcomes[1].status, RunStatus::Completed { cached: false });
    assert_eq!(report.best_index, Some(1));
    // Failures are not cached.
    assert_eq!(opt.cache().len(), 1);
}

#[test]
fn all_runs_failing_is_an_error() {
    let bars = expensive_wave(90, 5_000.0);
    let engine = EngineConfig {
        initial_cash: 1_000.0,
        ..EngineConfig::default()
    };
    let err = Optimizer::new(OptimizerConfig::default(), engine)
        .unwrap()
        .optimize(&crossover_grid(&[3, 4], &[8, 10]), &bars, None)
        .unwrap_err();

    match err {
        OptimizeError::NoSuccessfulRuns { summary } => {
            assert_eq!(summary.total, 4);
            assert_eq!(summary.failed, 4);
            assert_eq!(summary.completed, 0);
        }
        other => panic!("expected NoSuccessfulRuns, got {other:?}"),
    }
}

// ── Random search ───────────────────────────────────────────────────

#[test]
fn random_search_is_reproducible() {
    let bars = wave(250, 0.0);
    let space = RandomSpace::new(12, 99)
        .param("fast", ParamDistribution::IntRange { min: 2, max: 10 })
        .param("slow", ParamDistribution::IntRange { min: 15, max: 40 });
    let request = OptimizationRequest {
        strategy: StrategyKind::MaCrossover,
        symbol: "WAVE".into(),
        timeframe: Timeframe::Days(1),
        space: SearchSpace::Random(space),
        base: ParameterSet::new(),
    };

    let a = optimizer(OptimizerConfig::default())
        .optimize(&request, &bars, None)
        .unwrap();
    let b = optimizer(OptimizerConfig::default())
        .optimize(&request, &bars, None)
        .unwrap();

    assert_eq!(a.summary.total, 12);
    assert!(a.heatmap.is_none());
    let params = |r: &stratlab_runner::OptimizationReport| {
        r.outcomes.iter().map(|o| o.parameters.clone()).collect::<Vec<_>>()
    };
    assert_eq!(params(&a), params(&b));
    assert_eq!(a.best_index, b.best_index);
}

#[test]
fn empty_space_is_an_error() {
    let request = OptimizationRequest {
        space: SearchSpace::Grid(ParamGrid::new().axis("fast", Vec::<i64>::new())),
        ..crossover_grid(&[3], &[20])
    };
    let err = optimizer(OptimizerConfig::default())
        .optimize(&request, &wave(100, 0.0), None)
        .unwrap_err();
    assert!(matches!(err, OptimizeError::EmptySearchSpace));
}

// ── Multi-symbol ────────────────────────────────────────────────────

#[test]
fn optimize_symbols_reports_per_symbol_failures() {
    let source = MemoryBarSource::new()
        .with_series("AAA", wave(250, 0.0))
        .with_series("BBB", wave(250, 11.0));
    let loader = BarLoader::new(Arc::new(source), Timeframe::Days(1));
    let symbols: Vec<String> = ["AAA", "BBB", "ZZZ"].iter().map(|s| s.to_string()).collect();

    let multi = optimizer(OptimizerConfig::default()).optimize_symbols(
        &loader,
        &symbols,
        t0(),
        t0() + Duration::days(400),
        &crossover_grid(&[3, 5], &[20]),
        None,
    );

    assert_eq!(multi.reports.len(), 2);
    assert_eq!(multi.reports["AAA"].symbol, "AAA");
    assert_eq!(multi.reports["BBB"].summary.completed, 2);
    assert_eq!(multi.failures.len(), 1);
    let (symbol, err) = &multi.failures[0];
    assert_eq!(symbol, "ZZZ");
    assert!(matches!(
        err,
        OptimizeError::Data(DataError::DataUnavailable { .. })
    ));
}
