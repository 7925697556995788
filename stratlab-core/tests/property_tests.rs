//! Property tests for engine and data invariants.
//!
//! 1. Determinism: identical inputs give identical outputs
//! 2. Accounting: realized PnL equals the cash delta, cash never negative
//! 3. Resampling: identity on aligned input, volume preserved, bar bounds hold
//! 4. Fingerprints: independent of parameter insertion order

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use stratlab_core::data::{resample, Timeframe};
use stratlab_core::domain::{Bar, ParamValue, ParameterSet};
use stratlab_core::engine::{simulate, EngineConfig};
use stratlab_core::fingerprint::Fingerprint;
use stratlab_core::strategy::StrategyKind;

// ── Strategies (proptest) ────────────────────────────────────────────

/// A random walk of closes kept well above zero.
fn arb_closes(len: std::ops::Range<usize>) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-2.0..2.0_f64, len).prop_map(|steps| {
        let mut price = 100.0_f64;
        steps
            .into_iter()
            .map(|s| {
                price = (price + s).max(5.0);
                price
            })
            .collect()
    })
}

fn bars_at(closes: &[f64], step: Duration) -> Vec<Bar> {
    let t0 = Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap();
    let mut prev = closes[0];
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = prev;
            prev = close;
            Bar {
                time: t0 + step * i as i32,
                open,
                high: open.max(close) + 0.25,
                low: open.min(close) - 0.25,
                close,
                volume: 100 + i as u64,
                vwap: None,
            }
        })
        .collect()
}

fn arb_kind() -> impl Strategy<Value = StrategyKind> {
    prop::sample::select(StrategyKind::all().to_vec())
}

fn small_params(kind: StrategyKind) -> ParameterSet {
    match kind {
        StrategyKind::MaCrossover => ParameterSet::new().with("fast", 3).with("slow", 10),
        StrategyKind::Bollinger => ParameterSet::new().with("period", 10),
        StrategyKind::Macd => ParameterSet::new()
            .with("fast", 3)
            .with("slow", 10)
            .with("signal", 4),
        StrategyKind::VwapReversion => ParameterSet::new().with("deviation_pct", 0.005),
    }
}

// ── 1 & 2. Engine ────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn simulation_is_deterministic(closes in arb_closes(20..120), kind in arb_kind()) {
        let bars = bars_at(&closes, Duration::days(1));
        let params = small_params(kind);
        let config = EngineConfig::default();

        let mut a = kind.build(&params).unwrap();
        let mut b = kind.build(&params).unwrap();
        let first = simulate(a.as_mut(), "P", &bars, &config).unwrap();
        let second = simulate(b.as_mut(), "P", &bars, &config).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn realized_pnl_matches_cash_delta(
        closes in arb_closes(20..200),
        kind in arb_kind(),
        commission in 0.0..0.01_f64,
        slippage in 0.0..50.0_f64,
    ) {
        let bars = bars_at(&closes, Duration::days(1));
        let config = EngineConfig {
            commission_rate: commission,
            slippage_bps: slippage,
            ..EngineConfig::default()
        };
        let mut strategy = kind.build(&small_params(kind)).unwrap();
        let out = simulate(strategy.as_mut(), "P", &bars, &config).unwrap();

        let realized: f64 = out.trades.iter().map(|t| t.pnl).sum();
        prop_assert!((out.final_cash - out.initial_cash - realized).abs() < 1e-6);
        prop_assert!(out.final_cash >= 0.0);
        prop_assert_eq!(out.equity_curve.len(), bars.len());
        for pair in out.trades.windows(2) {
            prop_assert!(pair[0].exit_time <= pair[1].entry_time);
        }
    }
}

// ── 3. Resampling ────────────────────────────────────────────────────

proptest! {
    #[test]
    fn resample_to_native_is_identity(closes in arb_closes(1..80)) {
        let bars = bars_at(&closes, Duration::days(1));
        prop_assert_eq!(resample(&bars, Timeframe::Days(1)), bars);
    }

    #[test]
    fn resample_preserves_volume_and_bounds(closes in arb_closes(1..300), minutes in 2u32..90) {
        let bars = bars_at(&closes, Duration::minutes(1));
        let out = resample(&bars, Timeframe::Minutes(minutes));

        let total_in: u64 = bars.iter().map(|b| b.volume).sum();
        let total_out: u64 = out.iter().map(|b| b.volume).sum();
        prop_assert_eq!(total_in, total_out);
        prop_assert!(out.len() <= bars.len());
        for pair in out.windows(2) {
            prop_assert!(pair[0].time < pair[1].time);
        }
        for bar in &out {
            prop_assert!(bar.low <= bar.open.min(bar.close));
            prop_assert!(bar.high >= bar.open.max(bar.close));
        }
        prop_assert_eq!(out[0].open, bars[0].open);
        prop_assert_eq!(out[out.len() - 1].close, bars[bars.len() - 1].close);
    }
}

// ── 4. Fingerprints ──────────────────────────────────────────────────

proptest! {
    #[test]
    fn fingerprint_ignores_insertion_order(
        entries in prop::collection::btree_map("[a-z]{1,6}", -1000i64..1000, 1..8),
    ) {
        let forward: ParameterSet = entries
            .iter()
            .map(|(k, v)| (k.clone(), ParamValue::Int(*v)))
            .collect();
        let backward: ParameterSet = entries
            .iter()
            .rev()
            .map(|(k, v)| (k.clone(), ParamValue::Int(*v)))
            .collect();
        prop_assert_eq!(
            Fingerprint::compute("s", "SYM", &forward),
            Fingerprint::compute("s", "SYM", &backward)
        );
    }
}
