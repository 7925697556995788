//! Data access through the loader: CSV and SQLite sources, quality findings,
//! resampling, and a full load-then-simulate pass.

use chrono::{Duration, TimeZone, Utc};
use std::io::Write;
use std::sync::Arc;
use stratlab_core::data::{
    BarLoader, BarSource, CsvBarSource, DataError, QualityIssue, QualityPolicy, Timeframe,
};
use stratlab_core::domain::{Bar, ParameterSet};
use stratlab_core::engine::{simulate, EngineConfig};
use stratlab_core::strategy::StrategyKind;

fn hourly_bars(n: usize) -> Vec<Bar> {
    let t0 = Utc.with_ymd_and_hms(2024, 5, 6, 0, 0, 0).unwrap();
    (0..n)
        .map(|i| {
            let close = 50.0 + (i as f64 * 0.3).cos() * 4.0;
            Bar {
                time: t0 + Duration::hours(i as i64),
                open: close - 0.1,
                high: close + 0.4,
                low: close - 0.4,
                close,
                volume: 500,
                vwap: Some(close),
            }
        })
        .collect()
}

fn write_csv(dir: &std::path::Path, symbol: &str, bars: &[Bar]) {
    let mut writer = csv::Writer::from_path(dir.join(format!("{symbol}.csv"))).unwrap();
    for bar in bars {
        writer.serialize(bar).unwrap();
    }
    writer.flush().unwrap();
}

fn window() -> (chrono::DateTime<Utc>, chrono::DateTime<Utc>) {
    (
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2024, 12, 31, 0, 0, 0).unwrap(),
    )
}

#[test]
fn csv_source_loads_and_resamples_to_daily() {
    let dir = tempfile::tempdir().unwrap();
    let bars = hourly_bars(72);
    write_csv(dir.path(), "ABC", &bars);

    let loader = BarLoader::new(
        Arc::new(CsvBarSource::new(dir.path())),
        Timeframe::Hours(1),
    );
    let (start, end) = window();

    let native = loader.load("ABC", start, end, Timeframe::Hours(1)).unwrap();
    assert_eq!(native.bars, bars);
    assert!(native.quality.is_clean());

    let daily = loader.load("ABC", start, end, Timeframe::Days(1)).unwrap();
    assert_eq!(daily.bars.len(), 3);
    assert_eq!(daily.bars[0].volume, 24 * 500);
    assert_eq!(daily.bars[0].open, bars[0].open);
    assert_eq!(daily.bars[2].close, bars[71].close);
}

#[test]
fn csv_source_lists_symbols() {
    let dir = tempfile::tempdir().unwrap();
    write_csv(dir.path(), "AAA", &hourly_bars(3));
    write_csv(dir.path(), "BBB", &hourly_bars(5));
    std::fs::File::create(dir.path().join("notes.txt"))
        .unwrap()
        .write_all(b"ignored")
        .unwrap();

    let source = CsvBarSource::new(dir.path());
    assert_eq!(source.available_symbols().unwrap(), vec!["AAA", "BBB"]);
    let range = source.date_range("BBB").unwrap().unwrap();
    assert_eq!(range.bars, 5);
}

#[test]
fn malformed_csv_is_a_permanent_storage_error() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("BAD.csv"),
        "time,open,high,low,close,volume\nnot-a-date,1,2,0.5,1.5,10\n",
    )
    .unwrap();
    let loader = BarLoader::new(
        Arc::new(CsvBarSource::new(dir.path())),
        Timeframe::Days(1),
    );
    let (start, end) = window();
    let err = loader.load("BAD", start, end, Timeframe::Days(1)).unwrap_err();
    assert!(matches!(err, DataError::Storage(e) if !e.is_transient()));
}

#[test]
fn quality_findings_gate_checked_loads() {
    let dir = tempfile::tempdir().unwrap();
    let mut bars = hourly_bars(30);
    bars[10].high = bars[10].low - 1.0;
    write_csv(dir.path(), "ODD", &bars);

    let loader = BarLoader::new(
        Arc::new(CsvBarSource::new(dir.path())),
        Timeframe::Hours(1),
    )
    .with_quality_policy(QualityPolicy::default());
    let (start, end) = window();

    let loaded = loader.load("ODD", start, end, Timeframe::Hours(1)).unwrap();
    assert!(loaded
        .quality
        .issues
        .iter()
        .any(|i| matches!(i, QualityIssue::InvalidOhlc { .. })));

    let err = loader
        .load_checked("ODD", start, end, Timeframe::Hours(1))
        .unwrap_err();
    assert!(matches!(err, DataError::DataQuality { .. }));
}

#[test]
fn loaded_bars_drive_a_simulation() {
    let dir = tempfile::tempdir().unwrap();
    write_csv(dir.path(), "SIM", &hourly_bars(240));
    let loader = BarLoader::new(
        Arc::new(CsvBarSource::new(dir.path())),
        Timeframe::Hours(1),
    );
    let (start, end) = window();
    let loaded = loader.load("SIM", start, end, Timeframe::Hours(1)).unwrap();

    let params = ParameterSet::new().with("fast", 4).with("slow", 12);
    let mut strategy = StrategyKind::MaCrossover.build(&params).unwrap();
    let out = simulate(strategy.as_mut(), "SIM", &loaded.bars, &EngineConfig::default()).unwrap();
    assert_eq!(out.equity_curve.len(), 240);
    assert!(!out.trades.is_empty());
}

#[cfg(feature = "sqlite")]
mod sqlite {
    use super::*;
    use stratlab_core::data::SqliteBarSource;

    #[test]
    fn sqlite_source_round_trips_through_loader() {
        let dir = tempfile::tempdir().unwrap();
        let source = SqliteBarSource::open(dir.path().join("bars.db"), 2).unwrap();
        source.initialize_schema().unwrap();
        let bars = hourly_bars(48);
        source.insert_bars("XYZ", &bars).unwrap();

        let loader = BarLoader::new(Arc::new(source), Timeframe::Hours(1));
        let (start, end) = window();
        let loaded = loader.load("XYZ", start, end, Timeframe::Hours(4)).unwrap();
        assert_eq!(loaded.bars.len(), 12);
        assert_eq!(loaded.bars[0].volume, 4 * 500);

        let missing = loader.load("NOPE", start, end, Timeframe::Hours(1));
        assert!(matches!(missing, Err(DataError::DataUnavailable { .. })));
    }
}
