//! Data Access Adapter: bar sources, retry, validation, resampling, loading.

pub mod csv_source;
pub mod loader;
pub mod quality;
pub mod resample;
pub mod retry;
pub mod source;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod timeframe;

pub use csv_source::CsvBarSource;
pub use loader::{BarLoader, BatchLoad, LoadedBars};
pub use quality::{validate, QualityIssue, QualityPolicy, QualityReport};
pub use resample::resample;
pub use retry::RetryPolicy;
pub use source::{BarSource, MemoryBarSource, StorageError, SymbolRange};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteBarSource;
pub use timeframe::{Timeframe, TimeframeError};

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("no bars for {symbol} between {start} and {end}")]
    DataUnavailable {
        symbol: String,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("data quality check failed for {symbol}: {report}")]
    DataQuality {
        symbol: String,
        report: QualityReport,
    },

    #[error("invalid date range: start {start} is not before end {end}")]
    InvalidRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("cannot resample {native} bars down to {requested}")]
    FinerTimeframe {
        native: Timeframe,
        requested: Timeframe,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Daily synthetic bars from close prices, starting 2024-01-02 UTC.
///
/// open = prev close, high/low = body ± 1.0, volume = 1000.
#[cfg(test)]
pub(crate) fn test_bars(closes: &[f64]) -> Vec<crate::domain::Bar> {
    use chrono::TimeZone;
    let base = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            crate::domain::Bar {
                time: base + chrono::Duration::days(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1000,
                vwap: None,
            }
        })
        .collect()
}
