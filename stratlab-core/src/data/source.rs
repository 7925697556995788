//! Bar retrieval interface and storage error types.
//!
//! The `BarSource` trait abstracts over where bars live (SQLite, CSV files,
//! memory) so the loader can be exercised against fakes in tests.

use crate::domain::Bar;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Failure talking to the backing store.
///
/// Only `Transient` is retried by [`RetryPolicy`](super::retry::RetryPolicy).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StorageError {
    #[error("transient storage failure: {0}")]
    Transient(String),

    #[error("storage failure: {0}")]
    Permanent(String),

    #[error("storage unavailable after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
}

impl StorageError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Transient(_))
    }
}

/// First/last timestamp and row count stored for a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolRange {
    pub first: DateTime<Utc>,
    pub last: DateTime<Utc>,
    pub bars: usize,
}

/// Read-only bar retrieval.
///
/// `query` returns rows with `start <= time <= end`, ordered by time ascending.
/// Implementations do not validate, sort defensively, or resample; that is the
/// loader's job.
pub trait BarSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    fn query(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Bar>, StorageError>;

    /// Symbols that have at least one bar, sorted.
    fn available_symbols(&self) -> Result<Vec<String>, StorageError>;

    fn date_range(&self, symbol: &str) -> Result<Option<SymbolRange>, StorageError>;
}

/// In-memory source. Series are stored as given (no sorting).
#[derive(Debug, Clone, Default)]
pub struct MemoryBarSource {
    series: BTreeMap<String, Vec<Bar>>,
}

impl MemoryBarSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_series(mut self, symbol: impl Into<String>, bars: Vec<Bar>) -> Self {
        self.series.insert(symbol.into(), bars);
        self
    }
}

impl BarSource for MemoryBarSource {
    fn name(&self) -> &str {
        "memory"
    }

    fn query(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Bar>, StorageError> {
        Ok(self
            .series
            .get(symbol)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.time >= start && b.time <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn available_symbols(&self) -> Result<Vec<String>, StorageError> {
        Ok(self
            .series
            .iter()
            .filter(|(_, bars)| !bars.is_empty())
            .map(|(s, _)| s.clone())
            .collect())
    }

    fn date_range(&self, symbol: &str) -> Result<Option<SymbolRange>, StorageError> {
        Ok(self.series.get(symbol).and_then(|bars| range_of(bars)))
    }
}

/// Range summary of an arbitrary (possibly unsorted) series.
pub(crate) fn range_of(bars: &[Bar]) -> Option<SymbolRange> {
    let first = bars.iter().map(|b| b.time).min()?;
    let last = bars.iter().map(|b| b.time).max()?;
    Some(SymbolRange {
        first,
        last,
        bars: bars.len(),
    })
}
