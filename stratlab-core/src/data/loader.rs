//! Bar loader: the Data Access Adapter's entry point.
//!
//! Queries a [`BarSource`] through a [`RetryPolicy`], validates the raw rows,
//! orders them by time and resamples to the requested timeframe.

use super::quality::{validate, QualityPolicy, QualityReport};
use super::resample::resample;
use super::retry::RetryPolicy;
use super::source::{BarSource, SymbolRange};
use super::timeframe::Timeframe;
use super::DataError;
use crate::domain::Bar;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A loaded series with its validation findings attached.
#[derive(Debug, Clone)]
pub struct LoadedBars {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub bars: Vec<Bar>,
    /// Issues found in the raw rows, before resampling.
    pub quality: QualityReport,
}

/// Outcome of loading several symbols: what loaded and what did not.
#[derive(Debug, Default)]
pub struct BatchLoad {
    pub loaded: BTreeMap<String, LoadedBars>,
    pub failures: Vec<(String, DataError)>,
}

pub struct BarLoader {
    source: Arc<dyn BarSource>,
    retry: RetryPolicy,
    native: Timeframe,
    policy: QualityPolicy,
}

impl BarLoader {
    /// `native` is the interval the source stores bars at.
    pub fn new(source: Arc<dyn BarSource>, native: Timeframe) -> Self {
        Self {
            source,
            retry: RetryPolicy::default(),
            native,
            policy: QualityPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_quality_policy(mut self, policy: QualityPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn native_timeframe(&self) -> Timeframe {
        self.native
    }

    /// Load bars for `symbol` in `[start, end]` at `timeframe`.
    ///
    /// Quality issues are attached to the result, never fatal here.
    pub fn load(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        timeframe: Timeframe,
    ) -> Result<LoadedBars, DataError> {
        if start >= end {
            return Err(DataError::InvalidRange { start, end });
        }
        if timeframe.seconds() < self.native.seconds() {
            return Err(DataError::FinerTimeframe {
                native: self.native,
                requested: timeframe,
            });
        }

        let mut rows = self
            .retry
            .run("query", || self.source.query(symbol, start, end))?;
        if rows.is_empty() {
            warn!(symbol, %start, %end, source = self.source.name(), "no bars in range");
            return Err(DataError::DataUnavailable {
                symbol: symbol.to_string(),
                start,
                end,
            });
        }

        let quality = validate(&rows, self.native.seconds(), &self.policy);
        if !quality.is_clean() {
            warn!(symbol, issues = quality.issues.len(), summary = %quality, "data quality issues");
        }

        // Stable: duplicate timestamps keep their source order.
        rows.sort_by_key(|b| b.time);
        let bars = if timeframe == self.native {
            rows
        } else {
            let out = resample(&rows, timeframe);
            debug!(symbol, from = rows.len(), to = out.len(), %timeframe, "resampled");
            out
        };

        info!(symbol, bars = bars.len(), %timeframe, "loaded bars");
        Ok(LoadedBars {
            symbol: symbol.to_string(),
            timeframe,
            bars,
            quality,
        })
    }

    /// Like [`load`](Self::load), but aborts with `DataQuality` when the
    /// findings exceed the configured policy.
    pub fn load_checked(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        timeframe: Timeframe,
    ) -> Result<LoadedBars, DataError> {
        let loaded = self.load(symbol, start, end, timeframe)?;
        if loaded.quality.exceeds(&self.policy) {
            return Err(DataError::DataQuality {
                symbol: symbol.to_string(),
                report: loaded.quality,
            });
        }
        Ok(loaded)
    }

    /// Load several symbols, continuing past per-symbol failures.
    pub fn load_many(
        &self,
        symbols: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        timeframe: Timeframe,
    ) -> BatchLoad {
        let mut batch = BatchLoad::default();
        for symbol in symbols {
            match self.load(symbol, start, end, timeframe) {
                Ok(loaded) => {
                    batch.loaded.insert(symbol.clone(), loaded);
                }
                Err(e) => {
                    warn!(symbol = symbol.as_str(), error = %e, "failed to load symbol");
                    batch.failures.push((symbol.clone(), e));
                }
            }
        }
        info!(
            loaded = batch.loaded.len(),
            total = symbols.len(),
            "batch load complete"
        );
        batch
    }

    pub fn available_symbols(&self) -> Result<Vec<String>, DataError> {
        Ok(self
            .retry
            .run("available_symbols", || self.source.available_symbols())?)
    }

    pub fn date_range(&self, symbol: &str) -> Result<Option<SymbolRange>, DataError> {
        Ok(self
            .retry
            .run("date_range", || self.source.date_range(symbol))?)
    }
}
