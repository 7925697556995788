//! CSV-backed bar source: one `<SYMBOL>.csv` per symbol in a directory.
//!
//! Columns: `time,open,high,low,close,volume[,vwap]`, with `time` in RFC 3339.

use super::source::{range_of, BarSource, StorageError, SymbolRange};
use crate::domain::Bar;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct CsvBarSource {
    dir: PathBuf,
}

impl CsvBarSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{symbol}.csv"))
    }

    /// Read a whole symbol file. A missing file is an empty series.
    fn read_all(&self, symbol: &str) -> Result<Vec<Bar>, StorageError> {
        let path = self.path_for(symbol);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::Reader::from_path(&path).map_err(|e| map_csv_error(&path, e))?;
        let mut bars = Vec::new();
        for row in reader.deserialize::<Bar>() {
            bars.push(row.map_err(|e| map_csv_error(&path, e))?);
        }
        Ok(bars)
    }
}

fn map_csv_error(path: &Path, e: csv::Error) -> StorageError {
    let msg = format!("{}: {e}", path.display());
    if e.is_io_error() {
        StorageError::Transient(msg)
    } else {
        StorageError::Permanent(msg)
    }
}

impl BarSource for CsvBarSource {
    fn name(&self) -> &str {
        "csv"
    }

    fn query(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Bar>, StorageError> {
        let mut bars: Vec<Bar> = self
            .read_all(symbol)?
            .into_iter()
            .filter(|b| b.time >= start && b.time <= end)
            .collect();
        bars.sort_by_key(|b| b.time);
        Ok(bars)
    }

    fn available_symbols(&self) -> Result<Vec<String>, StorageError> {
        let entries = std::fs::read_dir(&self.dir)
            .map_err(|e| StorageError::Transient(format!("{}: {e}", self.dir.display())))?;
        let mut symbols = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|e| StorageError::Transient(e.to_string()))?
                .path();
            if path.extension().and_then(|e| e.to_str()) != Some("csv") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if !self.read_all(stem)?.is_empty() {
                    symbols.push(stem.to_string());
                }
            }
        }
        symbols.sort();
        Ok(symbols)
    }

    fn date_range(&self, symbol: &str) -> Result<Option<SymbolRange>, StorageError> {
        Ok(range_of(&self.read_all(symbol)?))
    }
}
