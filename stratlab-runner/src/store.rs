//! Results store: experiments persisted as append-only JSONL.
//!
//! One `<experiment>.jsonl` file per experiment, one `RunRecord` per line.
//! Each line is independent: a torn final line is terminated before the next
//! append, so it costs only itself. Malformed lines are skipped on load with a
//! warning.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use stratlab_core::domain::{EquityPoint, ParameterSet, Trade};
use stratlab_core::fingerprint::Fingerprint;

use crate::metrics::PerformanceMetrics;
use crate::runner::SimulationResult;

/// Current schema version for persisted records.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("experiment '{0}' not found")]
    NotFound(String),
    #[error("invalid experiment name '{0}'")]
    InvalidName(String),
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// One persisted run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub experiment: String,
    pub strategy_name: String,
    pub symbol: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub parameters: ParameterSet,
    pub metrics: PerformanceMetrics,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub created_at: DateTime<Utc>,
    pub fingerprint: Fingerprint,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl RunRecord {
    pub fn from_result(experiment: &str, result: &SimulationResult) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            experiment: experiment.to_string(),
            strategy_name: result.strategy_id.clone(),
            symbol: result.symbol.clone(),
            start: result.start,
            end: result.end,
            parameters: result.parameters.clone(),
            metrics: result.metrics.clone(),
            trades: result.trades.clone(),
            equity_curve: result.equity_curve.clone(),
            created_at: Utc::now(),
            fingerprint: result.fingerprint.clone(),
        }
    }
}

/// Persistence for experiment records.
pub trait ResultStore: Send + Sync {
    /// Append a prepared record to its experiment.
    fn append(&self, record: &RunRecord) -> Result<(), StoreError>;

    /// All records of `experiment` in insertion order.
    fn load(&self, experiment: &str) -> Result<Vec<RunRecord>, StoreError>;

    /// Known experiment names, sorted.
    fn list_experiments(&self) -> Result<Vec<String>, StoreError>;

    /// Record `result` under `experiment`.
    fn save(&self, experiment: &str, result: &SimulationResult) -> Result<RunRecord, StoreError> {
        validate_name(experiment)?;
        let record = RunRecord::from_result(experiment, result);
        self.append(&record)?;
        Ok(record)
    }

    /// Record a batch (e.g. every completed optimizer run).
    fn save_all<'a, I>(&self, experiment: &str, results: I) -> Result<usize, StoreError>
    where
        I: IntoIterator<Item = &'a SimulationResult>,
        Self: Sized,
    {
        let mut count = 0;
        for result in results {
            self.save(experiment, result)?;
            count += 1;
        }
        Ok(count)
    }
}

/// Names become file stems: ASCII alphanumerics plus `-`, `_` and `.`,
/// not starting with a dot.
pub fn validate_name(name: &str) -> Result<(), StoreError> {
    let ok = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if ok {
        Ok(())
    } else {
        Err(StoreError::InvalidName(name.to_string()))
    }
}

// ─── JSONL ──────────────────────────────────────────────────────────

pub struct JsonlResultStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlResultStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|source| StoreError::Io {
            path: root.clone(),
            source,
        })?;
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, experiment: &str) -> PathBuf {
        self.root.join(format!("{experiment}.jsonl"))
    }
}

/// True when the file is non-empty and its last byte is not a newline.
fn ends_mid_line(file: &mut fs::File) -> io::Result<bool> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(false);
    }
    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

impl ResultStore for JsonlResultStore {
    fn append(&self, record: &RunRecord) -> Result<(), StoreError> {
        validate_name(&record.experiment)?;
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        let path = self.path_for(&record.experiment);
        let io_err = |source| StoreError::Io {
            path: path.clone(),
            source,
        };

        // One writer at a time keeps lines whole.
        let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .map_err(io_err)?;
        if ends_mid_line(&mut file).map_err(io_err)? {
            warn!(
                experiment = record.experiment.as_str(),
                "terminating torn final line"
            );
            line.insert(0, '\n');
        }
        // Single write so concurrent appenders cannot interleave inside a line.
        file.write_all(line.as_bytes()).map_err(io_err)?;
        file.flush().map_err(io_err)?;
        debug!(
            experiment = record.experiment.as_str(),
            fingerprint = record.fingerprint.short(),
            "record saved"
        );
        Ok(())
    }

    fn load(&self, experiment: &str) -> Result<Vec<RunRecord>, StoreError> {
        validate_name(experiment)?;
        let path = self.path_for(experiment);
        let file = match fs::File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(experiment.to_string()))
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        let mut records = Vec::new();
        for (lineno, line) in io::BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<RunRecord>(&line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(
                    experiment,
                    line = lineno + 1,
                    error = %e,
                    "skipping malformed record"
                ),
            }
        }
        info!(experiment, records = records.len(), "experiment loaded");
        Ok(records)
    }

    fn list_experiments(&self) -> Result<Vec<String>, StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.root.clone(),
            source,
        };
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

// ─── Memory ─────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryResultStore {
    experiments: RwLock<BTreeMap<String, Vec<RunRecord>>>,
}

impl MemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResultStore for MemoryResultStore {
    fn append(&self, record: &RunRecord) -> Result<(), StoreError> {
        validate_name(&record.experiment)?;
        let mut map = self.experiments.write().unwrap_or_else(|p| p.into_inner());
        map.entry(record.experiment.clone())
            .or_default()
            .push(record.clone());
        Ok(())
    }

    fn load(&self, experiment: &str) -> Result<Vec<RunRecord>, StoreError> {
        let map = self.experiments.read().unwrap_or_else(|p| p.into_inner());
        map.get(experiment)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(experiment.to_string()))
    }

    fn list_experiments(&self) -> Result<Vec<String>, StoreError> {
        let map = self.experiments.read().unwrap_or_else(|p| p.into_inner());
        Ok(map.keys().cloned().collect())
    }
}
