//! Run cache keyed by fingerprint.
//!
//! An in-memory `DashMap` is always present. With `CachePersistence::Directory`
//! every completed run is also written as `<fingerprint>.json`, and misses fall
//! through to disk, so a later session can reuse earlier work. Concurrent
//! writers of one fingerprint are harmless: by determinism they carry the same
//! result, and the last write wins.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

use stratlab_core::fingerprint::Fingerprint;

use crate::runner::SimulationResult;

/// Where cached runs live beyond the current process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum CachePersistence {
    #[default]
    Memory,
    Directory(PathBuf),
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Default)]
pub struct RunCache {
    entries: DashMap<Fingerprint, Arc<SimulationResult>>,
    dir: Option<PathBuf>,
}

impl RunCache {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Memory cache backed by `dir`, created if missing.
    pub fn with_directory(dir: impl AsRef<Path>) -> Result<Self, CacheError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|source| CacheError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self {
            entries: DashMap::new(),
            dir: Some(dir),
        })
    }

    pub fn from_persistence(persistence: &CachePersistence) -> Result<Self, CacheError> {
        match persistence {
            CachePersistence::Memory => Ok(Self::in_memory()),
            CachePersistence::Directory(dir) => Self::with_directory(dir),
        }
    }

    /// Look up a run; on a memory miss, try the directory.
    ///
    /// Unreadable or corrupt files count as misses.
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<Arc<SimulationResult>> {
        if let Some(hit) = self.entries.get(fingerprint) {
            return Some(Arc::clone(hit.value()));
        }
        let path = self.path_for(fingerprint)?;
        if !path.exists() {
            return None;
        }
        let loaded = std::fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|json| {
                serde_json::from_str::<SimulationResult>(&json).map_err(|e| e.to_string())
            });
        match loaded {
            Ok(result) => {
                let result = Arc::new(result);
                self.entries.insert(fingerprint.clone(), Arc::clone(&result));
                Some(result)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable cache entry");
                None
            }
        }
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.entries.contains_key(fingerprint)
            || self.path_for(fingerprint).is_some_and(|p| p.exists())
    }

    /// Store a completed run. A failed disk write is logged, never fatal:
    /// the memory entry still serves this session.
    pub fn put(&self, result: Arc<SimulationResult>) {
        if let Some(path) = self.path_for(&result.fingerprint) {
            let written = serde_json::to_string(result.as_ref())
                .map_err(|e| e.to_string())
                .and_then(|json| std::fs::write(&path, json).map_err(|e| e.to_string()));
            if let Err(e) = written {
                warn!(path = %path.display(), error = %e, "failed to persist cache entry");
            }
        }
        self.entries.insert(result.fingerprint.clone(), result);
    }

    /// Entries held in memory.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop the memory entries. Files on disk are kept.
    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn directory(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    fn path_for(&self, fingerprint: &Fingerprint) -> Option<PathBuf> {
        self.dir
            .as_ref()
            .map(|d| d.join(format!("{}.json", fingerprint.0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::run_on_bars;
    use chrono::{Duration, TimeZone, Utc};
    use stratlab_core::data::Timeframe;
    use stratlab_core::domain::{Bar, ParameterSet};
    use stratlab_core::engine::EngineConfig;
    use stratlab_core::strategy::StrategyKind;

    fn sample_result() -> SimulationResult {
        let t0 = Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap();
        let bars: Vec<Bar> = (0..40)
            .map(|i| {
                let close = 50.0 + (i % 7) as f64;
                Bar {
                    time: t0 + Duration::days(i),
                    open: close,
                    high: close + 1.0,
                    low: close - 1.0,
                    close,
                    volume: 10,
                    vwap: None,
                }
            })
            .collect();
        run_on_bars(
            StrategyKind::Bollinger,
            &ParameterSet::new().with("period", 5),
            "C",
            &bars,
            Timeframe::Days(1),
            &EngineConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn memory_put_get() {
        let cache = RunCache::in_memory();
        let result = Arc::new(sample_result());
        let fp = result.fingerprint.clone();
        assert!(cache.get(&fp).is_none());
        cache.put(Arc::clone(&result));
        assert!(cache.contains(&fp));
        assert!(Arc::ptr_eq(&cache.get(&fp).unwrap(), &result));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn directory_cache_survives_a_new_session() {
        let dir = tempfile::tempdir().unwrap();
        let result = Arc::new(sample_result());
        let fp = result.fingerprint.clone();

        let first = RunCache::with_directory(dir.path()).unwrap();
        first.put(Arc::clone(&result));
        assert!(dir.path().join(format!("{fp}.json")).exists());

        let second = RunCache::from_persistence(&CachePersistence::Directory(
            dir.path().to_path_buf(),
        ))
        .unwrap();
        assert!(second.is_empty());
        assert!(second.contains(&fp));
        let reloaded = second.get(&fp).unwrap();
        assert_eq!(reloaded.fingerprint, fp);
        assert_eq!(reloaded.parameters, result.parameters);
        assert_eq!(reloaded.trades.len(), result.trades.len());
        assert_eq!(reloaded.equity_curve.len(), result.equity_curve.len());
        assert_eq!(second.len(), 1);
    }

    #[test]
    fn corrupt_file_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = RunCache::with_directory(dir.path()).unwrap();
        let fp = Fingerprint("deadbeef".into());
        std::fs::write(dir.path().join("deadbeef.json"), "{not json").unwrap();
        assert!(cache.get(&fp).is_none());
    }

    #[test]
    fn clear_keeps_files() {
        let dir = tempfile::tempdir().unwrap();
        let cache = RunCache::with_directory(dir.path()).unwrap();
        let result = Arc::new(sample_result());
        let fp = result.fingerprint.clone();
        cache.put(result);
        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.get(&fp).is_some());
    }
}
