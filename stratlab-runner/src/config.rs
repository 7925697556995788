//! TOML configuration: one structured document, validated once at load.
//!
//! ```toml
//! [engine]
//! initial_cash = 50000.0
//! commission_rate = 0.001
//! sizing = { rule = "cash_fraction", value = 0.5 }
//!
//! [data]
//! native_timeframe = "1d"
//! source = { kind = "csv", dir = "data/bars" }
//!
//! [optimizer]
//! metric = "sortino"
//! max_workers = 4
//! cache = { kind = "directory", path = ".stratlab/cache" }
//!
//! [store]
//! root = "results"
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use stratlab_core::data::{
    BarLoader, BarSource, CsvBarSource, QualityPolicy, RetryPolicy, SqliteBarSource, StorageError,
    Timeframe,
};
use stratlab_core::engine::EngineConfig;

use crate::optimizer::{CachePersistence, OptimizerConfig};
use crate::store::{JsonlResultStore, StoreError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid {field}: {reason}")]
    Invalid { field: String, reason: String },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ConfigError {
    fn invalid(field: &str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StratlabConfig {
    pub engine: EngineConfig,
    pub data: DataConfig,
    pub optimizer: OptimizerConfig,
    pub store: StoreConfig,
}

impl StratlabConfig {
    /// Parse and validate.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine
            .validate()
            .map_err(|e| ConfigError::invalid("engine", e.to_string()))?;
        self.data.validate()?;
        if self.optimizer.max_workers == Some(0) {
            return Err(ConfigError::invalid("optimizer.max_workers", "must be at least 1"));
        }
        if let CachePersistence::Directory(dir) = &self.optimizer.cache {
            if dir.as_os_str().is_empty() {
                return Err(ConfigError::invalid("optimizer.cache", "empty directory path"));
            }
        }
        if self.store.root.as_os_str().is_empty() {
            return Err(ConfigError::invalid("store.root", "empty path"));
        }
        Ok(())
    }
}

/// Where bars come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    Csv { dir: PathBuf },
    Sqlite { path: PathBuf, pool_size: u32 },
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::Csv {
            dir: PathBuf::from("data"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub source: SourceConfig,
    pub native_timeframe: Timeframe,
    pub retry: RetryPolicy,
    pub quality: QualityPolicy,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            native_timeframe: Timeframe::Days(1),
            retry: RetryPolicy::default(),
            quality: QualityPolicy::default(),
        }
    }
}

impl DataConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::invalid("data.retry.max_attempts", "must be at least 1"));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(ConfigError::invalid(
                "data.retry",
                "base_delay_ms exceeds max_delay_ms",
            ));
        }
        if let SourceConfig::Sqlite { pool_size: 0, .. } = self.source {
            return Err(ConfigError::invalid("data.source.pool_size", "must be at least 1"));
        }
        Ok(())
    }

    /// Open the configured source and wrap it in a loader.
    pub fn build_loader(&self) -> Result<BarLoader, ConfigError> {
        let source: Arc<dyn BarSource> = match &self.source {
            SourceConfig::Csv { dir } => Arc::new(CsvBarSource::new(dir)),
            SourceConfig::Sqlite { path, pool_size } => {
                Arc::new(SqliteBarSource::open(path, *pool_size)?)
            }
        };
        Ok(BarLoader::new(source, self.native_timeframe)
            .with_retry(self.retry.clone())
            .with_quality_policy(self.quality.clone()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub root: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("results"),
        }
    }
}

impl StoreConfig {
    pub fn open(&self) -> Result<JsonlResultStore, StoreError> {
        JsonlResultStore::open(&self.root)
    }
}
