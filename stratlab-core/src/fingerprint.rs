//! Run fingerprinting: deterministic identity for parameter sets and datasets.

use crate::domain::{Bar, ParameterSet};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Content hash of a bar series (BLAKE3 over canonical JSON rows).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetHash(pub String);

impl DatasetHash {
    pub fn of_bars(bars: &[Bar]) -> Self {
        let mut hasher = blake3::Hasher::new();
        for bar in bars {
            let row = serde_json::json!({
                "t": bar.time.timestamp(),
                "o": bar.open,
                "h": bar.high,
                "l": bar.low,
                "c": bar.close,
                "v": bar.volume,
                "w": bar.vwap,
            });
            hasher.update(row.to_string().as_bytes());
            hasher.update(b"\n");
        }
        Self(hasher.finalize().to_hex().to_string())
    }
}

impl fmt::Display for DatasetHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Deterministic identity of one simulation: strategy id + symbol + parameters.
///
/// Parameters are hashed in sorted key order, so two sets with the same fields
/// built in different orders share a fingerprint. An optional scope string
/// (dataset hash, engine settings) narrows the identity further for caches that
/// outlive a single data load.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint(pub String);

impl Fingerprint {
    pub fn compute(strategy_id: &str, symbol: &str, params: &ParameterSet) -> Self {
        Self::compute_scoped(strategy_id, symbol, params, "")
    }

    pub fn compute_scoped(
        strategy_id: &str,
        symbol: &str,
        params: &ParameterSet,
        scope: &str,
    ) -> Self {
        // serde_json::Value objects are BTreeMap-backed: keys serialize sorted.
        let canonical = serde_json::json!({
            "strategy": strategy_id,
            "symbol": symbol,
            "parameters": params,
            "scope": scope,
        });
        let hash = blake3::hash(canonical.to_string().as_bytes());
        Self(hash.to_hex().to_string())
    }

    /// First 12 hex chars, for log lines.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
