//! Comparison and ranking across stored runs.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stratlab_core::domain::EquityPoint;
use stratlab_core::fingerprint::Fingerprint;

use crate::metrics::{Direction, Metric};
use crate::portfolio::align_on_union;
use crate::store::{ResultStore, RunRecord, StoreError};

/// One row per `(strategy, symbol, parameters)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub strategy_name: String,
    pub symbol: String,
    pub parameters: String,
    pub created_at: DateTime<Utc>,
    /// Aligned with [`ComparisonTable::columns`].
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonTable {
    pub columns: Vec<Metric>,
    pub rows: Vec<ComparisonRow>,
}

impl ComparisonTable {
    pub fn column(&self, metric: Metric) -> Option<usize> {
        self.columns.iter().position(|m| *m == metric)
    }
}

#[derive(Debug, Clone)]
pub struct RankedRun<'a> {
    /// 1-based.
    pub rank: usize,
    pub value: Option<f64>,
    pub record: &'a RunRecord,
}

/// Equity curves of several runs on one timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedCurves {
    pub times: Vec<DateTime<Utc>>,
    /// `(label, values)`; `None` before a run's first point.
    pub series: Vec<(String, Vec<Option<f64>>)>,
}

pub struct Comparator {
    /// Deduplicated, in first-appearance order.
    records: Vec<RunRecord>,
}

impl Comparator {
    /// Collapse duplicates of the same key, keeping the latest `created_at`
    /// (later input wins a tie).
    pub fn new(records: impl IntoIterator<Item = RunRecord>) -> Self {
        let mut order: Vec<Fingerprint> = Vec::new();
        let mut latest: BTreeMap<Fingerprint, RunRecord> = BTreeMap::new();
        for record in records {
            let key = row_key(&record);
            match latest.get(&key) {
                Some(existing) if existing.created_at > record.created_at => {}
                Some(_) => {
                    latest.insert(key, record);
                }
                None => {
                    order.push(key.clone());
                    latest.insert(key, record);
                }
            }
        }
        let records = order
            .into_iter()
            .filter_map(|k| latest.remove(&k))
            .collect();
        Self { records }
    }

    pub fn from_store(store: &dyn ResultStore, experiment: &str) -> Result<Self, StoreError> {
        Ok(Self::new(store.load(experiment)?))
    }

    pub fn records(&self) -> &[RunRecord] {
        &self.records
    }

    pub fn table(&self, metrics: &[Metric]) -> ComparisonTable {
        let rows = self
            .records
            .iter()
            .map(|r| ComparisonRow {
                strategy_name: r.strategy_name.clone(),
                symbol: r.symbol.clone(),
                parameters: r.parameters.to_string(),
                created_at: r.created_at,
                values: metrics.iter().map(|m| m.value(&r.metrics)).collect(),
            })
            .collect();
        ComparisonTable {
            columns: metrics.to_vec(),
            rows,
        }
    }

    /// Best first; undefined values last; stable for ties.
    pub fn rank(&self, metric: Metric, direction: Direction) -> Vec<RankedRun<'_>> {
        let mut ranked: Vec<(Option<f64>, &RunRecord)> = self
            .records
            .iter()
            .map(|r| (metric.value(&r.metrics), r))
            .collect();
        ranked.sort_by(|a, b| direction.rank_order(a.0, b.0));
        ranked
            .into_iter()
            .enumerate()
            .map(|(i, (value, record))| RankedRun {
                rank: i + 1,
                value,
                record,
            })
            .collect()
    }

    pub fn best(&self, metric: Metric, direction: Direction) -> Option<&RunRecord> {
        self.rank(metric, direction)
            .into_iter()
            .find(|r| r.value.is_some())
            .map(|r| r.record)
    }

    /// All equity curves on the union timeline, labelled
    /// `strategy/symbol [params]`.
    pub fn equity_curves(&self) -> AlignedCurves {
        let curves: Vec<&[EquityPoint]> = self
            .records
            .iter()
            .map(|r| r.equity_curve.as_slice())
            .collect();
        let (times, columns) = align_on_union(&curves);
        let series = self
            .records
            .iter()
            .zip(columns)
            .map(|(r, values)| {
                (
                    format!("{}/{} [{}]", r.strategy_name, r.symbol, r.parameters),
                    values,
                )
            })
            .collect();
        AlignedCurves { times, series }
    }
}

/// Unscoped fingerprint: same strategy, symbol and parameters share a row.
fn row_key(r: &RunRecord) -> Fingerprint {
    Fingerprint::compute(&r.strategy_name, &r.symbol, &r.parameters)
}
