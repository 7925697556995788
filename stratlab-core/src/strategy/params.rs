//! Typed access to a `ParameterSet` with strategy-level validation.

use super::{RiskThresholds, StrategyError};
use crate::domain::{ParamValue, ParameterSet};
use std::collections::BTreeSet;

/// Reads typed values out of a parameter set, tracking which keys were used
/// so that `finish` can reject unknown ones.
pub struct ParamReader<'a> {
    strategy: &'a str,
    params: &'a ParameterSet,
    seen: BTreeSet<&'a str>,
}

impl<'a> ParamReader<'a> {
    pub fn new(strategy: &'a str, params: &'a ParameterSet) -> Self {
        Self {
            strategy,
            params,
            seen: BTreeSet::new(),
        }
    }

    pub fn invalid(&self, reason: impl Into<String>) -> StrategyError {
        StrategyError::InvalidParameters {
            strategy: self.strategy.to_string(),
            reason: reason.into(),
        }
    }

    fn lookup(&mut self, name: &'a str) -> Option<&'a ParamValue> {
        self.seen.insert(name);
        self.params.get(name)
    }

    /// Positive integer (window lengths, periods).
    pub fn period(&mut self, name: &'a str, default: usize) -> Result<usize, StrategyError> {
        match self.lookup(name) {
            None => Ok(default),
            Some(v) => match v.as_i64() {
                Some(n) if n >= 1 => Ok(n as usize),
                Some(n) => Err(self.invalid(format!("{name} must be >= 1, got {n}"))),
                None => Err(self.invalid(format!("{name} must be an integer, got {v}"))),
            },
        }
    }

    pub fn float(&mut self, name: &'a str, default: f64) -> Result<f64, StrategyError> {
        match self.lookup(name) {
            None => Ok(default),
            Some(v) => match v.as_f64() {
                Some(x) if x.is_finite() => Ok(x),
                _ => Err(self.invalid(format!("{name} must be a finite number, got {v}"))),
            },
        }
    }

    pub fn opt_float(&mut self, name: &'a str) -> Result<Option<f64>, StrategyError> {
        match self.lookup(name) {
            None => Ok(None),
            Some(_) => self.float(name, 0.0).map(Some),
        }
    }

    pub fn flag(&mut self, name: &'a str, default: bool) -> Result<bool, StrategyError> {
        match self.lookup(name) {
            None => Ok(default),
            Some(v) => v
                .as_bool()
                .ok_or_else(|| self.invalid(format!("{name} must be true or false, got {v}"))),
        }
    }

    pub fn text(&mut self, name: &'a str, default: &str) -> Result<String, StrategyError> {
        match self.lookup(name) {
            None => Ok(default.to_string()),
            Some(v) => v
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| self.invalid(format!("{name} must be a string, got {v}"))),
        }
    }

    /// Reject keys no accessor asked for.
    pub fn finish(self) -> Result<(), StrategyError> {
        let unknown: Vec<&str> = self
            .params
            .names()
            .filter(|n| !self.seen.contains(n))
            .collect();
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(self.invalid(format!("unknown parameter(s): {}", unknown.join(", "))))
        }
    }
}

/// Risk and sizing parameters every variant accepts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskParams {
    /// 0 disables the stop.
    pub stop_loss_pct: f64,
    pub take_profit_pct: Option<f64>,
    pub position_size: f64,
}

impl RiskParams {
    pub const DEFAULT_STOP_LOSS_PCT: f64 = 0.02;

    pub fn read(reader: &mut ParamReader<'_>) -> Result<Self, StrategyError> {
        let stop_loss_pct = reader.float("stop_loss_pct", Self::DEFAULT_STOP_LOSS_PCT)?;
        let take_profit_pct = reader.opt_float("take_profit_pct")?;
        let position_size = reader.float("position_size", 1.0)?;

        if !(0.0..=1.0).contains(&stop_loss_pct) {
            return Err(reader.invalid(format!(
                "stop_loss_pct must be between 0 and 1, got {stop_loss_pct}"
            )));
        }
        if let Some(tp) = take_profit_pct {
            if !(0.0..=1.0).contains(&tp) {
                return Err(reader.invalid(format!(
                    "take_profit_pct must be between 0 and 1, got {tp}"
                )));
            }
        }
        if !(position_size > 0.0 && position_size <= 1.0) {
            return Err(reader.invalid(format!(
                "position_size must be in (0, 1], got {position_size}"
            )));
        }
        Ok(Self {
            stop_loss_pct,
            take_profit_pct,
            position_size,
        })
    }

    pub fn thresholds(&self) -> RiskThresholds {
        RiskThresholds {
            stop_loss_pct: (self.stop_loss_pct > 0.0).then_some(self.stop_loss_pct),
            take_profit_pct: self.take_profit_pct.filter(|tp| *tp > 0.0),
        }
    }
}
