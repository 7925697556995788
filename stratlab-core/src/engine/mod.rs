//! Simulation engine: advances one strategy over one symbol's bars.

pub mod config;
pub mod cost_model;
pub mod event_loop;
pub mod state;

pub use config::{EngineConfig, SizingRule};
pub use cost_model::{CostModel, FillSide};
pub use event_loop::simulate;
pub use state::{EngineState, Phase};

use crate::domain::{EquityPoint, Position, Trade};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SimulationError {
    #[error("insufficient cash at {time}: need {required:.2}, have {available:.2}")]
    InsufficientCash {
        time: DateTime<Utc>,
        required: f64,
        available: f64,
    },

    #[error("no bars to simulate")]
    EmptySeries,

    #[error("invalid engine config: {0}")]
    InvalidConfig(String),
}

/// Everything one run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationOutput {
    pub symbol: String,
    pub initial_cash: f64,
    pub final_cash: f64,
    pub trades: Vec<Trade>,
    /// One point per bar processed.
    pub equity_curve: Vec<EquityPoint>,
    /// Still open at the end (only when `close_at_end` is off).
    pub open_position: Option<Position>,
    pub bars_processed: usize,
}
