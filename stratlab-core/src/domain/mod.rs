//! Domain types for stratlab

pub mod bar;
pub mod equity;
pub mod params;
pub mod position;
pub mod trade;

pub use bar::Bar;
pub use equity::EquityPoint;
pub use params::{ParamValue, ParameterSet};
pub use position::{Position, Side};
pub use trade::{ExitReason, Trade};

/// Symbol type alias
pub type Symbol = String;
