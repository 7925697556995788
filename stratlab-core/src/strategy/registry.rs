//! Strategy registry: name → variant, with parameter validation.

use super::{
    BollingerReversion, MaCrossover, MacdCrossover, Strategy, StrategyError, VwapReversion,
};
use crate::domain::ParameterSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    MaCrossover,
    Bollinger,
    Macd,
    VwapReversion,
}

impl StrategyKind {
    pub fn all() -> &'static [StrategyKind] {
        &[
            StrategyKind::MaCrossover,
            StrategyKind::Bollinger,
            StrategyKind::Macd,
            StrategyKind::VwapReversion,
        ]
    }

    pub fn id(&self) -> &'static str {
        match self {
            StrategyKind::MaCrossover => MaCrossover::ID,
            StrategyKind::Bollinger => BollingerReversion::ID,
            StrategyKind::Macd => MacdCrossover::ID,
            StrategyKind::VwapReversion => VwapReversion::ID,
        }
    }

    /// Construct a fresh, uninitialized strategy.
    pub fn build(&self, params: &ParameterSet) -> Result<Box<dyn Strategy>, StrategyError> {
        Ok(match self {
            StrategyKind::MaCrossover => Box::new(MaCrossover::from_params(params)?),
            StrategyKind::Bollinger => Box::new(BollingerReversion::from_params(params)?),
            StrategyKind::Macd => Box::new(MacdCrossover::from_params(params)?),
            StrategyKind::VwapReversion => Box::new(VwapReversion::from_params(params)?),
        })
    }

    /// Run the variant's validation without keeping the strategy.
    pub fn validate(&self, params: &ParameterSet) -> Result<(), StrategyError> {
        self.build(params).map(|_| ())
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for StrategyKind {
    type Err = StrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StrategyKind::all()
            .iter()
            .copied()
            .find(|k| k.id() == s)
            .ok_or_else(|| StrategyError::UnknownStrategy(s.to_string()))
    }
}
