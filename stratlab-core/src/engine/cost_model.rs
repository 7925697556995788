//! Slippage and commission.
//!
//! Slippage is directional: buyers pay more, sellers receive less.
//! Commission is a fraction of fill notional, charged per side.

/// Which way a fill moves units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostModel {
    pub slippage_bps: f64,
    pub commission_rate: f64,
}

impl CostModel {
    pub fn new(slippage_bps: f64, commission_rate: f64) -> Self {
        Self {
            slippage_bps,
            commission_rate,
        }
    }

    pub fn frictionless() -> Self {
        Self::new(0.0, 0.0)
    }

    /// Raw price moved against the trader by the slippage offset.
    pub fn fill_price(&self, raw_price: f64, side: FillSide) -> f64 {
        let slip = self.slippage_bps / 10_000.0;
        match side {
            FillSide::Buy => raw_price * (1.0 + slip),
            FillSide::Sell => raw_price * (1.0 - slip),
        }
    }

    pub fn commission(&self, fill_price: f64, quantity: f64) -> f64 {
        fill_price * quantity * self.commission_rate
    }
}
