//! Bar-by-bar simulation loop.
//!
//! Per bar, in fixed order:
//! 1. Risk exits for an open position (stop before target, intrabar low/high).
//! 2. Strategy `on_bar`; `Enter` opens when flat, `Exit` closes when open.
//!    No re-entry on a bar that already produced a risk exit. Signal fills
//!    are at the close (risk exits at their trigger), slippage applied against
//!    the trader, commission charged on notional.
//! 3. On the last bar, close anything still open when `close_at_end` is set.
//! 4. Equity point appended: cash + mark-to-market at the close.

use super::config::{EngineConfig, SizingRule};
use super::cost_model::{CostModel, FillSide};
use super::state::{EngineState, Phase};
use super::{SimulationError, SimulationOutput};
use crate::domain::{Bar, EquityPoint, ExitReason, Position, Side, Trade};
use crate::strategy::{BarContext, RiskThresholds, Signal, Strategy};
use tracing::debug;

/// Run `strategy` over `bars` for one symbol.
///
/// Strictly sequential and deterministic: the same bars, parameters and config
/// always produce the same output. Errors abort this run only.
pub fn simulate(
    strategy: &mut dyn Strategy,
    symbol: &str,
    bars: &[Bar],
    config: &EngineConfig,
) -> Result<SimulationOutput, SimulationError> {
    config.validate()?;
    if bars.is_empty() {
        return Err(SimulationError::EmptySeries);
    }

    strategy.initialize(bars);
    let risk = strategy.risk();
    let position_size = strategy.position_size();

    let mut run = Run {
        symbol,
        config,
        cost: CostModel::new(config.slippage_bps, config.commission_rate),
        state: EngineState::new(config.initial_cash),
        trades: Vec::new(),
    };
    let mut equity_curve = Vec::with_capacity(bars.len());
    let last = bars.len() - 1;

    for (i, bar) in bars.iter().enumerate() {
        // ── 1. Risk exits ──
        let mut exited_on_risk = false;
        if let Some(pos) = run.state.position.as_ref() {
            if let Some((reason, raw)) = risk_trigger(pos, bar, &risk) {
                run.close(i, bar, raw, reason)?;
                exited_on_risk = true;
            }
        }

        // ── 2. Strategy ──
        let signal = {
            let ctx = BarContext {
                index: i,
                bar,
                history: &bars[..=i],
                position: run.state.position.as_ref(),
            };
            strategy.on_bar(&ctx)
        };
        match signal {
            Signal::Enter(side) if run.state.phase() == Phase::Flat && !exited_on_risk => {
                if side == Side::Short && !config.allow_short {
                    debug!(symbol, bar = i, "short entry ignored: shorting disabled");
                } else {
                    run.open(i, bar, side, position_size)?;
                }
            }
            Signal::Exit if run.state.phase() != Phase::Flat => {
                run.close(i, bar, bar.close, ExitReason::Signal)?;
            }
            _ => {}
        }

        // ── 3. End of data ──
        if i == last && config.close_at_end && run.state.phase() != Phase::Flat {
            run.close(i, bar, bar.close, ExitReason::EndOfData)?;
        }

        // ── 4. Mark to market ──
        equity_curve.push(EquityPoint::new(bar.time, run.state.equity(bar.close)));
    }

    debug!(
        symbol,
        strategy = strategy.id(),
        bars = bars.len(),
        trades = run.trades.len(),
        final_cash = run.state.cash,
        "simulation complete"
    );

    Ok(SimulationOutput {
        symbol: symbol.to_string(),
        initial_cash: config.initial_cash,
        final_cash: run.state.cash,
        trades: run.trades,
        equity_curve,
        open_position: run.state.position,
        bars_processed: bars.len(),
    })
}

/// Intrabar stop / target check for an open position.
///
/// Returns the exit reason and the raw trigger price: the level itself, or the
/// bar open when the bar gapped through it. If both levels trade inside one
/// bar the stop wins.
fn risk_trigger(pos: &Position, bar: &Bar, risk: &RiskThresholds) -> Option<(ExitReason, f64)> {
    let entry = pos.entry_price;
    match pos.side {
        Side::Long => {
            if let Some(sl) = risk.stop_loss_pct {
                let stop = entry * (1.0 - sl);
                if bar.low <= stop {
                    return Some((ExitReason::StopLoss, bar.open.min(stop)));
                }
            }
            if let Some(tp) = risk.take_profit_pct {
                let target = entry * (1.0 + tp);
                if bar.high >= target {
                    return Some((ExitReason::TakeProfit, bar.open.max(target)));
                }
            }
        }
        Side::Short => {
            if let Some(sl) = risk.stop_loss_pct {
                let stop = entry * (1.0 + sl);
                if bar.high >= stop {
                    return Some((ExitReason::StopLoss, bar.open.max(stop)));
                }
            }
            if let Some(tp) = risk.take_profit_pct {
                let target = entry * (1.0 - tp);
                if bar.low <= target {
                    return Some((ExitReason::TakeProfit, bar.open.min(target)));
                }
            }
        }
    }
    None
}

/// Mutable pieces of one run.
struct Run<'a> {
    symbol: &'a str,
    config: &'a EngineConfig,
    cost: CostModel,
    state: EngineState,
    trades: Vec<Trade>,
}

impl Run<'_> {
    fn open(
        &mut self,
        index: usize,
        bar: &Bar,
        side: Side,
        position_size: f64,
    ) -> Result<(), SimulationError> {
        let fill_side = match side {
            Side::Long => FillSide::Buy,
            Side::Short => FillSide::Sell,
        };
        let fill = self.cost.fill_price(bar.close, fill_side);
        let cash = self.state.cash;

        let size = match self.config.sizing {
            SizingRule::CashFraction(f) => {
                let budget = cash * f * position_size;
                (budget / (fill * (1.0 + self.cost.commission_rate))).floor()
            }
            SizingRule::FixedUnits(n) => n,
        };
        let commission = self.cost.commission(fill, size);
        if size.is_nan() || size <= 0.0 {
            return Err(SimulationError::InsufficientCash {
                time: bar.time,
                required: fill * (1.0 + self.cost.commission_rate),
                available: cash,
            });
        }

        let new_cash = match side {
            Side::Long => cash - size * fill - commission,
            Side::Short => cash + size * fill - commission,
        };
        if new_cash < 0.0 {
            return Err(SimulationError::InsufficientCash {
                time: bar.time,
                required: cash - new_cash,
                available: cash,
            });
        }

        self.state.cash = new_cash;
        self.state.position = Some(Position {
            symbol: self.symbol.to_string(),
            side,
            entry_time: bar.time,
            entry_price: fill,
            size,
            entry_bar: index,
            entry_commission: commission,
        });
        Ok(())
    }

    fn close(
        &mut self,
        index: usize,
        bar: &Bar,
        raw_price: f64,
        reason: ExitReason,
    ) -> Result<(), SimulationError> {
        let Some(pos) = self.state.position.take() else {
            return Ok(());
        };
        let fill_side = match pos.side {
            Side::Long => FillSide::Sell,
            Side::Short => FillSide::Buy,
        };
        let fill = self.cost.fill_price(raw_price, fill_side);
        let commission = self.cost.commission(fill, pos.size);
        let cash = self.state.cash;
        let new_cash = match pos.side {
            Side::Long => cash + pos.size * fill - commission,
            Side::Short => cash - pos.size * fill - commission,
        };
        if new_cash < 0.0 {
            return Err(SimulationError::InsufficientCash {
                time: bar.time,
                required: cash - new_cash,
                available: cash,
            });
        }
        self.state.cash = new_cash;

        let pnl = pos.unrealized_pnl(fill) - pos.entry_commission - commission;
        self.trades.push(Trade {
            side: pos.side,
            entry_time: pos.entry_time,
            entry_price: pos.entry_price,
            exit_time: bar.time,
            exit_price: fill,
            exit_reason: reason,
            size: pos.size,
            pnl,
            commission: pos.entry_commission + commission,
            bars_held: index - pos.entry_bar,
        });
        Ok(())
    }
}
