//! Fill simulation: fees, slippage and intrabar stop/target detection.

use super::ohlcv::Bar;
use super::position::{Direction, ExitReason, Position};

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionConfig {
    /// Fee as a fraction of notional, charged on entry and on exit.
    pub fee_rate: f64,
    /// Adverse slippage in percent of the market price.
    pub slippage_pct: f64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            fee_rate: 0.001,
            slippage_pct: 0.0,
        }
    }
}

/// fee_rate × notional.
pub fn calculate_fee(notional: f64, config: &ExecutionConfig) -> f64 {
    config.fee_rate * notional.abs()
}

/// Long entry (buy): market_price * (1 + slippage_pct / 100)
/// Short entry (sell): market_price * (1 - slippage_pct / 100)
pub fn entry_fill(direction: Direction, market_price: f64, slippage_pct: f64) -> f64 {
    market_price * (1.0 + direction.sign() * slippage_pct / 100.0)
}

/// Long exit (sell): market_price * (1 - slippage_pct / 100)
/// Short exit (buy to cover): market_price * (1 + slippage_pct / 100)
pub fn exit_fill(direction: Direction, market_price: f64, slippage_pct: f64) -> f64 {
    market_price * (1.0 - direction.sign() * slippage_pct / 100.0)
}

/// Market price at which a touched stop executes. A bar that opens beyond
/// the stop fills at the open.
pub fn stop_price(position: &Position, bar: &Bar) -> f64 {
    if position.is_long() {
        bar.open.min(position.stop_loss)
    } else {
        bar.open.max(position.stop_loss)
    }
}

/// Market price at which a touched target executes. A bar that opens beyond
/// the target fills at the open.
pub fn target_price(position: &Position, bar: &Bar) -> f64 {
    if position.is_long() {
        bar.open.max(position.take_profit)
    } else {
        bar.open.min(position.take_profit)
    }
}

/// First exit condition met on this bar, with its market price.
///
/// When the range touches both levels the stop is assumed to fill first.
/// A signal exit fills at the side's close.
pub fn detect_exit(position: &Position, bar: &Bar, signal_exit: bool) -> Option<(ExitReason, f64)> {
    if position.stop_touched(bar.high, bar.low) {
        return Some((ExitReason::StopLoss, stop_price(position, bar)));
    }
    if position.target_touched(bar.high, bar.low) {
        return Some((ExitReason::TakeProfit, target_price(position, bar)));
    }
    if signal_exit {
        let close = match position.direction {
            Direction::Long => bar.sell_close(),
            Direction::Short => bar.buy_close(),
        };
        return Some((ExitReason::Signal, close));
    }
    None
}
