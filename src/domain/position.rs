//! Open positions and closed trades.

use chrono::NaiveDateTime;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }

    pub fn opposite(&self) -> Direction {
        match self {
            Direction::Long => Direction::Short,
            Direction::Short => Direction::Long,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => write!(f, "long"),
            Direction::Short => write!(f, "short"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    Signal,
    StopLoss,
    TakeProfit,
    EndOfData,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub direction: Direction,
    /// Always positive; the side is carried by `direction`.
    pub quantity: f64,
    pub entry_price: f64,
    pub entry_time: NaiveDateTime,
    pub entry_fee: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
}

impl Position {
    pub fn is_long(&self) -> bool {
        self.direction == Direction::Long
    }

    pub fn entry_notional(&self) -> f64 {
        self.quantity * self.entry_price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.direction.sign() * self.quantity * (price - self.entry_price)
    }

    /// Value the position contributes to equity at `price`.
    ///
    /// Both sides escrow the entry notional at open, so the mark is the
    /// escrow plus the unrealized gain.
    pub fn market_value(&self, price: f64) -> f64 {
        self.entry_notional() + self.unrealized_pnl(price)
    }

    /// Stop touched anywhere inside a bar with the given range.
    pub fn stop_touched(&self, high: f64, low: f64) -> bool {
        if self.is_long() {
            low <= self.stop_loss
        } else {
            high >= self.stop_loss
        }
    }

    /// Target touched anywhere inside a bar with the given range.
    pub fn target_touched(&self, high: f64, low: f64) -> bool {
        if self.is_long() {
            high >= self.take_profit
        } else {
            low <= self.take_profit
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub direction: Direction,
    pub quantity: f64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub entry_time: NaiveDateTime,
    pub exit_time: NaiveDateTime,
    pub entry_fee: f64,
    pub exit_fee: f64,
    pub fee_paid: f64,
    pub pnl: f64,
    pub exit_reason: ExitReason,
}

impl Trade {
    /// Close `position` at `exit_price`, deriving pnl from prices and both fees.
    pub fn close(
        position: &Position,
        exit_price: f64,
        exit_time: NaiveDateTime,
        exit_fee: f64,
        exit_reason: ExitReason,
    ) -> Self {
        let gross =
            (exit_price - position.entry_price) * position.quantity * position.direction.sign();
        Trade {
            direction: position.direction,
            quantity: position.quantity,
            entry_price: position.entry_price,
            exit_price,
            entry_time: position.entry_time,
            exit_time,
            entry_fee: position.entry_fee,
            exit_fee,
            fee_paid: position.entry_fee + exit_fee,
            pnl: gross - position.entry_fee - exit_fee,
            exit_reason,
        }
    }

    pub fn return_pct(&self) -> f64 {
        let notional = self.quantity * self.entry_price;
        if notional > 0.0 { self.pnl / notional } else { 0.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn entry_time() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    fn sample_long_position() -> Position {
        Position {
            direction: Direction::Long,
            quantity: 100.0,
            entry_price: 50.0,
            entry_time: entry_time(),
            entry_fee: 0.0,
            stop_loss: 45.0,
            take_profit: 60.0,
        }
    }

    fn sample_short_position() -> Position {
        Position {
            direction: Direction::Short,
            quantity: 100.0,
            entry_price: 100.0,
            entry_time: entry_time(),
            entry_fee: 0.0,
            stop_loss: 110.0,
            take_profit: 80.0,
        }
    }

    #[test]
    fn direction_sign() {
        assert_eq!(Direction::Long.sign(), 1.0);
        assert_eq!(Direction::Short.sign(), -1.0);
        assert_eq!(Direction::Short.to_string(), "short");
    }

    #[test]
    fn unrealized_pnl_long_and_short() {
        assert!((sample_long_position().unrealized_pnl(55.0) - 500.0).abs() < f64::EPSILON);
        assert!((sample_long_position().unrealized_pnl(45.0) + 500.0).abs() < f64::EPSILON);
        assert!((sample_short_position().unrealized_pnl(90.0) - 1000.0).abs() < f64::EPSILON);
        assert!((sample_short_position().unrealized_pnl(110.0) + 1000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn market_value_includes_escrow() {
        assert!((sample_long_position().market_value(55.0) - 5500.0).abs() < f64::EPSILON);
        // short escrowed 10000 and gained 1000
        assert!((sample_short_position().market_value(90.0) - 11000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn stop_touched_uses_bar_range() {
        let long = sample_long_position();
        assert!(long.stop_touched(52.0, 45.0));
        assert!(long.stop_touched(52.0, 44.0));
        assert!(!long.stop_touched(52.0, 46.0));

        let short = sample_short_position();
        assert!(short.stop_touched(110.0, 100.0));
        assert!(!short.stop_touched(109.0, 100.0));
    }

    #[test]
    fn target_touched_uses_bar_range() {
        let long = sample_long_position();
        assert!(long.target_touched(60.0, 55.0));
        assert!(!long.target_touched(59.9, 55.0));

        let short = sample_short_position();
        assert!(short.target_touched(90.0, 80.0));
        assert!(!short.target_touched(90.0, 80.1));
    }

    #[test]
    fn trade_close_round_trip_with_fees() {
        let position = Position {
            direction: Direction::Long,
            quantity: 10.0,
            entry_price: 100.0,
            entry_time: entry_time(),
            entry_fee: 1.0,
            stop_loss: 95.0,
            take_profit: 120.0,
        };
        let trade = Trade::close(&position, 110.0, entry_time(), 1.1, ExitReason::Signal);
        assert!((trade.pnl - 97.9).abs() < 1e-9);
        assert!((trade.fee_paid - 2.1).abs() < 1e-12);
        assert!((trade.return_pct() - 0.0979).abs() < 1e-9);
    }

    #[test]
    fn trade_close_short() {
        let trade = Trade::close(
            &sample_short_position(),
            90.0,
            entry_time(),
            0.0,
            ExitReason::TakeProfit,
        );
        assert!((trade.pnl - 1000.0).abs() < f64::EPSILON);
        assert_eq!(trade.direction, Direction::Short);
        assert_eq!(trade.exit_reason, ExitReason::TakeProfit);
    }
}
