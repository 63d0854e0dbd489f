//! Cash, open books, ledger and equity curve for one backtest run.

use chrono::NaiveDateTime;

use super::position::{Direction, ExitReason, Position, Trade};

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub timestamp: NaiveDateTime,
    pub equity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AccountState {
    pub cash: f64,
    pub initial_capital: f64,
    pub long: Option<Position>,
    pub short: Option<Position>,
    pub ledger: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub rejected_sizings: usize,
}

impl AccountState {
    pub fn new(initial_capital: f64) -> Self {
        AccountState {
            cash: initial_capital,
            initial_capital,
            long: None,
            short: None,
            ledger: Vec::new(),
            equity_curve: Vec::new(),
            rejected_sizings: 0,
        }
    }

    pub fn book(&self, direction: Direction) -> Option<&Position> {
        match direction {
            Direction::Long => self.long.as_ref(),
            Direction::Short => self.short.as_ref(),
        }
    }

    pub fn book_mut(&mut self, direction: Direction) -> Option<&mut Position> {
        match direction {
            Direction::Long => self.long.as_mut(),
            Direction::Short => self.short.as_mut(),
        }
    }

    pub fn is_open(&self, direction: Direction) -> bool {
        self.book(direction).is_some()
    }

    /// Open a position, debiting notional plus entry fee.
    ///
    /// Returns `false` and leaves the account untouched when the book is
    /// already open.
    pub fn open(&mut self, position: Position) -> bool {
        let slot = match position.direction {
            Direction::Long => &mut self.long,
            Direction::Short => &mut self.short,
        };
        if slot.is_some() {
            return false;
        }
        self.cash -= position.entry_notional() + position.entry_fee;
        *slot = Some(position);
        true
    }

    /// Close the book at `exit_price`, crediting proceeds minus the exit fee
    /// and appending the trade to the ledger.
    pub fn close(
        &mut self,
        direction: Direction,
        exit_price: f64,
        exit_time: NaiveDateTime,
        exit_fee: f64,
        reason: ExitReason,
    ) -> Option<&Trade> {
        let position = match direction {
            Direction::Long => self.long.take(),
            Direction::Short => self.short.take(),
        }?;
        self.cash += position.market_value(exit_price) - exit_fee;
        self.ledger
            .push(Trade::close(&position, exit_price, exit_time, exit_fee, reason));
        self.ledger.last()
    }

    /// Cash plus mark-to-market value of open books at `price`.
    pub fn equity(&self, price: f64) -> f64 {
        let open_value: f64 = [self.long.as_ref(), self.short.as_ref()]
            .into_iter()
            .flatten()
            .map(|p| p.market_value(price))
            .sum();
        self.cash + open_value
    }

    pub fn record_equity(&mut self, timestamp: NaiveDateTime, equity: f64) {
        self.equity_curve.push(EquityPoint { timestamp, equity });
    }

    pub fn record_rejection(&mut self) {
        self.rejected_sizings += 1;
    }

    pub fn final_equity(&self) -> f64 {
        self.equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(self.initial_capital)
    }
}
