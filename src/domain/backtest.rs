//! Sequential backtest simulator over the signal timeline.
//!
//! Rows are processed strictly in timestamp order. Each row first refreshes
//! the stop-loss and take-profit of open books from the row's band, then
//! resolves exits, then entries, then records equity at the close.

use tracing::debug;

use super::account::AccountState;
use super::aligner::AlignedRow;
use super::execution::{ExecutionConfig, calculate_fee, detect_exit, entry_fill, exit_fill};
use super::position::{Direction, ExitReason, Position};
use super::signal::{Evaluation, Signal, SignalConfig, evaluate};
use super::sizing::{SizingConfig, SizingOutcome};

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    pub sizing: SizingConfig,
    pub execution: ExecutionConfig,
    /// Close any open book at the last row's close.
    pub close_at_end: bool,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            initial_capital: 10_000.0,
            sizing: SizingConfig::default(),
            execution: ExecutionConfig::default(),
            close_at_end: true,
        }
    }
}

/// One timeline row with its evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalRow {
    pub row: AlignedRow,
    pub evaluation: Evaluation,
}

impl SignalRow {
    fn entry_requested(&self, direction: Direction) -> bool {
        match direction {
            Direction::Long => self.evaluation.signals.long == Signal::EnterLong,
            Direction::Short => self.evaluation.signals.short == Signal::EnterShort,
        }
    }

    fn exit_requested(&self, direction: Direction) -> bool {
        match direction {
            Direction::Long => self.evaluation.signals.long == Signal::ExitLong,
            Direction::Short => self.evaluation.signals.short == Signal::ExitShort,
        }
    }

    /// Stop-loss and take-profit for `direction` on this row, if the band is ready.
    fn levels_for(&self, direction: Direction) -> Option<(f64, f64)> {
        self.evaluation.levels.map(|l| match direction {
            Direction::Long => (l.stop_loss_long, l.take_profit_long),
            Direction::Short => (l.stop_loss_short, l.take_profit_short),
        })
    }
}

/// Evaluate every aligned row.
pub fn evaluate_timeline(rows: Vec<AlignedRow>, config: &SignalConfig) -> Vec<SignalRow> {
    rows.into_iter()
        .map(|row| {
            let evaluation = evaluate(&row.bar, row.ready_band(), config);
            SignalRow { row, evaluation }
        })
        .collect()
}

const BOOKS: [Direction; 2] = [Direction::Long, Direction::Short];

/// Run the simulation with a fresh account.
pub fn simulate(timeline: &[SignalRow], config: &BacktestConfig) -> AccountState {
    let mut account = AccountState::new(config.initial_capital);

    for row in timeline {
        let mut closed_this_row = [false; 2];

        for (slot, &direction) in BOOKS.iter().enumerate() {
            let levels = row.levels_for(direction);
            let Some(position) = account.book_mut(direction) else {
                continue;
            };
            if let Some((stop_loss, take_profit)) = levels {
                position.stop_loss = stop_loss;
                position.take_profit = take_profit;
            }
            let Some((reason, market)) =
                detect_exit(position, &row.row.bar, row.exit_requested(direction))
            else {
                continue;
            };
            close_book(&mut account, direction, market, row, reason, &config.execution);
            closed_this_row[slot] = true;
        }

        for (slot, &direction) in BOOKS.iter().enumerate() {
            if closed_this_row[slot]
                || account.is_open(direction)
                || !row.entry_requested(direction)
            {
                continue;
            }
            if direction == Direction::Short && !config.sizing.allow_short {
                continue;
            }
            if !config.sizing.independent_books && account.is_open(direction.opposite()) {
                continue;
            }
            open_book(&mut account, direction, row, config);
        }

        let equity = account.equity(row.row.bar.close);
        account.record_equity(row.row.timestamp, equity);
    }

    if let Some(last) = timeline.last().filter(|_| config.close_at_end) {
        settle_at_end(&mut account, last, &config.execution);
    }

    account
}

/// Close every open book at the last row and restate that row's equity.
fn settle_at_end(account: &mut AccountState, last: &SignalRow, execution: &ExecutionConfig) {
    let mut closed_any = false;
    for direction in BOOKS {
        if account.is_open(direction) {
            let market = side_close(direction, last, true);
            close_book(account, direction, market, last, ExitReason::EndOfData, execution);
            closed_any = true;
        }
    }
    if closed_any {
        let equity = account.equity(last.row.bar.close);
        if let Some(point) = account.equity_curve.last_mut() {
            point.equity = equity;
        }
    }
}

/// Close price seen by the book on the way in (`exiting == false`) or out.
fn side_close(direction: Direction, row: &SignalRow, exiting: bool) -> f64 {
    let bar = &row.row.bar;
    match (direction, exiting) {
        (Direction::Long, false) | (Direction::Short, true) => bar.buy_close(),
        (Direction::Long, true) | (Direction::Short, false) => bar.sell_close(),
    }
}

fn close_book(
    account: &mut AccountState,
    direction: Direction,
    market_price: f64,
    row: &SignalRow,
    reason: ExitReason,
    execution: &ExecutionConfig,
) {
    let Some(quantity) = account.book(direction).map(|p| p.quantity) else {
        return;
    };
    let fill = exit_fill(direction, market_price, execution.slippage_pct);
    let fee = calculate_fee(fill * quantity, execution);
    if let Some(trade) = account.close(direction, fill, row.row.timestamp, fee, reason) {
        debug!(
            %direction,
            ?reason,
            exit_price = trade.exit_price,
            quantity = trade.quantity,
            pnl = trade.pnl,
            at = %trade.exit_time,
            "closed position"
        );
    }
}

fn open_book(
    account: &mut AccountState,
    direction: Direction,
    row: &SignalRow,
    config: &BacktestConfig,
) {
    let Some((stop_loss, take_profit)) = row.levels_for(direction) else {
        return;
    };
    let execution = &config.execution;
    let fill = entry_fill(direction, side_close(direction, row, false), execution.slippage_pct);
    match config.sizing.size(account.cash, fill, stop_loss, direction, execution.fee_rate) {
        SizingOutcome::Sized { quantity, .. } => {
            let entry_fee = calculate_fee(fill * quantity, execution);
            let position = Position {
                direction,
                quantity,
                entry_price: fill,
                entry_time: row.row.timestamp,
                entry_fee,
                stop_loss,
                take_profit,
            };
            if account.open(position) {
                debug!(
                    %direction,
                    entry_price = fill,
                    quantity,
                    stop_loss,
                    take_profit,
                    at = %row.row.timestamp,
                    "opened position"
                );
            }
        }
        SizingOutcome::Rejected(reason) => {
            account.record_rejection();
            debug!(
                %direction,
                %reason,
                entry_price = fill,
                stop_loss,
                at = %row.row.timestamp,
                "sizing rejected"
            );
        }
    }
}
