//! Risk-budget position sizing.
//!
//! quantity = capital × risk_fraction / |entry - stop|, so that a stop-out
//! loses at most `risk_fraction` of capital before fees.

use super::position::Direction;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct SizingConfig {
    /// Fraction of capital lost if the stop is hit, in (0, 1].
    pub risk_fraction: f64,
    /// Upper bound on entry notional as a fraction of capital.
    pub max_notional_fraction: Option<f64>,
    pub allow_short: bool,
    /// Allow a short to be open while a long is open.
    pub independent_books: bool,
}

impl Default for SizingConfig {
    fn default() -> Self {
        SizingConfig {
            risk_fraction: 0.004,
            max_notional_fraction: Some(1.0),
            allow_short: true,
            independent_books: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    NoCapital,
    NonFinite,
    StopAtEntry,
    StopWrongSide,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RejectReason::NoCapital => "no capital available",
            RejectReason::NonFinite => "non-finite sizing input",
            RejectReason::StopAtEntry => "stop-loss equals entry price",
            RejectReason::StopWrongSide => "stop-loss on the wrong side of entry",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SizingOutcome {
    Sized {
        quantity: f64,
        max_loss_per_unit: f64,
    },
    Rejected(RejectReason),
}

impl SizingOutcome {
    pub fn quantity(&self) -> f64 {
        match self {
            SizingOutcome::Sized { quantity, .. } => *quantity,
            SizingOutcome::Rejected(_) => 0.0,
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, SizingOutcome::Rejected(_))
    }
}

/// Size one candidate trade from the risk budget alone.
pub fn size_position(
    capital: f64,
    risk_fraction: f64,
    entry_price: f64,
    stop_loss: f64,
    direction: Direction,
) -> SizingOutcome {
    let inputs = [capital, risk_fraction, entry_price, stop_loss];
    if !inputs.iter().all(|v| v.is_finite()) {
        return SizingOutcome::Rejected(RejectReason::NonFinite);
    }
    if capital <= 0.0 || risk_fraction <= 0.0 {
        return SizingOutcome::Rejected(RejectReason::NoCapital);
    }

    // positive when the stop sits below a long entry or above a short entry
    let signed_distance = (entry_price - stop_loss) * direction.sign();
    if signed_distance == 0.0 {
        return SizingOutcome::Rejected(RejectReason::StopAtEntry);
    }
    if signed_distance < 0.0 {
        return SizingOutcome::Rejected(RejectReason::StopWrongSide);
    }

    let max_loss_per_unit = (entry_price - stop_loss).abs();
    let quantity = capital * risk_fraction / max_loss_per_unit;
    if !quantity.is_finite() {
        return SizingOutcome::Rejected(RejectReason::NonFinite);
    }
    SizingOutcome::Sized {
        quantity,
        max_loss_per_unit,
    }
}

impl SizingConfig {
    /// Risk-budget size, capped so that notional plus the entry fee at
    /// `fee_rate` stays within `max_notional_fraction` of capital.
    pub fn size(
        &self,
        capital: f64,
        entry_price: f64,
        stop_loss: f64,
        direction: Direction,
        fee_rate: f64,
    ) -> SizingOutcome {
        let outcome = size_position(capital, self.risk_fraction, entry_price, stop_loss, direction);
        match (outcome, self.max_notional_fraction) {
            (
                SizingOutcome::Sized {
                    quantity,
                    max_loss_per_unit,
                },
                Some(fraction),
            ) if entry_price > 0.0 => {
                let cap = capital * fraction / (entry_price * (1.0 + fee_rate.max(0.0)));
                SizingOutcome::Sized {
                    quantity: quantity.min(cap),
                    max_loss_per_unit,
                }
            }
            (outcome, _) => outcome,
        }
    }
}
