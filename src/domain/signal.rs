//! Entry/exit decision function for the long and short books.
//!
//! Evaluation is a pure function of one row: the base bar and the reference
//! band broadcast onto it. Stop-loss and take-profit levels are derived from
//! the band of the same row, so they move with the band while a position is
//! open.

use super::indicator::{BandState, round_to};
use super::ohlcv::Bar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Signal {
    #[default]
    None,
    EnterLong,
    EnterShort,
    ExitLong,
    ExitShort,
}

/// Signals for the two books on one row; each book gets at most one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RowSignals {
    pub long: Signal,
    pub short: Signal,
}

impl RowSignals {
    pub fn is_empty(&self) -> bool {
        self.long == Signal::None && self.short == Signal::None
    }
}

/// Which prices of the bar feed the comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PriceSource {
    /// Every comparison uses the close.
    #[default]
    Close,
    /// Entries and exits probe the bar's high and low.
    HighLow,
    /// Long book on the ask close, short book on the bid close.
    BidAsk,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RiskRatioMode {
    /// Long: (upper - price) / (upper - median). Short: (price - lower) / (median - lower).
    #[default]
    BandPosition,
    /// median / price on both sides.
    MedianOverPrice,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalConfig {
    pub stop_loss_pct: f64,
    pub risk_ratio_min: f64,
    pub risk_ratio_max: f64,
    pub price_source: PriceSource,
    pub risk_ratio_mode: RiskRatioMode,
    /// Decimal places for stop-loss levels; must equal the band's precision.
    pub precision: u32,
}

impl Default for SignalConfig {
    fn default() -> Self {
        SignalConfig {
            stop_loss_pct: 0.30,
            risk_ratio_min: 0.98,
            risk_ratio_max: 1.0,
            price_source: PriceSource::Close,
            risk_ratio_mode: RiskRatioMode::BandPosition,
            precision: 5,
        }
    }
}

/// Stop-loss and take-profit levels for both books on one row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandLevels {
    pub stop_loss_long: f64,
    pub take_profit_long: f64,
    pub stop_loss_short: f64,
    pub take_profit_short: f64,
}

impl BandLevels {
    pub fn from_band(band: &BandState, stop_loss_pct: f64, precision: u32) -> Self {
        BandLevels {
            stop_loss_long: round_to(
                band.median - stop_loss_pct * (band.median - band.lower),
                precision,
            ),
            take_profit_long: band.upper,
            stop_loss_short: round_to(
                band.median + stop_loss_pct * (band.upper - band.median),
                precision,
            ),
            take_profit_short: band.lower,
        }
    }
}

/// Result of evaluating one row, kept for inspection alongside the signals.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Evaluation {
    pub signals: RowSignals,
    pub levels: Option<BandLevels>,
    pub risk_ratio_long: Option<f64>,
    pub risk_ratio_short: Option<f64>,
}

struct SidePrices {
    reference: f64,
    entry_probe: f64,
    stop_probe: f64,
    target_probe: f64,
}

fn long_prices(bar: &Bar, source: PriceSource) -> SidePrices {
    match source {
        PriceSource::Close => SidePrices {
            reference: bar.close,
            entry_probe: bar.close,
            stop_probe: bar.close,
            target_probe: bar.close,
        },
        PriceSource::HighLow => SidePrices {
            reference: bar.close,
            entry_probe: bar.high,
            stop_probe: bar.low,
            target_probe: bar.high,
        },
        PriceSource::BidAsk => {
            let ask = bar.buy_close();
            SidePrices {
                reference: ask,
                entry_probe: ask,
                stop_probe: ask,
                target_probe: ask,
            }
        }
    }
}

fn short_prices(bar: &Bar, source: PriceSource) -> SidePrices {
    match source {
        PriceSource::Close => SidePrices {
            reference: bar.close,
            entry_probe: bar.close,
            stop_probe: bar.close,
            target_probe: bar.close,
        },
        PriceSource::HighLow => SidePrices {
            reference: bar.close,
            entry_probe: bar.low,
            stop_probe: bar.high,
            target_probe: bar.low,
        },
        PriceSource::BidAsk => {
            let bid = bar.sell_close();
            SidePrices {
                reference: bid,
                entry_probe: bid,
                stop_probe: bid,
                target_probe: bid,
            }
        }
    }
}

fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 || !denominator.is_finite() || !numerator.is_finite() {
        return None;
    }
    let r = numerator / denominator;
    r.is_finite().then_some(r)
}

/// Risk ratio for one side; `None` whenever it is undefined.
pub fn risk_ratio_at(band: &BandState, price: f64, long: bool, mode: RiskRatioMode) -> Option<f64> {
    if band.median == 0.0 {
        return None;
    }
    match (mode, long) {
        (RiskRatioMode::BandPosition, true) => ratio(band.upper - price, band.upper - band.median),
        (RiskRatioMode::BandPosition, false) => ratio(price - band.lower, band.median - band.lower),
        (RiskRatioMode::MedianOverPrice, _) => ratio(band.median, price),
    }
}

fn within(r: Option<f64>, config: &SignalConfig) -> bool {
    r.is_some_and(|v| v >= config.risk_ratio_min && v <= config.risk_ratio_max)
}

/// Evaluate both books for one row.
///
/// Returns no signals when the band or its previous median is absent.
pub fn evaluate(bar: &Bar, band: Option<&BandState>, config: &SignalConfig) -> Evaluation {
    let Some(band) = band.filter(|b| b.is_ready()) else {
        return Evaluation::default();
    };

    let levels = BandLevels::from_band(band, config.stop_loss_pct, config.precision);
    let median = band.median;

    let lp = long_prices(bar, config.price_source);
    let risk_long = risk_ratio_at(band, lp.reference, true, config.risk_ratio_mode);
    let enter_long = band.is_rising() && lp.entry_probe > median && within(risk_long, config);
    let exit_long = !band.is_rising()
        || lp.stop_probe <= levels.stop_loss_long
        || lp.target_probe >= levels.take_profit_long;

    let sp = short_prices(bar, config.price_source);
    let risk_short = risk_ratio_at(band, sp.reference, false, config.risk_ratio_mode);
    let enter_short = band.is_falling() && sp.entry_probe < median && within(risk_short, config);
    let exit_short = !band.is_falling()
        || sp.stop_probe >= levels.stop_loss_short
        || sp.target_probe <= levels.take_profit_short;

    let long = if exit_long {
        Signal::ExitLong
    } else if enter_long {
        Signal::EnterLong
    } else {
        Signal::None
    };
    let short = if exit_short {
        Signal::ExitShort
    } else if enter_short {
        Signal::EnterShort
    } else {
        Signal::None
    };

    Evaluation {
        signals: RowSignals { long, short },
        levels: Some(levels),
        risk_ratio_long: risk_long,
        risk_ratio_short: risk_short,
    }
}
