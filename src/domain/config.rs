//! Engine configuration: construction from a [`ConfigPort`] and validation.
//!
//! All validation happens here, before any row is processed.

use std::str::FromStr;

use super::backtest::BacktestConfig;
use super::error::EngineError;
use super::execution::ExecutionConfig;
use super::indicator::BandConfig;
use super::ohlcv::DuplicatePolicy;
use super::signal::{PriceSource, RiskRatioMode, SignalConfig};
use super::sizing::SizingConfig;
use super::timeframe::Timeframe;
use crate::ports::config_port::ConfigPort;

const MAX_PRECISION: u32 = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub base_timeframe: Timeframe,
    pub reference_timeframe: Timeframe,
    pub duplicates: DuplicatePolicy,
    pub band: BandConfig,
    pub signal: SignalConfig,
    pub sizing: SizingConfig,
    pub execution: ExecutionConfig,
    pub initial_capital: f64,
    pub close_at_end: bool,
    pub risk_free_rate: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            base_timeframe: Timeframe::Hour(1),
            reference_timeframe: Timeframe::Day,
            duplicates: DuplicatePolicy::Reject,
            band: BandConfig::default(),
            signal: SignalConfig::default(),
            sizing: SizingConfig::default(),
            execution: ExecutionConfig::default(),
            initial_capital: 10_000.0,
            close_at_end: true,
            risk_free_rate: 0.0,
        }
    }
}

impl FromStr for DuplicatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(DuplicatePolicy::Reject),
            "keep_last" | "keep-last" => Ok(DuplicatePolicy::KeepLast),
            other => Err(format!("unknown duplicate policy '{other}'")),
        }
    }
}

impl FromStr for PriceSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "close" => Ok(PriceSource::Close),
            "high_low" | "highlow" => Ok(PriceSource::HighLow),
            "bid_ask" | "bidask" => Ok(PriceSource::BidAsk),
            other => Err(format!("unknown price source '{other}'")),
        }
    }
}

impl FromStr for RiskRatioMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "band_position" | "band" => Ok(RiskRatioMode::BandPosition),
            "median_over_price" | "median" => Ok(RiskRatioMode::MedianOverPrice),
            other => Err(format!("unknown risk ratio mode '{other}'")),
        }
    }
}

fn required<T>(port: &dyn ConfigPort, section: &str, key: &str) -> Result<T, EngineError>
where
    T: FromStr,
    T::Err: ToString,
{
    let raw = port
        .get_string(section, key)
        .ok_or_else(|| EngineError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        })?;
    raw.parse()
        .map_err(|e: T::Err| EngineError::invalid(section, key, e.to_string()))
}

fn optional<T>(
    port: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: T,
) -> Result<T, EngineError>
where
    T: FromStr,
    T::Err: ToString,
{
    match port.get_string(section, key) {
        Some(raw) => raw
            .parse()
            .map_err(|e: T::Err| EngineError::invalid(section, key, e.to_string())),
        None => Ok(default),
    }
}

fn number(
    port: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, EngineError> {
    Ok(port.get_double(section, key)?.unwrap_or(default))
}

fn flag(
    port: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: bool,
) -> Result<bool, EngineError> {
    Ok(port.get_bool(section, key)?.unwrap_or(default))
}

fn count<T>(port: &dyn ConfigPort, section: &str, key: &str, default: T) -> Result<T, EngineError>
where
    T: TryFrom<i64>,
{
    let Some(value) = port.get_int(section, key)? else {
        return Ok(default);
    };
    if value < 0 {
        return Err(EngineError::invalid(section, key, format!("{key} must be non-negative")));
    }
    T::try_from(value)
        .map_err(|_| EngineError::invalid(section, key, format!("{key} is out of range")))
}

fn notional_cap(port: &dyn ConfigPort) -> Result<Option<f64>, EngineError> {
    match port.get_string("sizing", "max_notional_fraction") {
        None => Ok(SizingConfig::default().max_notional_fraction),
        Some(raw) if raw.trim().eq_ignore_ascii_case("none") => Ok(None),
        Some(raw) => raw.trim().parse::<f64>().map(Some).map_err(|_| {
            EngineError::invalid(
                "sizing",
                "max_notional_fraction",
                format!("expected a number or 'none', got '{raw}'"),
            )
        }),
    }
}

impl EngineConfig {
    /// Build from `[data]`, `[band]`, `[signal]`, `[sizing]` and `[backtest]`.
    ///
    /// Both timeframes are required; every other key falls back to its default
    /// when absent. A value that does not parse is `ConfigInvalid`, and the
    /// result is validated before it is returned.
    pub fn from_port(port: &dyn ConfigPort) -> Result<Self, EngineError> {
        let defaults = EngineConfig::default();

        let band = BandConfig {
            window: count(port, "band", "window", defaults.band.window)?,
            band_width_factor: number(
                port,
                "band",
                "band_width_factor",
                defaults.band.band_width_factor,
            )?,
            precision: count(port, "band", "precision", defaults.band.precision)?,
            round_median: flag(port, "band", "round_median", defaults.band.round_median)?,
        };

        let fallback = &defaults.signal;
        let signal = SignalConfig {
            stop_loss_pct: number(port, "signal", "stop_loss_pct", fallback.stop_loss_pct)?,
            risk_ratio_min: number(port, "signal", "risk_ratio_min", fallback.risk_ratio_min)?,
            risk_ratio_max: number(port, "signal", "risk_ratio_max", fallback.risk_ratio_max)?,
            price_source: optional(port, "signal", "price_source", fallback.price_source)?,
            risk_ratio_mode: optional(port, "signal", "risk_ratio_mode", fallback.risk_ratio_mode)?,
            precision: band.precision,
        };

        let sizing = SizingConfig {
            risk_fraction: number(port, "sizing", "risk_fraction", defaults.sizing.risk_fraction)?,
            max_notional_fraction: notional_cap(port)?,
            allow_short: flag(port, "sizing", "allow_short", defaults.sizing.allow_short)?,
            independent_books: flag(
                port,
                "sizing",
                "independent_books",
                defaults.sizing.independent_books,
            )?,
        };

        let execution = ExecutionConfig {
            fee_rate: number(port, "backtest", "fee_rate", defaults.execution.fee_rate)?,
            slippage_pct: number(
                port,
                "backtest",
                "slippage_pct",
                defaults.execution.slippage_pct,
            )?,
        };

        let config = EngineConfig {
            base_timeframe: required(port, "data", "base_timeframe")?,
            reference_timeframe: required(port, "data", "reference_timeframe")?,
            duplicates: optional(port, "data", "duplicates", defaults.duplicates)?,
            band,
            signal,
            sizing,
            execution,
            initial_capital: number(port, "backtest", "initial_capital", defaults.initial_capital)?,
            close_at_end: flag(port, "backtest", "close_at_end", defaults.close_at_end)?,
            risk_free_rate: number(port, "backtest", "risk_free_rate", defaults.risk_free_rate)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.band.window < 2 {
            return Err(EngineError::invalid("band", "window", "window must be at least 2"));
        }
        let k = self.band.band_width_factor;
        if !k.is_finite() || k < 0.0 {
            return Err(EngineError::invalid(
                "band",
                "band_width_factor",
                "band_width_factor must be finite and non-negative",
            ));
        }
        if self.band.precision > MAX_PRECISION {
            return Err(EngineError::invalid(
                "band",
                "precision",
                format!("precision must be at most {MAX_PRECISION}"),
            ));
        }
        if self.signal.precision != self.band.precision {
            return Err(EngineError::invalid(
                "band",
                "precision",
                format!(
                    "stop-loss precision {} differs from band precision {}",
                    self.signal.precision, self.band.precision
                ),
            ));
        }
        let stop = self.signal.stop_loss_pct;
        if !(0.0..=1.0).contains(&stop) {
            return Err(EngineError::invalid(
                "signal",
                "stop_loss_pct",
                "stop_loss_pct must be between 0 and 1",
            ));
        }
        if !self.signal.risk_ratio_min.is_finite()
            || !self.signal.risk_ratio_max.is_finite()
            || self.signal.risk_ratio_min > self.signal.risk_ratio_max
        {
            return Err(EngineError::invalid(
                "signal",
                "risk_ratio_min",
                "risk_ratio_min must not exceed risk_ratio_max",
            ));
        }
        let risk = self.sizing.risk_fraction;
        if !(risk > 0.0 && risk <= 1.0) {
            return Err(EngineError::invalid(
                "sizing",
                "risk_fraction",
                "risk_fraction must be in (0, 1]",
            ));
        }
        if self
            .sizing
            .max_notional_fraction
            .is_some_and(|cap| !(cap.is_finite() && cap > 0.0))
        {
            return Err(EngineError::invalid(
                "sizing",
                "max_notional_fraction",
                "max_notional_fraction must be positive",
            ));
        }
        if !(self.execution.fee_rate.is_finite() && self.execution.fee_rate >= 0.0) {
            return Err(EngineError::invalid(
                "backtest",
                "fee_rate",
                "fee_rate must be non-negative",
            ));
        }
        if !(self.execution.slippage_pct.is_finite() && self.execution.slippage_pct >= 0.0) {
            return Err(EngineError::invalid(
                "backtest",
                "slippage_pct",
                "slippage_pct must be non-negative",
            ));
        }
        if !(self.initial_capital.is_finite() && self.initial_capital > 0.0) {
            return Err(EngineError::invalid(
                "backtest",
                "initial_capital",
                "initial_capital must be positive",
            ));
        }
        if !(0.0..1.0).contains(&self.risk_free_rate) {
            return Err(EngineError::invalid(
                "backtest",
                "risk_free_rate",
                "risk_free_rate must be between 0 and 1",
            ));
        }
        for (key, tf) in [
            ("base_timeframe", self.base_timeframe),
            ("reference_timeframe", self.reference_timeframe),
        ] {
            if !tf.is_day_aligned() {
                return Err(EngineError::invalid(
                    "data",
                    key,
                    format!("{tf} does not divide a day into whole buckets"),
                ));
            }
        }
        if !self.reference_timeframe.is_coarser_or_equal(&self.base_timeframe) {
            return Err(EngineError::invalid(
                "data",
                "reference_timeframe",
                format!(
                    "reference timeframe {} is finer than base timeframe {}",
                    self.reference_timeframe, self.base_timeframe
                ),
            ));
        }
        if !self.reference_timeframe.is_whole_multiple_of(&self.base_timeframe) {
            return Err(EngineError::invalid(
                "data",
                "reference_timeframe",
                format!(
                    "reference timeframe {} is not a whole multiple of base timeframe {}",
                    self.reference_timeframe, self.base_timeframe
                ),
            ));
        }
        Ok(())
    }

    pub fn backtest(&self) -> BacktestConfig {
        BacktestConfig {
            initial_capital: self.initial_capital,
            sizing: self.sizing.clone(),
            execution: self.execution.clone(),
            close_at_end: self.close_at_end,
        }
    }
}
