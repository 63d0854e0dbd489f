//! End-to-end run: validate, compute the band, align, evaluate, simulate, measure.
//!
//! An [`Engine`] holds nothing but its configuration. Every run starts from a
//! fresh account and borrows no state from earlier runs, so independent runs
//! may execute on separate threads.

use std::mem;

use tracing::{info, warn};

use super::account::{AccountState, EquityPoint};
use super::aligner::build_timeline;
use super::backtest::{SignalRow, evaluate_timeline, simulate};
use super::config::EngineConfig;
use super::error::EngineError;
use super::indicator::median_band::calculate_median_band;
use super::metrics::Metrics;
use super::ohlcv::Series;
use super::position::Trade;
use super::resample::resample;
use super::timeframe::Timeframe;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub timeline: Vec<SignalRow>,
    pub ledger: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub metrics: Metrics,
    /// Final account state. Its ledger and equity curve are moved into the
    /// fields above and left empty here.
    pub account: AccountState,
}

#[derive(Debug, Clone)]
pub struct Engine {
    config: EngineConfig,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Engine { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run on a base series and a separately loaded reference series.
    pub fn run(&self, base: Series, reference: Series) -> Result<BacktestResult, EngineError> {
        self.check_timeframe(&base, "base_timeframe", self.config.base_timeframe)?;
        self.check_timeframe(&reference, "reference_timeframe", self.config.reference_timeframe)?;
        let base = base.validate(self.config.duplicates)?;
        let reference = reference.validate(self.config.duplicates)?;
        self.execute(&base, &reference)
    }

    /// Run with the reference series built by resampling the base series.
    pub fn run_resampled(&self, base: Series) -> Result<BacktestResult, EngineError> {
        self.check_timeframe(&base, "base_timeframe", self.config.base_timeframe)?;
        let base = base.validate(self.config.duplicates)?;
        let reference = resample(&base, self.config.reference_timeframe)?;
        self.execute(&base, &reference)
    }

    fn check_timeframe(
        &self,
        series: &Series,
        key: &str,
        expected: Timeframe,
    ) -> Result<(), EngineError> {
        if series.timeframe != expected {
            return Err(EngineError::invalid(
                "data",
                key,
                format!(
                    "series '{}' is {} but {} is configured",
                    series.label, series.timeframe, expected
                ),
            ));
        }
        Ok(())
    }

    fn execute(&self, base: &Series, reference: &Series) -> Result<BacktestResult, EngineError> {
        let config = &self.config;
        info!(
            base = %base.label,
            reference = %reference.label,
            base_rows = base.len(),
            reference_rows = reference.len(),
            band = %config.band,
            "starting backtest"
        );

        let bands = calculate_median_band(reference, &config.band);
        let rows = build_timeline(base, reference, &bands)?;
        let timeline = evaluate_timeline(rows, &config.signal);

        let ready_rows = timeline
            .iter()
            .filter(|r| r.evaluation.levels.is_some())
            .count();
        if !timeline.is_empty() && ready_rows == 0 {
            warn!(
                rows = timeline.len(),
                window = config.band.window,
                "no row has a ready band, reference series too short for the window"
            );
        }

        let mut account = simulate(&timeline, &config.backtest());
        let metrics = Metrics::compute(
            &account,
            config.base_timeframe.periods_per_year(),
            config.risk_free_rate,
        );

        info!(
            rows = timeline.len(),
            ready_rows,
            trades = account.ledger.len(),
            rejected = account.rejected_sizings,
            final_equity = account.final_equity(),
            total_return = metrics.total_return,
            "backtest finished"
        );

        let ledger = mem::take(&mut account.ledger);
        let equity_curve = mem::take(&mut account.equity_curve);
        Ok(BacktestResult {
            timeline,
            ledger,
            equity_curve,
            metrics,
            account,
        })
    }
}
