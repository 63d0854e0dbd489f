//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::config::EngineConfig;
use crate::domain::engine::{BacktestResult, Engine};
use crate::domain::error::EngineError;
use crate::domain::position::{ExitReason, Trade};
use crate::ports::data_port::DataPort;

#[derive(Parser, Debug)]
#[command(name = "medianband", about = "Multi-timeframe median band backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// CSV of base timeframe bars
        #[arg(short, long)]
        base: PathBuf,
        /// CSV of reference timeframe bars
        #[arg(short, long, required_unless_present = "resample", conflicts_with = "resample")]
        reference: Option<PathBuf>,
        /// Build the reference series by resampling the base series
        #[arg(long)]
        resample: bool,
        /// Write the trade ledger to this CSV file
        #[arg(short, long)]
        trades: Option<PathBuf>,
    },
    /// Validate an engine configuration
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            base,
            reference,
            resample,
            trades,
        } => run_backtest(&config, &base, reference.as_deref(), resample, trades.as_deref()),
        Command::Validate { config } => run_validate(&config),
    }
}

fn fail(err: &EngineError) -> ExitCode {
    eprintln!("error: {err}");
    err.into()
}

pub fn load_config(path: &Path) -> Result<EngineConfig, EngineError> {
    let adapter = FileConfigAdapter::from_file(path)?;
    EngineConfig::from_port(&adapter)
}

/// Load series through `data` and run the engine.
///
/// Without a reference label the reference series is resampled from the base.
pub fn run_pipeline(
    data: &dyn DataPort,
    base: &str,
    reference: Option<&str>,
    config: &EngineConfig,
) -> Result<BacktestResult, EngineError> {
    let engine = Engine::new(config.clone())?;
    let base_series = data.load_series(base, config.base_timeframe)?;
    info!(
        series = %base_series.label,
        bars = base_series.len(),
        timeframe = %config.base_timeframe,
        "loaded base series"
    );

    match reference {
        Some(label) => {
            let reference_series = data.load_series(label, config.reference_timeframe)?;
            info!(
                series = %reference_series.label,
                bars = reference_series.len(),
                timeframe = %config.reference_timeframe,
                "loaded reference series"
            );
            engine.run(base_series, reference_series)
        }
        None => {
            info!(timeframe = %config.reference_timeframe, "resampling base series for reference");
            engine.run_resampled(base_series)
        }
    }
}

fn run_backtest(
    config_path: &Path,
    base_path: &Path,
    reference_path: Option<&Path>,
    resample: bool,
    trades_path: Option<&Path>,
) -> ExitCode {
    // Stage 1: Load and validate config
    info!(path = %config_path.display(), "loading config");
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };

    // Stage 2: Load data and run
    let data = CsvAdapter::new(PathBuf::new());
    let base_label = base_path.to_string_lossy();
    let reference_label = reference_path
        .filter(|_| !resample)
        .map(|p| p.to_string_lossy().into_owned());
    let result = match run_pipeline(&data, &base_label, reference_label.as_deref(), &config) {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };

    // Stage 3: Report
    print_summary(&result);
    if let Some(path) = trades_path {
        if let Err(e) = write_trades(path, &result.ledger) {
            return fail(&e);
        }
        info!(path = %path.display(), trades = result.ledger.len(), "wrote trade ledger");
    }
    ExitCode::SUCCESS
}

fn run_validate(config_path: &Path) -> ExitCode {
    info!(path = %config_path.display(), "validating config");
    match load_config(config_path) {
        Ok(config) => {
            println!("base timeframe:      {}", config.base_timeframe);
            println!("reference timeframe: {}", config.reference_timeframe);
            println!("band:                {}", config.band);
            println!(
                "risk ratio:          [{}, {}] ({:?}, {:?})",
                config.signal.risk_ratio_min,
                config.signal.risk_ratio_max,
                config.signal.risk_ratio_mode,
                config.signal.price_source
            );
            println!("config OK");
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

pub fn format_summary(result: &BacktestResult) -> String {
    let mut out = String::new();
    for (name, value) in result.metrics.summary() {
        out.push_str(&format!("{name:<26} {value:>16.6}\n"));
    }
    out
}

fn print_summary(result: &BacktestResult) {
    print!("{}", format_summary(result));
}

fn exit_reason_label(reason: ExitReason) -> &'static str {
    match reason {
        ExitReason::Signal => "signal",
        ExitReason::StopLoss => "stop_loss",
        ExitReason::TakeProfit => "take_profit",
        ExitReason::EndOfData => "end_of_data",
    }
}

pub fn write_trades(path: &Path, ledger: &[Trade]) -> Result<(), EngineError> {
    let to_io = |e: csv::Error| EngineError::Io(std::io::Error::other(e));
    let mut wtr = csv::Writer::from_path(path).map_err(to_io)?;
    wtr.write_record([
        "direction",
        "entry_time",
        "exit_time",
        "quantity",
        "entry_price",
        "exit_price",
        "fee_paid",
        "pnl",
        "exit_reason",
    ])
    .map_err(to_io)?;
    for trade in ledger {
        wtr.write_record([
            trade.direction.to_string(),
            trade.entry_time.format("%Y-%m-%d %H:%M:%S").to_string(),
            trade.exit_time.format("%Y-%m-%d %H:%M:%S").to_string(),
            trade.quantity.to_string(),
            trade.entry_price.to_string(),
            trade.exit_price.to_string(),
            trade.fee_paid.to_string(),
            trade.pnl.to_string(),
            exit_reason_label(trade.exit_reason).to_string(),
        ])
        .map_err(to_io)?;
    }
    wtr.flush()?;
    Ok(())
}
