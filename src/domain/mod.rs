//! Core domain types and logic.

pub mod ohlcv;
pub mod timeframe;
pub mod resample;
pub mod aligner;
pub mod indicator;
pub mod signal;
pub mod sizing;
pub mod position;
pub mod execution;
pub mod account;
pub mod backtest;
pub mod metrics;
pub mod config;
pub mod engine;
pub mod error;
