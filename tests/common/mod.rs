#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use medianband::domain::config::EngineConfig;
use medianband::domain::error::EngineError;
pub use medianband::domain::ohlcv::{Bar, Series};
use medianband::domain::timeframe::Timeframe;
use medianband::ports::data_port::DataPort;
use std::collections::HashMap;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<Bar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, label: &str, bars: Vec<Bar>) -> Self {
        self.data.insert(label.to_string(), bars);
        self
    }

    pub fn with_error(mut self, label: &str, reason: &str) -> Self {
        self.errors.insert(label.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn load_series(&self, label: &str, timeframe: Timeframe) -> Result<Series, EngineError> {
        if let Some(reason) = self.errors.get(label) {
            return Err(EngineError::DataLoad {
                source_name: label.to_string(),
                reason: reason.clone(),
            });
        }
        let bars = self.data.get(label).cloned().unwrap_or_default();
        Ok(Series::new(label, timeframe, bars))
    }
}

pub fn t0() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

/// Bars with open = high = low = close, one `step` apart.
pub fn flat_bars(closes: &[f64], step: Duration) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| Bar::new(t0() + step * i as i32, c, c, c, c))
        .collect()
}

pub fn daily_series(label: &str, closes: &[f64]) -> Series {
    Series::new(label, Timeframe::Day, flat_bars(closes, Duration::days(1)))
}

pub fn hourly_series(label: &str, closes: &[f64]) -> Series {
    Series::new(label, Timeframe::Hour(1), flat_bars(closes, Duration::hours(1)))
}

/// 10 bars at 100, ten rising by 1, ten falling by 1.
pub fn flat_rise_fall() -> Vec<f64> {
    let mut closes = vec![100.0; 10];
    closes.extend((1..=10).map(|i| 100.0 + i as f64));
    closes.extend((1..=10).map(|i| 110.0 - i as f64));
    closes
}

/// Daily base and reference, W=5, k=2, stop 0.3, risk ratio in [0, 1].
pub fn scenario_config() -> EngineConfig {
    let mut config = EngineConfig {
        base_timeframe: Timeframe::Day,
        reference_timeframe: Timeframe::Day,
        ..EngineConfig::default()
    };
    config.band.window = 5;
    config.band.band_width_factor = 2.0;
    config.signal.stop_loss_pct = 0.3;
    config.signal.risk_ratio_min = 0.0;
    config.signal.risk_ratio_max = 1.0;
    config
}

pub const SCENARIO_INI: &str = r#"
[data]
base_timeframe = 1d
reference_timeframe = 1d

[band]
window = 5
band_width_factor = 2.0

[signal]
stop_loss_pct = 0.3
risk_ratio_min = 0.0
risk_ratio_max = 1.0

[sizing]
allow_short = false
"#;
