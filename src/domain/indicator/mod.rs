//! Band indicator types.
//!
//! - `BandConfig`: window, width factor and rounding for one band
//! - `BandState`: the band at a single coarse bar
//! - `BandPoint` / `BandSeries`: a time series of band states where warmup
//!   bars carry no value

pub mod median_band;
pub mod stats;

use chrono::NaiveDateTime;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct BandConfig {
    pub window: usize,
    pub band_width_factor: f64,
    /// Decimal places for band levels.
    pub precision: u32,
    /// Also round the median itself to `precision`.
    pub round_median: bool,
}

impl Default for BandConfig {
    fn default() -> Self {
        BandConfig {
            window: 6,
            band_width_factor: 1.5,
            precision: 5,
            round_median: false,
        }
    }
}

impl fmt::Display for BandConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MEDIAN_BAND({},{})", self.window, self.band_width_factor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandState {
    pub median: f64,
    /// Median one bar earlier; absent on the first bar with a full window.
    pub previous_median: Option<f64>,
    pub upper: f64,
    pub lower: f64,
    pub std: f64,
}

impl BandState {
    /// Both the current and previous median are known.
    pub fn is_ready(&self) -> bool {
        self.previous_median.is_some()
    }

    pub fn is_rising(&self) -> bool {
        self.previous_median.is_some_and(|prev| self.median > prev)
    }

    pub fn is_falling(&self) -> bool {
        self.previous_median.is_some_and(|prev| self.median < prev)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BandPoint {
    pub timestamp: NaiveDateTime,
    pub value: Option<BandState>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BandSeries {
    pub config: BandConfig,
    pub points: Vec<BandPoint>,
}

impl BandSeries {
    pub fn get(&self, index: usize) -> Option<&BandState> {
        self.points.get(index).and_then(|p| p.value.as_ref())
    }
}

/// Round half away from zero to `precision` decimal places.
pub fn round_to(value: f64, precision: u32) -> f64 {
    let scale = 10f64.powi(precision as i32);
    (value * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(median: f64, previous: Option<f64>) -> BandState {
        BandState {
            median,
            previous_median: previous,
            upper: median + 1.0,
            lower: median - 1.0,
            std: 0.5,
        }
    }

    #[test]
    fn round_to_precision() {
        assert!((round_to(1.234567, 2) - 1.23).abs() < 1e-12);
        assert!((round_to(1.235, 2) - 1.24).abs() < 1e-9);
        assert!((round_to(1.0856789, 5) - 1.08568).abs() < 1e-12);
        assert!((round_to(-2.555, 0) - -3.0).abs() < 1e-12);
    }

    #[test]
    fn trend_direction_requires_previous_median() {
        assert!(!state(10.0, None).is_rising());
        assert!(!state(10.0, None).is_falling());
        assert!(!state(10.0, None).is_ready());
        assert!(state(10.0, Some(9.0)).is_rising());
        assert!(state(10.0, Some(11.0)).is_falling());
        let flat = state(10.0, Some(10.0));
        assert!(!flat.is_rising() && !flat.is_falling());
    }

    #[test]
    fn band_config_display() {
        assert_eq!(BandConfig::default().to_string(), "MEDIAN_BAND(6,1.5)");
    }
}
