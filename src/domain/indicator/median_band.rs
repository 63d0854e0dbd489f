//! Rolling median band.
//!
//! - Middle: median of the last `window` closes
//! - Upper: round(median + k × sample std, precision)
//! - Lower: round(median - k × sample std, precision)
//!
//! Warmup: the first (window-1) bars carry no value; the bar at index
//! (window-1) has a median but no previous median.
//!
//! The band is computed once per bar of the series it is given. Finer rows
//! receive it through the as-of join in [`aligner`](crate::domain::aligner).

use super::stats::{median, sample_std};
use super::{BandConfig, BandPoint, BandSeries, BandState, round_to};
use crate::domain::ohlcv::Series;

pub fn calculate_median_band(series: &Series, config: &BandConfig) -> BandSeries {
    let closes = series.closes();
    let window = config.window;
    let mut points = Vec::with_capacity(closes.len());
    let mut previous_median: Option<f64> = None;

    for (i, bar) in series.bars.iter().enumerate() {
        let value = if window >= 2 && i + 1 >= window {
            let slice = &closes[i + 1 - window..=i];
            match (median(slice), sample_std(slice)) {
                (Some(raw_median), Some(std)) => {
                    let median = if config.round_median {
                        round_to(raw_median, config.precision)
                    } else {
                        raw_median
                    };
                    let half_width = config.band_width_factor * std;
                    Some(BandState {
                        median,
                        previous_median,
                        upper: round_to(median + half_width, config.precision),
                        lower: round_to(median - half_width, config.precision),
                        std,
                    })
                }
                _ => None,
            }
        } else {
            None
        };
        previous_median = value.map(|s| s.median);
        points.push(BandPoint {
            timestamp: bar.timestamp,
            value,
        });
    }

    BandSeries {
        config: config.clone(),
        points,
    }
}
