//! Aggregation of a fine series into coarser calendar buckets.
//!
//! Output bars carry the bucket's exclusive end as their timestamp: a weekly
//! bar built from hours of the week starting Monday 2024-01-08 is stamped
//! 2024-01-15 00:00, the first instant at which it is complete. An as-of join
//! against such a series can therefore never see a partially formed bar.

use super::error::EngineError;
use super::ohlcv::{Bar, Series};
use super::timeframe::Timeframe;

pub fn resample(series: &Series, target: Timeframe) -> Result<Series, EngineError> {
    if !target.is_coarser_or_equal(&series.timeframe) {
        return Err(EngineError::invalid(
            "data",
            "reference_timeframe",
            format!(
                "cannot resample {} series '{}' to finer timeframe {}",
                series.timeframe, series.label, target
            ),
        ));
    }
    if !target.is_day_aligned() || !target.is_whole_multiple_of(&series.timeframe) {
        return Err(EngineError::invalid(
            "data",
            "reference_timeframe",
            format!(
                "{} buckets do not tile {} series '{}'",
                target, series.timeframe, series.label
            ),
        ));
    }

    let mut out: Vec<Bar> = Vec::new();
    for bar in &series.bars {
        let end = target.bucket_end(bar.timestamp);
        match out.last_mut() {
            Some(agg) if agg.timestamp == end => {
                agg.high = agg.high.max(bar.high);
                agg.low = agg.low.min(bar.low);
                agg.close = bar.close;
                agg.volume += bar.volume;
                if bar.bid_close.is_some() {
                    agg.bid_close = bar.bid_close;
                }
                if bar.ask_close.is_some() {
                    agg.ask_close = bar.ask_close;
                }
            }
            _ => out.push(Bar {
                timestamp: end,
                ..bar.clone()
            }),
        }
    }

    Ok(Series::new(
        format!("{}@{}", series.label, target),
        target,
        out,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    fn start() -> NaiveDateTime {
        // Monday
        NaiveDate::from_ymd_opt(2024, 1, 8)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn hourly(closes: &[(i64, f64)]) -> Series {
        let bars = closes
            .iter()
            .map(|&(hours, close)| {
                let mut b = Bar::new(
                    start() + Duration::hours(hours),
                    close - 0.5,
                    close + 1.0,
                    close - 1.0,
                    close,
                );
                b.volume = 10.0;
                b
            })
            .collect();
        Series::new("hourly", Timeframe::Hour(1), bars)
    }

    #[test]
    fn weekly_aggregation_ohlcv() {
        // two bars in week 1, one bar in week 2 (168h later)
        let s = hourly(&[(0, 100.0), (5, 104.0), (168, 90.0)]);
        let weekly = resample(&s, Timeframe::Week).unwrap();

        assert_eq!(weekly.len(), 2);
        assert_eq!(weekly.timeframe, Timeframe::Week);
        let w1 = &weekly.bars[0];
        assert_eq!(
            w1.timestamp,
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap().and_hms_opt(0, 0, 0).unwrap()
        );
        assert!((w1.open - 99.5).abs() < f64::EPSILON);
        assert!((w1.high - 105.0).abs() < f64::EPSILON);
        assert!((w1.low - 99.0).abs() < f64::EPSILON);
        assert!((w1.close - 104.0).abs() < f64::EPSILON);
        assert!((w1.volume - 20.0).abs() < f64::EPSILON);
        assert!((weekly.bars[1].close - 90.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_buckets_are_dropped() {
        // gap of three weeks produces no placeholder bars
        let s = hourly(&[(0, 100.0), (24 * 7 * 3, 101.0)]);
        let weekly = resample(&s, Timeframe::Week).unwrap();
        assert_eq!(weekly.len(), 2);
    }

    #[test]
    fn daily_from_hourly_stamped_at_next_midnight() {
        let s = hourly(&[(0, 1.0), (1, 2.0), (20, 3.0)]);
        let daily = resample(&s, Timeframe::Day).unwrap();
        assert_eq!(daily.len(), 2);
        assert_eq!(
            daily.bars[0].timestamp,
            NaiveDate::from_ymd_opt(2024, 1, 9).unwrap().and_hms_opt(0, 0, 0).unwrap()
        );
        assert!(daily.bars.iter().all(|b| b.timestamp > start()));
    }

    #[test]
    fn finer_target_is_rejected() {
        let s = Series::new("daily", Timeframe::Day, vec![]);
        assert!(matches!(
            resample(&s, Timeframe::Hour(1)),
            Err(EngineError::ConfigInvalid { .. })
        ));
    }

    #[test]
    fn multi_day_intraday_target_is_rejected() {
        let s = hourly(&(0..96).map(|h| (h, 100.0 + h as f64)).collect::<Vec<_>>());
        for target in [Timeframe::Hour(48), Timeframe::Minute(2880)] {
            assert!(matches!(
                resample(&s, target),
                Err(EngineError::ConfigInvalid { ref key, .. }) if key == "reference_timeframe"
            ));
        }
    }

    #[test]
    fn target_must_be_whole_multiple_of_source() {
        let s = Series::new("45m", Timeframe::Minute(45), vec![]);
        assert!(resample(&s, Timeframe::Hour(1)).is_err());
        assert!(resample(&s, Timeframe::Hour(3)).is_ok());
    }
}
