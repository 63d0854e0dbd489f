//! Nominal sampling frequency of a series.

use chrono::{Datelike, Duration, NaiveDateTime, NaiveTime, Timelike};
use std::fmt;
use std::str::FromStr;

const SECONDS_PER_YEAR: f64 = 365.0 * 86_400.0;
const MINUTES_PER_DAY: u32 = 1_440;
const HOURS_PER_DAY: u32 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timeframe {
    Minute(u32),
    Hour(u32),
    Day,
    Week,
}

impl Timeframe {
    pub fn nominal_seconds(&self) -> i64 {
        match self {
            Timeframe::Minute(n) => 60 * i64::from(*n),
            Timeframe::Hour(n) => 3_600 * i64::from(*n),
            Timeframe::Day => 86_400,
            Timeframe::Week => 7 * 86_400,
        }
    }

    /// Bars per calendar year, used to annualize per-bar statistics.
    pub fn periods_per_year(&self) -> f64 {
        SECONDS_PER_YEAR / self.nominal_seconds() as f64
    }

    pub fn is_coarser_or_equal(&self, other: &Timeframe) -> bool {
        self.nominal_seconds() >= other.nominal_seconds()
    }

    /// Intraday steps must tile a day exactly; buckets are anchored at midnight.
    pub fn is_day_aligned(&self) -> bool {
        match self {
            Timeframe::Minute(n) => *n > 0 && *n < MINUTES_PER_DAY && MINUTES_PER_DAY % n == 0,
            Timeframe::Hour(n) => *n > 0 && *n < HOURS_PER_DAY && HOURS_PER_DAY % n == 0,
            Timeframe::Day | Timeframe::Week => true,
        }
    }

    /// Every bucket of `self` is a whole number of `finer` buckets.
    pub fn is_whole_multiple_of(&self, finer: &Timeframe) -> bool {
        let (coarse, fine) = (self.nominal_seconds(), finer.nominal_seconds());
        fine > 0 && coarse >= fine && coarse % fine == 0
    }

    /// Start of the calendar bucket containing `ts`. Weeks start on Monday.
    pub fn bucket_start(&self, ts: NaiveDateTime) -> NaiveDateTime {
        let midnight = ts.date().and_time(NaiveTime::MIN);
        match self {
            Timeframe::Minute(n) => {
                let step = i64::from((*n).max(1));
                let minutes = i64::from(ts.hour() * 60 + ts.minute());
                midnight + Duration::minutes(minutes - minutes % step)
            }
            Timeframe::Hour(n) => {
                let step = i64::from((*n).max(1));
                let hours = i64::from(ts.hour());
                midnight + Duration::hours(hours - hours % step)
            }
            Timeframe::Day => midnight,
            Timeframe::Week => {
                let offset = i64::from(ts.weekday().num_days_from_monday());
                midnight - Duration::days(offset)
            }
        }
    }

    /// Exclusive end of the bucket containing `ts`.
    pub fn bucket_end(&self, ts: NaiveDateTime) -> NaiveDateTime {
        self.bucket_start(ts) + Duration::seconds(self.nominal_seconds())
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timeframe::Minute(n) => write!(f, "{}m", n),
            Timeframe::Hour(n) => write!(f, "{}h", n),
            Timeframe::Day => write!(f, "1d"),
            Timeframe::Week => write!(f, "1w"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("unrecognised timeframe '{0}' (expected e.g. 15m, 1h, 4h, 1d, 1w)")]
pub struct TimeframeParseError(pub String);

impl FromStr for Timeframe {
    type Err = TimeframeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim().to_lowercase();
        let err = || TimeframeParseError(s.to_string());
        match raw.as_str() {
            "hourly" => return Ok(Timeframe::Hour(1)),
            "daily" | "d" => return Ok(Timeframe::Day),
            "weekly" | "w" => return Ok(Timeframe::Week),
            _ => {}
        }
        let split = raw.find(|c: char| !c.is_ascii_digit()).ok_or_else(err)?;
        let (count, unit) = raw.split_at(split);
        let count: u32 = if count.is_empty() {
            1
        } else {
            count.parse().map_err(|_| err())?
        };
        if count == 0 {
            return Err(err());
        }
        let tf = match (unit, count) {
            ("m" | "min", n) => Timeframe::Minute(n),
            ("h", n) => Timeframe::Hour(n),
            ("d", 1) => Timeframe::Day,
            ("w" | "wk", 1) => Timeframe::Week,
            _ => return Err(err()),
        };
        if !tf.is_day_aligned() {
            return Err(err());
        }
        Ok(tf)
    }
}
