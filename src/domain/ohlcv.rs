//! OHLC bar and series representation with integrity checks.

use chrono::NaiveDateTime;
use tracing::warn;

use super::error::EngineError;
use super::timeframe::Timeframe;

#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub bid_close: Option<f64>,
    pub ask_close: Option<f64>,
    pub volume: f64,
}

impl Bar {
    pub fn new(timestamp: NaiveDateTime, open: f64, high: f64, low: f64, close: f64) -> Self {
        Bar {
            timestamp,
            open,
            high,
            low,
            close,
            bid_close: None,
            ask_close: None,
            volume: 0.0,
        }
    }

    /// Price a buyer pays at the close: ask when quoted, otherwise close.
    pub fn buy_close(&self) -> f64 {
        self.ask_close.unwrap_or(self.close)
    }

    /// Price a seller receives at the close: bid when quoted, otherwise close.
    pub fn sell_close(&self) -> f64 {
        self.bid_close.unwrap_or(self.close)
    }

    fn first_non_finite(&self) -> Option<&'static str> {
        let fields = [
            ("open", Some(self.open)),
            ("high", Some(self.high)),
            ("low", Some(self.low)),
            ("close", Some(self.close)),
            ("bid_close", self.bid_close),
            ("ask_close", self.ask_close),
        ];
        fields
            .into_iter()
            .find(|(_, v)| v.is_some_and(|x| !x.is_finite()))
            .map(|(name, _)| name)
    }
}

/// What to do with two consecutive bars that share a timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    #[default]
    Reject,
    KeepLast,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub label: String,
    pub timeframe: Timeframe,
    pub bars: Vec<Bar>,
}

impl Series {
    pub fn new(label: impl Into<String>, timeframe: Timeframe, bars: Vec<Bar>) -> Self {
        Series {
            label: label.into(),
            timeframe,
            bars,
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn timestamps(&self) -> Vec<NaiveDateTime> {
        self.bars.iter().map(|b| b.timestamp).collect()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    /// Check prices and ordering, resolving duplicate timestamps per `policy`.
    ///
    /// Unsorted input is never reordered. The returned series has strictly
    /// increasing timestamps.
    pub fn validate(mut self, policy: DuplicatePolicy) -> Result<Series, EngineError> {
        for (i, bar) in self.bars.iter().enumerate() {
            if let Some(field) = bar.first_non_finite() {
                return Err(EngineError::integrity(
                    &self.label,
                    "non-finite price",
                    format!("bar {} at {} has non-finite {}", i, bar.timestamp, field),
                ));
            }
        }

        for (i, pair) in self.bars.windows(2).enumerate() {
            let (prev, next) = (&pair[0], &pair[1]);
            if next.timestamp < prev.timestamp {
                return Err(EngineError::integrity(
                    &self.label,
                    "unsorted",
                    format!(
                        "bar {} at {} precedes bar {} at {}",
                        i + 1,
                        next.timestamp,
                        i,
                        prev.timestamp
                    ),
                ));
            }
            if next.timestamp == prev.timestamp && policy == DuplicatePolicy::Reject {
                return Err(EngineError::integrity(
                    &self.label,
                    "duplicate timestamp",
                    format!("bars {} and {} share timestamp {}", i, i + 1, next.timestamp),
                ));
            }
        }

        if policy == DuplicatePolicy::KeepLast {
            let before = self.bars.len();
            let mut kept: Vec<Bar> = Vec::with_capacity(before);
            for bar in self.bars.drain(..) {
                match kept.last_mut() {
                    Some(last) if last.timestamp == bar.timestamp => *last = bar,
                    _ => kept.push(bar),
                }
            }
            let dropped = before - kept.len();
            if dropped > 0 {
                warn!(
                    series = %self.label,
                    dropped,
                    "duplicate timestamps resolved by keeping last bar"
                );
            }
            self.bars = kept;
        }

        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn bar(day: u32, close: f64) -> Bar {
        Bar::new(ts(day), close, close + 1.0, close - 1.0, close)
    }

    fn series(bars: Vec<Bar>) -> Series {
        Series::new("daily", Timeframe::Day, bars)
    }

    #[test]
    fn buy_and_sell_close_fall_back_to_close() {
        let mut b = bar(1, 100.0);
        assert!((b.buy_close() - 100.0).abs() < f64::EPSILON);
        assert!((b.sell_close() - 100.0).abs() < f64::EPSILON);

        b.ask_close = Some(100.5);
        b.bid_close = Some(99.5);
        assert!((b.buy_close() - 100.5).abs() < f64::EPSILON);
        assert!((b.sell_close() - 99.5).abs() < f64::EPSILON);
    }

    #[test]
    fn validate_accepts_sorted_series() {
        let s = series(vec![bar(1, 1.0), bar(2, 2.0), bar(3, 3.0)])
            .validate(DuplicatePolicy::Reject)
            .unwrap();
        assert_eq!(s.len(), 3);
    }

    #[test]
    fn validate_rejects_unsorted() {
        let err = series(vec![bar(2, 1.0), bar(1, 2.0)])
            .validate(DuplicatePolicy::KeepLast)
            .unwrap_err();
        match err {
            EngineError::DataIntegrity { series, check, .. } => {
                assert_eq!(series, "daily");
                assert_eq!(check, "unsorted");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn validate_rejects_duplicates_by_default() {
        let err = series(vec![bar(1, 1.0), bar(1, 2.0)])
            .validate(DuplicatePolicy::default())
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::DataIntegrity {
                check: "duplicate timestamp",
                ..
            }
        ));
    }

    #[test]
    fn validate_keep_last_drops_earlier_duplicate() {
        let s = series(vec![bar(1, 1.0), bar(2, 2.0), bar(2, 5.0), bar(3, 3.0)])
            .validate(DuplicatePolicy::KeepLast)
            .unwrap();
        assert_eq!(s.len(), 3);
        assert!((s.bars[1].close - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn validate_rejects_nan_and_infinite_prices() {
        let mut b = bar(2, 2.0);
        b.high = f64::NAN;
        let err = series(vec![bar(1, 1.0), b])
            .validate(DuplicatePolicy::Reject)
            .unwrap_err();
        assert!(err.to_string().contains("non-finite high"));

        let mut b = bar(1, 1.0);
        b.ask_close = Some(f64::INFINITY);
        let err = series(vec![b]).validate(DuplicatePolicy::Reject).unwrap_err();
        assert!(err.to_string().contains("ask_close"));
    }

    #[test]
    fn high_below_close_is_tolerated() {
        let mut b = bar(1, 100.0);
        b.high = 99.0;
        assert!(series(vec![b]).validate(DuplicatePolicy::Reject).is_ok());
    }
}
