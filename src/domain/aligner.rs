//! Backward as-of alignment of coarse series onto a base timeline.
//!
//! Every base bar is paired with the latest reference bar whose timestamp is
//! at or before its own. Nothing later is ever visible, and a base bar that
//! precedes all reference bars gets `None` rather than a filler value.

use chrono::NaiveDateTime;

use super::error::EngineError;
use super::indicator::{BandSeries, BandState};
use super::ohlcv::{Bar, Series};

/// Indices into each reference series for one base bar.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedIndex {
    pub timestamp: NaiveDateTime,
    pub base_index: usize,
    pub references: Vec<Option<usize>>,
}

/// One base bar annotated with the band of the reference series.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedRow {
    pub timestamp: NaiveDateTime,
    pub bar: Bar,
    pub reference_index: Option<usize>,
    pub reference_timestamp: Option<NaiveDateTime>,
    pub band: Option<BandState>,
}

impl AlignedRow {
    /// Band with both medians available; signals are only evaluated here.
    pub fn ready_band(&self) -> Option<&BandState> {
        self.band.as_ref().filter(|b| b.is_ready())
    }
}

/// For each base timestamp, the index of the greatest reference timestamp
/// that is less than or equal to it. Both slices must be sorted ascending.
pub fn asof_indices(base: &[NaiveDateTime], reference: &[NaiveDateTime]) -> Vec<Option<usize>> {
    let mut out = Vec::with_capacity(base.len());
    let mut cursor = 0usize;
    for &ts in base {
        while cursor < reference.len() && reference[cursor] <= ts {
            cursor += 1;
        }
        out.push(cursor.checked_sub(1));
    }
    out
}

fn ensure_strictly_increasing(series: &Series) -> Result<(), EngineError> {
    for (i, pair) in series.bars.windows(2).enumerate() {
        if pair[1].timestamp < pair[0].timestamp {
            return Err(EngineError::integrity(
                &series.label,
                "unsorted",
                format!("bar {} is earlier than bar {}", i + 1, i),
            ));
        }
        if pair[1].timestamp == pair[0].timestamp {
            return Err(EngineError::integrity(
                &series.label,
                "duplicate timestamp",
                format!("bars {} and {} share {}", i, i + 1, pair[0].timestamp),
            ));
        }
    }
    Ok(())
}

/// Align any number of reference series onto `base`.
pub fn align(base: &Series, references: &[&Series]) -> Result<Vec<AlignedIndex>, EngineError> {
    ensure_strictly_increasing(base)?;
    for reference in references {
        ensure_strictly_increasing(reference)?;
    }

    let base_ts = base.timestamps();
    let per_reference: Vec<Vec<Option<usize>>> = references
        .iter()
        .map(|r| asof_indices(&base_ts, &r.timestamps()))
        .collect();

    Ok(base_ts
        .iter()
        .enumerate()
        .map(|(i, &timestamp)| AlignedIndex {
            timestamp,
            base_index: i,
            references: per_reference.iter().map(|idx| idx[i]).collect(),
        })
        .collect())
}

/// Build the signal timeline: base bars joined with the reference band.
///
/// `bands` must have been computed on `reference`.
pub fn build_timeline(
    base: &Series,
    reference: &Series,
    bands: &BandSeries,
) -> Result<Vec<AlignedRow>, EngineError> {
    let aligned = align(base, &[reference])?;
    Ok(aligned
        .into_iter()
        .map(|a| {
            let reference_index = a.references[0];
            AlignedRow {
                timestamp: a.timestamp,
                bar: base.bars[a.base_index].clone(),
                reference_index,
                reference_timestamp: reference_index.map(|j| reference.bars[j].timestamp),
                band: reference_index.and_then(|j| bands.get(j).copied()),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::BandConfig;
    use crate::domain::indicator::median_band::calculate_median_band;
    use crate::domain::timeframe::Timeframe;
    use chrono::{Duration, NaiveDate};

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn hours(h: &[i64]) -> Vec<NaiveDateTime> {
        h.iter().map(|&x| t0() + Duration::hours(x)).collect()
    }

    fn series(label: &str, tf: Timeframe, h: &[i64], closes: &[f64]) -> Series {
        let bars = hours(h)
            .into_iter()
            .zip(closes)
            .map(|(ts, &c)| Bar::new(ts, c, c, c, c))
            .collect();
        Series::new(label, tf, bars)
    }

    #[test]
    fn asof_backward_join() {
        let base = hours(&[0, 1, 2, 3, 4, 5]);
        let reference = hours(&[1, 4]);
        assert_eq!(
            asof_indices(&base, &reference),
            vec![None, Some(0), Some(0), Some(0), Some(1), Some(1)]
        );
    }

    #[test]
    fn asof_with_empty_reference_is_all_absent() {
        let base = hours(&[0, 1]);
        assert_eq!(asof_indices(&base, &[]), vec![None, None]);
    }

    #[test]
    fn asof_reference_after_all_base_rows() {
        let base = hours(&[0, 1]);
        let reference = hours(&[10]);
        assert_eq!(asof_indices(&base, &reference), vec![None, None]);
    }

    #[test]
    fn align_multiple_references() {
        let base = series("1h", Timeframe::Hour(1), &[0, 1, 2, 3], &[1.0; 4]);
        let daily = series("1d", Timeframe::Day, &[1], &[1.0]);
        let weekly = series("1w", Timeframe::Week, &[3], &[1.0]);

        let rows = align(&base, &[&daily, &weekly]).unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].references, vec![None, None]);
        assert_eq!(rows[1].references, vec![Some(0), None]);
        assert_eq!(rows[3].references, vec![Some(0), Some(0)]);
        assert_eq!(rows[2].base_index, 2);
    }

    #[test]
    fn align_rejects_unsorted_reference() {
        let base = series("1h", Timeframe::Hour(1), &[0, 1], &[1.0; 2]);
        let weekly = series("weekly", Timeframe::Week, &[5, 2], &[1.0; 2]);
        match align(&base, &[&weekly]) {
            Err(EngineError::DataIntegrity { series, check, .. }) => {
                assert_eq!(series, "weekly");
                assert_eq!(check, "unsorted");
            }
            other => panic!("expected integrity error, got {other:?}"),
        }
    }

    #[test]
    fn align_rejects_duplicate_base_timestamps() {
        let base = series("hourly", Timeframe::Hour(1), &[0, 0], &[1.0; 2]);
        assert!(matches!(
            align(&base, &[]),
            Err(EngineError::DataIntegrity {
                check: "duplicate timestamp",
                ..
            })
        ));
    }

    #[test]
    fn timeline_carries_reference_band_without_lookahead() {
        let base = series("1h", Timeframe::Hour(1), &[0, 1, 2, 3, 4, 5, 6], &[1.0; 7]);
        let reference = series("4h", Timeframe::Hour(4), &[0, 2, 4, 6], &[1.0, 2.0, 3.0, 4.0]);
        let cfg = BandConfig {
            window: 2,
            ..BandConfig::default()
        };
        let bands = calculate_median_band(&reference, &cfg);
        let rows = build_timeline(&base, &reference, &bands).unwrap();

        for row in &rows {
            if let Some(ref_ts) = row.reference_timestamp {
                assert!(ref_ts <= row.timestamp);
            }
        }
        // reference index 0 has no band (warmup), index 1 has median but no previous
        assert!(rows[0].band.is_none());
        assert!(rows[2].band.is_some());
        assert!(rows[2].ready_band().is_none());
        assert!(rows[4].ready_band().is_some());
        assert!((rows[5].band.unwrap().median - 2.5).abs() < f64::EPSILON);
    }
}
