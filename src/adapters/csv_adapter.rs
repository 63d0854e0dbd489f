//! CSV file data adapter.
//!
//! Columns are located by header name: `timestamp` (or `date`), `open`,
//! `high`, `low`, `close`, and optionally `volume`, `bid_close`, `ask_close`.
//! Rows are returned in file order.

use crate::domain::error::EngineError;
use crate::domain::ohlcv::{Bar, Series};
use crate::domain::timeframe::Timeframe;
use crate::ports::data_port::DataPort;
use chrono::{NaiveDate, NaiveDateTime};
use csv::StringRecord;
use std::fs;
use std::path::{Path, PathBuf};

const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

pub struct CsvAdapter {
    base_path: PathBuf,
}

struct Columns {
    timestamp: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: Option<usize>,
    bid_close: Option<usize>,
    ask_close: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &StringRecord, source: &str) -> Result<Self, EngineError> {
        let find = |names: &[&str]| {
            headers
                .iter()
                .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
        };
        let require = |names: &[&str]| {
            find(names).ok_or_else(|| load_error(source, format!("missing {} column", names[0])))
        };
        Ok(Columns {
            timestamp: require(&["timestamp", "date", "datetime", "time"])?,
            open: require(&["open"])?,
            high: require(&["high"])?,
            low: require(&["low"])?,
            close: require(&["close"])?,
            volume: find(&["volume"]),
            bid_close: find(&["bid_close", "bid"]),
            ask_close: find(&["ask_close", "ask"]),
        })
    }
}

fn load_error(source: &str, reason: impl Into<String>) -> EngineError {
    EngineError::DataLoad {
        source_name: source.to_string(),
        reason: reason.into(),
    }
}

pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn field<'r>(
    record: &'r StringRecord,
    index: usize,
    name: &str,
    line: u64,
    source: &str,
) -> Result<&'r str, EngineError> {
    record
        .get(index)
        .map(str::trim)
        .ok_or_else(|| load_error(source, format!("line {line}: missing {name} value")))
}

fn price(
    record: &StringRecord,
    index: usize,
    name: &str,
    line: u64,
    source: &str,
) -> Result<f64, EngineError> {
    let raw = field(record, index, name, line, source)?;
    raw.parse()
        .map_err(|e| load_error(source, format!("line {line}: invalid {name} value '{raw}': {e}")))
}

fn optional_price(
    record: &StringRecord,
    index: Option<usize>,
    name: &str,
    line: u64,
    source: &str,
) -> Result<Option<f64>, EngineError> {
    match index.and_then(|i| record.get(i)).map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => raw.parse().map(Some).map_err(|e| {
            load_error(source, format!("line {line}: invalid {name} value '{raw}': {e}"))
        }),
    }
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    /// `label` may name a file directly or a `<label>.csv` under the base path.
    fn csv_path(&self, label: &str) -> PathBuf {
        let given = Path::new(label);
        if given.extension().is_some_and(|e| e.eq_ignore_ascii_case("csv")) {
            self.base_path.join(given)
        } else {
            self.base_path.join(format!("{label}.csv"))
        }
    }

    pub fn read_bars<R: std::io::Read>(reader: R, source: &str) -> Result<Vec<Bar>, EngineError> {
        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let headers = rdr
            .headers()
            .map_err(|e| load_error(source, format!("CSV header error: {e}")))?
            .clone();
        let columns = Columns::from_headers(&headers, source)?;

        let mut bars = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| load_error(source, format!("CSV parse error: {e}")))?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);

            let raw_ts = field(&record, columns.timestamp, "timestamp", line, source)?;
            let timestamp = parse_timestamp(raw_ts).ok_or_else(|| {
                load_error(source, format!("line {line}: invalid timestamp '{raw_ts}'"))
            })?;

            let mut bar = Bar::new(
                timestamp,
                price(&record, columns.open, "open", line, source)?,
                price(&record, columns.high, "high", line, source)?,
                price(&record, columns.low, "low", line, source)?,
                price(&record, columns.close, "close", line, source)?,
            );
            bar.volume =
                optional_price(&record, columns.volume, "volume", line, source)?.unwrap_or(0.0);
            bar.bid_close = optional_price(&record, columns.bid_close, "bid_close", line, source)?;
            bar.ask_close = optional_price(&record, columns.ask_close, "ask_close", line, source)?;
            bars.push(bar);
        }
        Ok(bars)
    }
}

impl DataPort for CsvAdapter {
    fn load_series(&self, label: &str, timeframe: Timeframe) -> Result<Series, EngineError> {
        let path = self.csv_path(label);
        let source = path.display().to_string();
        let content = fs::read(&path)
            .map_err(|e| load_error(&source, format!("failed to read {source}: {e}")))?;
        let bars = Self::read_bars(content.as_slice(), &source)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| label.to_string());
        Ok(Series::new(name, timeframe, bars))
    }
}
