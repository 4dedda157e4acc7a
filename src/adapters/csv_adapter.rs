//! CSV directory data adapter.
//!
//! One file per symbol and interval, named `<SYMBOL>_<interval>.csv`
//! (`AAPL_1d.csv`, `RELIANCE.NS_1wk.csv`). Columns are located by header name,
//! so a file without e.g. a `high` column still loads and the fetcher reports
//! the gap.

use crate::domain::error::CandlecallError;
use crate::domain::interval::Interval;
use crate::domain::ohlcv::RawBar;
use crate::ports::data_port::MarketDataPort;
use chrono::{NaiveDate, NaiveDateTime};
use std::fs;
use std::path::{Path, PathBuf};

const TIMESTAMP_HEADERS: [&str; 3] = ["timestamp", "datetime", "date"];

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str, interval: Interval) -> PathBuf {
        self.base_path.join(format!("{}_{}.csv", symbol, interval))
    }

    /// Reads every row of a CSV file, sorted by timestamp.
    pub fn read_file(path: &Path) -> Result<Vec<RawBar>, CandlecallError> {
        let content = fs::read_to_string(path).map_err(|e| CandlecallError::Provider {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;
        parse_rows(&content)
    }
}

fn parse_rows(content: &str) -> Result<Vec<RawBar>, CandlecallError> {
    let mut rdr = csv::Reader::from_reader(content.as_bytes());
    let headers = rdr
        .headers()
        .map_err(|e| CandlecallError::Provider {
            reason: format!("CSV header error: {}", e),
        })?
        .clone();

    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
    };
    let ts_col = TIMESTAMP_HEADERS
        .iter()
        .find_map(|&name| column(name))
        .ok_or_else(|| CandlecallError::Provider {
            reason: "missing timestamp column".into(),
        })?;
    let open_col = column("open");
    let high_col = column("high");
    let low_col = column("low");
    let close_col = column("close");

    let mut bars = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(|e| CandlecallError::Provider {
            reason: format!("CSV parse error: {}", e),
        })?;

        let ts_str = record.get(ts_col).unwrap_or_default();
        let timestamp = parse_timestamp(ts_str).ok_or_else(|| CandlecallError::Provider {
            reason: format!("invalid timestamp: {}", ts_str),
        })?;

        let price = |col: Option<usize>, name: &str| -> Result<Option<f64>, CandlecallError> {
            let Some(raw) = col.and_then(|c| record.get(c)).map(str::trim) else {
                return Ok(None);
            };
            if raw.is_empty() {
                return Ok(None);
            }
            raw.parse::<f64>().map(Some).map_err(|e| CandlecallError::Provider {
                reason: format!("invalid {} value: {}", name, e),
            })
        };

        bars.push(RawBar {
            timestamp,
            open: price(open_col, "open")?,
            high: price(high_col, "high")?,
            low: price(low_col, "low")?,
            close: price(close_col, "close")?,
        });
    }

    bars.sort_by_key(|b| b.timestamp);
    Ok(bars)
}

fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

impl MarketDataPort for CsvAdapter {
    fn history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        interval: Interval,
    ) -> Result<Vec<RawBar>, CandlecallError> {
        let path = self.csv_path(symbol, interval);
        let bars = Self::read_file(&path)?;

        let bars: Vec<RawBar> = bars
            .into_iter()
            .filter(|b| {
                let day = b.timestamp.date();
                day >= start && day < end
            })
            .collect();

        tracing::debug!(symbol, %interval, rows = bars.len(), path = %path.display(), "csv history");
        Ok(bars)
    }
}
