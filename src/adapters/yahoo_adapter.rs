//! Yahoo Finance v8 chart endpoint adapter.

use crate::domain::error::CandlecallError;
use crate::domain::interval::Interval;
use crate::domain::ohlcv::RawBar;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::MarketDataPort;
use chrono::{DateTime, NaiveDate};
use serde::Deserialize;
use std::time::Duration;

const CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) candlecall";

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
}

#[derive(Debug, Default, Deserialize)]
struct Quote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
}

impl Quote {
    fn has_columns(&self) -> bool {
        [&self.open, &self.high, &self.low, &self.close]
            .iter()
            .any(|column| !column.is_empty())
    }
}

pub struct YahooAdapter {
    client: reqwest::blocking::Client,
}

fn provider_error(reason: impl std::fmt::Display) -> CandlecallError {
    CandlecallError::Provider {
        reason: reason.to_string(),
    }
}

impl YahooAdapter {
    pub fn new(timeout: Duration) -> Result<Self, CandlecallError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(provider_error)?;
        Ok(Self { client })
    }

    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, CandlecallError> {
        let secs = config.get_int("yahoo", "timeout_secs", 10).max(1) as u64;
        Self::new(Duration::from_secs(secs))
    }
}

fn midnight_epoch(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default()
}

fn parse_chart(body: &str) -> Result<Vec<RawBar>, CandlecallError> {
    let response: ChartResponse = serde_json::from_str(body).map_err(provider_error)?;

    if let Some(err) = response.chart.error {
        return Err(provider_error(format!("{}: {}", err.code, err.description)));
    }

    let Some(result) = response.chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(Vec::new());
    };
    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
    let at = |values: &[Option<f64>], i: usize| values.get(i).copied().flatten();
    let has_columns = quote.has_columns();

    let mut bars = Vec::with_capacity(result.timestamp.len());
    let mut padded = 0usize;
    for (i, &ts) in result.timestamp.iter().enumerate() {
        let timestamp = DateTime::from_timestamp(ts, 0)
            .ok_or_else(|| provider_error(format!("timestamp out of range: {ts}")))?
            .naive_utc();
        let bar = RawBar {
            timestamp,
            open: at(&quote.open, i),
            high: at(&quote.high, i),
            low: at(&quote.low, i),
            close: at(&quote.close, i),
        };
        // Halted periods come back as rows of nulls. Rows with only some
        // prices missing are kept so the fetcher reports them.
        if has_columns
            && bar.open.is_none()
            && bar.high.is_none()
            && bar.low.is_none()
            && bar.close.is_none()
        {
            padded += 1;
            continue;
        }
        bars.push(bar);
    }
    if padded > 0 {
        tracing::debug!(padded, "skipped all-null chart rows");
    }

    bars.sort_by_key(|b| b.timestamp);
    bars.dedup_by_key(|b| b.timestamp);
    Ok(bars)
}

impl MarketDataPort for YahooAdapter {
    fn history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        interval: Interval,
    ) -> Result<Vec<RawBar>, CandlecallError> {
        let url = format!("{CHART_URL}/{symbol}");
        tracing::debug!(symbol, %interval, %start, %end, "yahoo chart request");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("period1", midnight_epoch(start).to_string()),
                ("period2", midnight_epoch(end).to_string()),
                ("interval", interval.as_str().to_string()),
            ])
            .send()
            .map_err(provider_error)?;

        let status = response.status();
        let body = response.text().map_err(provider_error)?;
        if !status.is_success() && !body.contains("\"chart\"") {
            return Err(provider_error(format!("HTTP {status} for {symbol}")));
        }

        let bars = parse_chart(&body)?;
        tracing::debug!(symbol, %interval, rows = bars.len(), "yahoo chart response");
        Ok(bars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::FetchError;
    use crate::domain::fetcher::MarketDataFetcher;
    use crate::domain::period::DateWindow;

    #[test]
    fn parses_quotes_with_nulls() {
        let body = r#"{"chart":{"result":[{"meta":{"symbol":"AAPL"},
            "timestamp":[1704207600,1704121200],
            "indicators":{"quote":[{"open":[101.0,100.0],"high":[102.0,null],
            "low":[99.5,98.0],"close":[101.5,99.0],"volume":[10,20]}]}}],"error":null}}"#;

        let bars = parse_chart(body).unwrap();
        assert_eq!(bars.len(), 2);
        assert!(bars[0].timestamp < bars[1].timestamp);
        assert_eq!(bars[0].open, Some(100.0));
        assert_eq!(bars[0].high, None);
        assert_eq!(bars[1].close, Some(101.5));
    }

    /// `n` daily bars from 2024-01-01. Row `null_at` has null open, high,
    /// low or close where `nulls` is set.
    fn chart_body(n: usize, null_at: usize, nulls: [bool; 4]) -> String {
        let start = 1_704_067_200i64;
        let timestamps: Vec<String> = (0..n)
            .map(|i| (start + i as i64 * 86_400).to_string())
            .collect();
        let column = |offset: f64, which: usize| {
            (0..n)
                .map(|i| {
                    if i == null_at && nulls[which] {
                        "null".to_string()
                    } else {
                        format!("{:.1}", 100.0 + i as f64 + offset)
                    }
                })
                .collect::<Vec<_>>()
                .join(",")
        };
        format!(
            r#"{{"chart":{{"result":[{{"timestamp":[{}],"indicators":{{"quote":[{{"open":[{}],"high":[{}],"low":[{}],"close":[{}]}}]}}}}],"error":null}}}}"#,
            timestamps.join(","),
            column(0.0, 0),
            column(1.0, 1),
            column(-1.0, 2),
            column(0.5, 3)
        )
    }

    struct FixedPort(Vec<RawBar>);

    impl MarketDataPort for FixedPort {
        fn history(
            &self,
            _symbol: &str,
            _start: NaiveDate,
            _end: NaiveDate,
            _interval: Interval,
        ) -> Result<Vec<RawBar>, CandlecallError> {
            Ok(self.0.clone())
        }
    }

    fn window() -> DateWindow {
        DateWindow {
            start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
        }
    }

    #[test]
    fn halted_rows_are_skipped() {
        let bars = parse_chart(&chart_body(80, 40, [true; 4])).unwrap();
        assert_eq!(bars.len(), 79);
        assert!(bars.iter().all(|b| b.close.is_some()));

        let port = FixedPort(bars);
        let series = MarketDataFetcher::new(&port)
            .fetch_window("AAPL", Interval::Day1, window())
            .unwrap();
        assert_eq!(series.len(), 79);
    }

    #[test]
    fn partially_null_rows_still_fail() {
        let bars = parse_chart(&chart_body(80, 40, [true, false, false, false])).unwrap();
        assert_eq!(bars.len(), 80);

        let port = FixedPort(bars);
        let result = MarketDataFetcher::new(&port).fetch_window("AAPL", Interval::Day1, window());
        assert_eq!(
            result.unwrap_err(),
            FetchError::MissingFields {
                symbol: "AAPL".into(),
                field: "open",
            }
        );
    }

    #[test]
    fn absent_close_column_keeps_rows() {
        let body = r#"{"chart":{"result":[{"timestamp":[1704067200,1704153600],
            "indicators":{"quote":[{"open":[1.0,2.0],"high":[1.5,2.5],"low":[0.5,1.5]}]}}],"error":null}}"#;
        let bars = parse_chart(body).unwrap();
        assert_eq!(bars.len(), 2);
        assert!(bars.iter().all(|b| b.close.is_none()));
    }

    #[test]
    fn missing_timestamps_mean_no_rows() {
        let body = r#"{"chart":{"result":[{"meta":{},"indicators":{"quote":[{}]}}],"error":null}}"#;
        assert!(parse_chart(body).unwrap().is_empty());
    }

    #[test]
    fn chart_error_is_reported() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        match parse_chart(body) {
            Err(CandlecallError::Provider { reason }) => assert!(reason.contains("delisted")),
            other => panic!("expected provider error, got {other:?}"),
        }
    }

    #[test]
    fn malformed_body_is_reported() {
        assert!(parse_chart("<html>").is_err());
    }

    #[test]
    fn epoch_of_date() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(midnight_epoch(date), 1_704_067_200);
    }
}
