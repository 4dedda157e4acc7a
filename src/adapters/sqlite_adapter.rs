//! SQLite candle store adapter.
//!
//! Price columns are nullable so partially imported rows surface as
//! missing-field errors in the fetcher rather than as fake zeros.

use crate::domain::error::CandlecallError;
use crate::domain::interval::Interval;
use crate::domain::ohlcv::RawBar;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::MarketDataPort;
use chrono::{NaiveDate, NaiveDateTime};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn pool_error(e: r2d2::Error) -> CandlecallError {
    CandlecallError::Database {
        reason: e.to_string(),
    }
}

fn query_error(e: rusqlite::Error) -> CandlecallError {
    CandlecallError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn parse_ts(value: &str) -> Result<NaiveDateTime, CandlecallError> {
    NaiveDateTime::parse_from_str(value, TS_FORMAT).map_err(|e| CandlecallError::Database {
        reason: format!("invalid timestamp {value}: {e}"),
    })
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, CandlecallError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| CandlecallError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(pool_error)?;

        let adapter = Self { pool };
        adapter.initialize_schema()?;
        Ok(adapter)
    }

    pub fn in_memory() -> Result<Self, CandlecallError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(pool_error)?;

        Ok(Self { pool })
    }

    pub fn initialize_schema(&self) -> Result<(), CandlecallError> {
        let conn = self.pool.get().map_err(pool_error)?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS candles (
                symbol TEXT NOT NULL,
                interval TEXT NOT NULL,
                ts TEXT NOT NULL,
                open REAL,
                high REAL,
                low REAL,
                close REAL,
                PRIMARY KEY (symbol, interval, ts)
            );
            CREATE INDEX IF NOT EXISTS idx_candles_symbol_interval ON candles(symbol, interval);",
        )
        .map_err(query_error)?;

        Ok(())
    }

    /// Upserts rows for one symbol and interval. Returns the number written.
    pub fn insert_candles(
        &self,
        symbol: &str,
        interval: Interval,
        bars: &[RawBar],
    ) -> Result<usize, CandlecallError> {
        let mut conn = self.pool.get().map_err(pool_error)?;
        let tx = conn.transaction().map_err(query_error)?;

        for bar in bars {
            tx.execute(
                "INSERT OR REPLACE INTO candles (symbol, interval, ts, open, high, low, close)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    symbol,
                    interval.as_str(),
                    bar.timestamp.format(TS_FORMAT).to_string(),
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close
                ],
            )
            .map_err(query_error)?;
        }

        tx.commit().map_err(query_error)?;
        tracing::info!(symbol, %interval, rows = bars.len(), "candles stored");
        Ok(bars.len())
    }

    pub fn list_symbols(&self, interval: Interval) -> Result<Vec<String>, CandlecallError> {
        let conn = self.pool.get().map_err(pool_error)?;
        let mut stmt = conn
            .prepare("SELECT DISTINCT symbol FROM candles WHERE interval = ?1 ORDER BY symbol")
            .map_err(query_error)?;

        let rows = stmt
            .query_map(params![interval.as_str()], |row| row.get(0))
            .map_err(query_error)?;

        rows.collect::<Result<Vec<String>, _>>().map_err(query_error)
    }

    pub fn data_range(
        &self,
        symbol: &str,
        interval: Interval,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, CandlecallError> {
        let conn = self.pool.get().map_err(pool_error)?;

        let result: (Option<String>, Option<String>, i64) = conn
            .query_row(
                "SELECT MIN(ts), MAX(ts), COUNT(*) FROM candles WHERE symbol = ?1 AND interval = ?2",
                params![symbol, interval.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(query_error)?;

        match result {
            (Some(min), Some(max), count) if count > 0 => {
                Ok(Some((parse_ts(&min)?, parse_ts(&max)?, count as usize)))
            }
            _ => Ok(None),
        }
    }
}

impl MarketDataPort for SqliteAdapter {
    fn history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        interval: Interval,
    ) -> Result<Vec<RawBar>, CandlecallError> {
        let conn = self.pool.get().map_err(pool_error)?;

        let start_str = start.format("%Y-%m-%d").to_string();
        let end_str = end.format("%Y-%m-%d").to_string();

        let mut stmt = conn
            .prepare(
                "SELECT ts, open, high, low, close
                 FROM candles
                 WHERE symbol = ?1 AND interval = ?2 AND ts >= ?3 AND ts < ?4
                 ORDER BY ts ASC",
            )
            .map_err(query_error)?;

        let rows = stmt
            .query_map(
                params![symbol, interval.as_str(), start_str, end_str],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<f64>>(1)?,
                        row.get::<_, Option<f64>>(2)?,
                        row.get::<_, Option<f64>>(3)?,
                        row.get::<_, Option<f64>>(4)?,
                    ))
                },
            )
            .map_err(query_error)?;

        let mut bars = Vec::new();
        for row in rows {
            let (ts, open, high, low, close) = row.map_err(query_error)?;
            bars.push(RawBar {
                timestamp: parse_ts(&ts)?,
                open,
                high,
                low,
                close,
            });
        }

        tracing::debug!(symbol, %interval, rows = bars.len(), "sqlite history");
        Ok(bars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapConfig(HashMap<(String, String), String>);

    impl ConfigPort for MapConfig {
        fn get_string(&self, section: &str, key: &str) -> Option<String> {
            self.0.get(&(section.to_string(), key.to_string())).cloned()
        }
        fn get_int(&self, _section: &str, _key: &str, default: i64) -> i64 {
            default
        }
        fn get_double(&self, _section: &str, _key: &str, default: f64) -> f64 {
            default
        }
        fn keys(&self, _section: &str) -> Vec<String> {
            Vec::new()
        }
    }

    fn bar(day: u32, close: Option<f64>) -> RawBar {
        RawBar {
            timestamp: NaiveDate::from_ymd_opt(2024, 1, day)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            open: Some(100.0),
            high: Some(101.0),
            low: Some(99.0),
            close,
        }
    }

    fn seeded() -> SqliteAdapter {
        let adapter = SqliteAdapter::in_memory().unwrap();
        adapter.initialize_schema().unwrap();
        adapter
            .insert_candles(
                "AAPL",
                Interval::Day1,
                &[bar(1, Some(100.5)), bar(2, Some(101.5)), bar(5, None)],
            )
            .unwrap();
        adapter
            .insert_candles("MSFT", Interval::Day1, &[bar(1, Some(300.0))])
            .unwrap();
        adapter
            .insert_candles("AAPL", Interval::Week1, &[bar(1, Some(100.5))])
            .unwrap();
        adapter
    }

    #[test]
    fn from_config_missing_path() {
        let config = MapConfig(HashMap::new());
        match SqliteAdapter::from_config(&config) {
            Err(CandlecallError::ConfigMissing { section, key }) => {
                assert_eq!(section, "sqlite");
                assert_eq!(key, "path");
            }
            Err(other) => panic!("expected ConfigMissing, got: {other}"),
            Ok(_) => panic!("expected error, got Ok"),
        }
    }

    #[test]
    fn from_config_creates_schema() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("candles.db");
        let mut map = HashMap::new();
        map.insert(
            ("sqlite".to_string(), "path".to_string()),
            path.display().to_string(),
        );

        let adapter = SqliteAdapter::from_config(&MapConfig(map)).unwrap();
        assert!(adapter.list_symbols(Interval::Day1).unwrap().is_empty());
    }

    #[test]
    fn history_filters_symbol_interval_and_window() {
        let adapter = seeded();
        let bars = adapter
            .history(
                "AAPL",
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
                Interval::Day1,
            )
            .unwrap();

        assert_eq!(bars.len(), 2);
        assert_eq!(bars[1].close, Some(101.5));
    }

    #[test]
    fn history_keeps_null_prices() {
        let adapter = seeded();
        let bars = adapter
            .history(
                "AAPL",
                NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 6).unwrap(),
                Interval::Day1,
            )
            .unwrap();

        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].close, None);
    }

    #[test]
    fn list_symbols_per_interval() {
        let adapter = seeded();
        assert_eq!(adapter.list_symbols(Interval::Day1).unwrap(), vec!["AAPL", "MSFT"]);
        assert_eq!(adapter.list_symbols(Interval::Week1).unwrap(), vec!["AAPL"]);
    }

    #[test]
    fn data_range_reports_bounds() {
        let adapter = seeded();
        let (min, max, count) = adapter.data_range("AAPL", Interval::Day1).unwrap().unwrap();
        assert_eq!(min.date(), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(max.date(), NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
        assert_eq!(count, 3);

        assert!(adapter.data_range("TSLA", Interval::Day1).unwrap().is_none());
    }

    #[test]
    fn reinserting_replaces_rows() {
        let adapter = seeded();
        adapter
            .insert_candles("AAPL", Interval::Day1, &[bar(5, Some(104.0))])
            .unwrap();
        let (_, _, count) = adapter.data_range("AAPL", Interval::Day1).unwrap().unwrap();
        assert_eq!(count, 3);
    }
}
