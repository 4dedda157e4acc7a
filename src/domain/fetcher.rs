//! Market data acquisition with a single widening retry.
//!
//! A fetch samples a random window for the interval class, asks the provider
//! for it, and if the result is shorter than the playable minimum asks once
//! more with the window's start pushed further back. Provider failures come
//! back as [`FetchError`] values so the caller can keep its session going.

use crate::domain::error::FetchError;
use crate::domain::interval::Interval;
use crate::domain::ohlcv::{RawBar, Series};
use crate::domain::period::{DateWindow, PeriodSampler};
use crate::ports::data_port::MarketDataPort;
use chrono::NaiveDateTime;
use rand::Rng;

pub const MIN_DATA_POINTS: usize = 70;
pub const WIDEN_DAYS: i64 = 100;

pub struct MarketDataFetcher<'a> {
    port: &'a dyn MarketDataPort,
    min_points: usize,
    widen_days: i64,
}

impl<'a> MarketDataFetcher<'a> {
    pub fn new(port: &'a dyn MarketDataPort) -> Self {
        Self {
            port,
            min_points: MIN_DATA_POINTS,
            widen_days: WIDEN_DAYS,
        }
    }

    pub fn with_limits(port: &'a dyn MarketDataPort, min_points: usize, widen_days: i64) -> Self {
        Self {
            port,
            min_points,
            widen_days,
        }
    }

    pub fn min_points(&self) -> usize {
        self.min_points
    }

    pub fn fetch<R: Rng + ?Sized>(
        &self,
        symbol: &str,
        interval: Interval,
        now: NaiveDateTime,
        rng: &mut R,
    ) -> Result<Series, FetchError> {
        let window = PeriodSampler::sample(interval.class(), now, rng);
        self.fetch_window(symbol, interval, window)
    }

    /// Fetches an explicit window. Issues one or two provider calls.
    pub fn fetch_window(
        &self,
        symbol: &str,
        interval: Interval,
        window: DateWindow,
    ) -> Result<Series, FetchError> {
        tracing::debug!(symbol, %interval, %window, "requesting history");
        let rows = self.request(symbol, interval, window)?;
        if rows.is_empty() {
            tracing::warn!(symbol, %interval, "provider returned no rows");
            return Err(FetchError::NoData {
                symbol: symbol.to_string(),
                interval: interval.to_string(),
            });
        }

        let series = to_series(symbol, rows)?;
        if series.len() >= self.min_points {
            return Ok(series);
        }

        let widened = window.widened(self.widen_days);
        tracing::debug!(
            symbol,
            have = series.len(),
            need = self.min_points,
            %widened,
            "series too short, widening window"
        );

        let rows = self.request(symbol, interval, widened)?;
        let series = to_series(symbol, rows)?;
        if series.len() < self.min_points {
            tracing::warn!(
                symbol,
                have = series.len(),
                need = self.min_points,
                "not enough data after widening"
            );
            return Err(FetchError::InsufficientData {
                symbol: symbol.to_string(),
                have: series.len(),
                need: self.min_points,
            });
        }

        Ok(series)
    }

    fn request(
        &self,
        symbol: &str,
        interval: Interval,
        window: DateWindow,
    ) -> Result<Vec<RawBar>, FetchError> {
        self.port
            .history(symbol, window.start, window.end, interval)
            .map_err(|e| {
                tracing::warn!(symbol, error = %e, "provider call failed");
                FetchError::FetchFailed {
                    symbol: symbol.to_string(),
                    reason: e.to_string(),
                }
            })
    }
}

fn to_series(symbol: &str, rows: Vec<RawBar>) -> Result<Series, FetchError> {
    let candles = rows
        .iter()
        .map(|row| row.to_candle())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|field| FetchError::MissingFields {
            symbol: symbol.to_string(),
            field,
        })?;

    Series::new(candles).map_err(|e| FetchError::FetchFailed {
        symbol: symbol.to_string(),
        reason: e.to_string(),
    })
}
