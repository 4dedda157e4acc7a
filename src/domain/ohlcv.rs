//! OHLC candle and series representation.

use chrono::NaiveDateTime;

/// One complete OHLC observation.
#[derive(Debug, Clone, PartialEq)]
pub struct Candle {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// A provider row before validation. Providers may drop columns or emit nulls.
#[derive(Debug, Clone, PartialEq)]
pub struct RawBar {
    pub timestamp: NaiveDateTime,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
}

impl RawBar {
    /// Converts to a [`Candle`], or names the first absent field.
    pub fn to_candle(&self) -> Result<Candle, &'static str> {
        Ok(Candle {
            timestamp: self.timestamp,
            open: self.open.ok_or("open")?,
            high: self.high.ok_or("high")?,
            low: self.low.ok_or("low")?,
            close: self.close.ok_or("close")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SeriesError {
    #[error("timestamp {0} is not after the previous candle")]
    NotIncreasing(NaiveDateTime),
}

/// Candles with strictly increasing timestamps.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Series {
    candles: Vec<Candle>,
}

impl Series {
    pub fn new(candles: Vec<Candle>) -> Result<Self, SeriesError> {
        for pair in candles.windows(2) {
            if pair[1].timestamp <= pair[0].timestamp {
                return Err(SeriesError::NotIncreasing(pair[1].timestamp));
            }
        }
        Ok(Self { candles })
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    /// Splits into `[0, index)` and `[index, len)`. `index` is clamped to `len`.
    pub fn split_at(&self, index: usize) -> (&[Candle], &[Candle]) {
        self.candles.split_at(index.min(self.candles.len()))
    }

    pub fn first_timestamp(&self) -> Option<NaiveDateTime> {
        self.candles.first().map(|c| c.timestamp)
    }

    pub fn last_timestamp(&self) -> Option<NaiveDateTime> {
        self.candles.last().map(|c| c.timestamp)
    }
}
