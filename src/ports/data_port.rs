//! Market data access port.

use crate::domain::error::CandlecallError;
use crate::domain::interval::Interval;
use crate::domain::ohlcv::RawBar;
use chrono::NaiveDate;

/// An external price history source.
///
/// Implementations return rows for `[start, end)` in ascending time order and
/// may leave price fields empty when the source lacks them.
pub trait MarketDataPort {
    fn history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        interval: Interval,
    ) -> Result<Vec<RawBar>, CandlecallError>;
}
