//! Chart rendering port.

use crate::domain::error::CandlecallError;
use crate::domain::ohlcv::Candle;

pub trait ChartPort {
    /// Renders `candles`, shading `[highlight_from, len)` when given.
    fn render(
        &self,
        candles: &[Candle],
        highlight_from: Option<usize>,
        title: &str,
    ) -> Result<String, CandlecallError>;
}
