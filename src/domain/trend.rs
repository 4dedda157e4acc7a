//! Net trend of a candle run: compares the mean close of the leading and
//! trailing 30% slices.

use crate::domain::ohlcv::Candle;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "up" | "u" => Ok(Direction::Up),
            "down" | "d" => Ok(Direction::Down),
            other => Err(format!("unknown direction: {other}")),
        }
    }
}

const SLICE_FRACTION: f64 = 0.3;

/// Returns `None` for fewer than two candles.
///
/// Ties resolve to [`Direction::Down`]. With two or three candles the slice
/// size floors to zero, the leading mean is undefined, and the result is
/// `Down` as well.
pub fn classify(candles: &[Candle]) -> Option<Direction> {
    if candles.len() < 2 {
        return None;
    }

    let k = (candles.len() as f64 * SLICE_FRACTION) as usize;
    if k == 0 {
        return Some(Direction::Down);
    }

    let first_mean = mean_close(&candles[..k]);
    let last_mean = mean_close(&candles[candles.len() - k..]);

    if last_mean > first_mean {
        Some(Direction::Up)
    } else {
        Some(Direction::Down)
    }
}

fn mean_close(candles: &[Candle]) -> f64 {
    candles.iter().map(|c| c.close).sum::<f64>() / candles.len() as f64
}
