//! Sampling intervals and the lookback policy of each interval class.

use std::fmt;
use std::str::FromStr;

/// Provider-facing interval identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interval {
    Min1,
    Min2,
    Min5,
    Min15,
    Min30,
    Min60,
    Min90,
    Hour1,
    Day1,
    Day5,
    Week1,
    Month1,
    Month3,
}

/// Granularity group that decides how far back and how wide a window is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntervalClass {
    Intraday,
    Daily,
    Long,
}

/// Days-back range (inclusive) and window span for one interval class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPolicy {
    pub min_days_back: i64,
    pub max_days_back: i64,
    pub span_days: i64,
}

impl Interval {
    pub const ALL: [Interval; 13] = [
        Interval::Min1,
        Interval::Min2,
        Interval::Min5,
        Interval::Min15,
        Interval::Min30,
        Interval::Min60,
        Interval::Min90,
        Interval::Hour1,
        Interval::Day1,
        Interval::Day5,
        Interval::Week1,
        Interval::Month1,
        Interval::Month3,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::Min1 => "1m",
            Interval::Min2 => "2m",
            Interval::Min5 => "5m",
            Interval::Min15 => "15m",
            Interval::Min30 => "30m",
            Interval::Min60 => "60m",
            Interval::Min90 => "90m",
            Interval::Hour1 => "1h",
            Interval::Day1 => "1d",
            Interval::Day5 => "5d",
            Interval::Week1 => "1wk",
            Interval::Month1 => "1mo",
            Interval::Month3 => "3mo",
        }
    }

    pub fn class(&self) -> IntervalClass {
        match self {
            Interval::Min1
            | Interval::Min2
            | Interval::Min5
            | Interval::Min15
            | Interval::Min30
            | Interval::Min60
            | Interval::Min90
            | Interval::Hour1 => IntervalClass::Intraday,
            Interval::Day1 | Interval::Day5 => IntervalClass::Daily,
            Interval::Week1 | Interval::Month1 | Interval::Month3 => IntervalClass::Long,
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported interval: {0}")]
pub struct UnknownInterval(pub String);

impl FromStr for Interval {
    type Err = UnknownInterval;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Interval::ALL
            .iter()
            .copied()
            .find(|i| i.as_str() == trimmed)
            .ok_or_else(|| UnknownInterval(trimmed.to_string()))
    }
}

impl IntervalClass {
    pub fn policy(&self) -> WindowPolicy {
        match self {
            // Intraday providers cap lookback, so stay recent and narrow.
            IntervalClass::Intraday => WindowPolicy {
                min_days_back: 7,
                max_days_back: 30,
                span_days: 7,
            },
            IntervalClass::Daily => WindowPolicy {
                min_days_back: 60,
                max_days_back: 1200,
                span_days: 400,
            },
            IntervalClass::Long => WindowPolicy {
                min_days_back: 90,
                max_days_back: 4000,
                span_days: 1000,
            },
        }
    }
}

/// Parses a comma-separated interval list such as `1d, 1wk, 1h`.
pub fn parse_intervals(input: &str) -> Result<Vec<Interval>, UnknownInterval> {
    let mut intervals = Vec::new();
    for token in input.split(',') {
        if token.trim().is_empty() {
            continue;
        }
        let interval: Interval = token.parse()?;
        if !intervals.contains(&interval) {
            intervals.push(interval);
        }
    }
    Ok(intervals)
}
