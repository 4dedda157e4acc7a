//! Random historical window selection.
//!
//! A window ends a random number of days in the past and spans a fixed number
//! of days, both taken from the interval class's [`WindowPolicy`]. Boundaries
//! are calendar dates so a provider that expects date-only bounds never sees a
//! timezone-shifted day.

use crate::domain::interval::IntervalClass;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use rand::Rng;
use std::fmt;

/// Half-open `[start, end)` date range with `start < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    /// Moves `start` back by `days`, keeping `end`.
    pub fn widened(&self, days: i64) -> Self {
        Self {
            start: self.start - Duration::days(days),
            end: self.end,
        }
    }

    pub fn span_days(&self) -> i64 {
        (self.end - self.start).num_days()
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to {}",
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }
}

pub struct PeriodSampler;

impl PeriodSampler {
    pub fn sample<R: Rng + ?Sized>(
        class: IntervalClass,
        now: NaiveDateTime,
        rng: &mut R,
    ) -> DateWindow {
        let policy = class.policy();
        let days_back = rng.gen_range(policy.min_days_back..=policy.max_days_back);

        let today = now.date();
        let end = (now - Duration::days(days_back)).date().min(today);
        let start = end - Duration::days(policy.span_days);

        DateWindow { start, end }
    }
}
