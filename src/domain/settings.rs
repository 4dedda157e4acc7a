//! Game settings: universes, intervals, defaults and prediction bounds.

use crate::domain::fetcher::{MIN_DATA_POINTS, WIDEN_DAYS};
use crate::domain::interval::Interval;
use crate::domain::universe::{Universe, UniverseSelection, Universes};

/// Allowed prediction-window sizes: `min..=max` in steps of `step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredictionBounds {
    pub min: usize,
    pub max: usize,
    pub step: usize,
    pub default: usize,
}

impl Default for PredictionBounds {
    fn default() -> Self {
        Self {
            min: 5,
            max: 50,
            step: 5,
            default: 10,
        }
    }
}

impl PredictionBounds {
    /// Rounds `n` to the nearest step and clamps it into range.
    pub fn snap(&self, n: usize) -> usize {
        let clamped = n.clamp(self.min, self.max);
        if self.step <= 1 {
            return clamped;
        }
        let offset = clamped - self.min;
        let steps = (offset + self.step / 2) / self.step;
        (self.min + steps * self.step).min(self.max)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GameConfig {
    pub universes: Universes,
    pub intervals: Vec<Interval>,
    pub default_symbol: String,
    pub default_interval: Interval,
    pub default_universe: UniverseSelection,
    pub prediction: PredictionBounds,
    pub min_required_points: usize,
    pub widen_days: i64,
}

impl Default for GameConfig {
    fn default() -> Self {
        let universes = default_universes();
        let default_universe = universes
            .names()
            .first()
            .map(|name| UniverseSelection::Named(name.to_string()))
            .unwrap_or(UniverseSelection::Custom);

        Self {
            universes,
            intervals: Interval::ALL.to_vec(),
            default_symbol: "AAPL".to_string(),
            default_interval: Interval::Day1,
            default_universe,
            prediction: PredictionBounds::default(),
            min_required_points: MIN_DATA_POINTS,
            widen_days: WIDEN_DAYS,
        }
    }
}

pub fn default_universes() -> Universes {
    let make = |name: &str, codes: &[&str]| Universe {
        name: name.to_string(),
        codes: codes.iter().map(|c| c.to_string()).collect(),
    };

    Universes::new(vec![
        make(
            "US Large Cap",
            &["AAPL", "MSFT", "AMZN", "GOOGL", "META", "NVDA", "JPM", "V", "XOM", "KO"],
        ),
        make(
            "Nifty 50",
            &["RELIANCE.NS", "TCS.NS", "HDFCBANK.NS", "INFY.NS", "ICICIBANK.NS", "ITC.NS"],
        ),
        make("Index ETFs", &["SPY", "QQQ", "DIA", "IWM"]),
    ])
}
