//! Session state machine for the guessing game.
//!
//! The machine owns one [`SessionState`] and moves it between
//! [`GamePhase::Loading`], [`GamePhase::AwaitingPrediction`],
//! [`GamePhase::Revealing`] and [`GamePhase::Error`]. Every UI event is one
//! call to [`GameStateMachine::handle`]; a rejected event leaves the state
//! exactly as it was.
//!
//! Data loading is a side channel. [`GameStateMachine::begin_load`] hands out
//! a [`LoadTicket`] stamped with the current generation, and
//! [`GameStateMachine::complete_load`] drops any result whose generation has
//! since moved on (a reset or selector change happened while it was in
//! flight).
//!
//! Scoring happens once per reveal: `already_scored` is set on the first
//! reveal and cleared only by a new prediction, `Next`, a fresh load or a
//! reset.

use crate::domain::error::{FetchError, FetchErrorKind};
use crate::domain::fetcher::MarketDataFetcher;
use crate::domain::interval::Interval;
use crate::domain::ohlcv::{Candle, Series};
use crate::domain::settings::GameConfig;
use crate::domain::trend::{Direction, classify};
use crate::domain::universe::{SymbolPicker, UniverseError, UniverseSelection, normalize_symbol};
use chrono::NaiveDateTime;
use rand::Rng;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamePhase {
    Loading,
    AwaitingPrediction,
    Revealing,
    Error(FetchErrorKind),
}

impl fmt::Display for GamePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GamePhase::Loading => f.write_str("loading"),
            GamePhase::AwaitingPrediction => f.write_str("awaiting prediction"),
            GamePhase::Revealing => f.write_str("revealing"),
            GamePhase::Error(kind) => write!(f, "error ({kind:?})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    UniverseChanged(UniverseSelection),
    IntervalChanged(Interval),
    CustomSymbolChanged(String),
    PredictionCandleCountChanged(usize),
    PredictionSubmitted(Direction),
    NextRequested,
    ResetRequested,
}

impl GameEvent {
    pub fn name(&self) -> &'static str {
        match self {
            GameEvent::UniverseChanged(_) => "universe change",
            GameEvent::IntervalChanged(_) => "interval change",
            GameEvent::CustomSymbolChanged(_) => "custom symbol change",
            GameEvent::PredictionCandleCountChanged(_) => "prediction candle count change",
            GameEvent::PredictionSubmitted(_) => "prediction",
            GameEvent::NextRequested => "next",
            GameEvent::ResetRequested => "reset",
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GameError {
    #[error("{event} is not allowed while {phase}")]
    InvalidTransition {
        event: &'static str,
        phase: GamePhase,
    },

    #[error("not enough data points: have {have}, need {need}")]
    NotPlayable { have: usize, need: usize },

    #[error("interval {0} is not enabled")]
    UnsupportedInterval(Interval),

    #[error(transparent)]
    Universe(#[from] UniverseError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredictionRecord {
    pub direction: Direction,
    pub correct: bool,
}

/// Result of revealing the withheld candles.
#[derive(Debug, Clone, PartialEq)]
pub struct RevealOutcome {
    pub direction: Direction,
    /// `None` when the withheld run is too short to classify.
    pub actual: Option<Direction>,
    pub correct: bool,
    pub split_index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub score: i64,
    pub history: Vec<PredictionRecord>,
    pub active_symbol: String,
    pub custom_symbol: String,
    pub universe: UniverseSelection,
    pub active_interval: Interval,
    pub full_series: Option<Series>,
    /// Symbol and interval the held series was fetched for.
    pub series_source: Option<(String, Interval)>,
    pub prediction_candle_count: usize,
    pub predicted: bool,
    pub pending_direction: Option<Direction>,
    pub already_scored: bool,
    pub phase: GamePhase,
    pub generation: u64,
    pub last_error: Option<FetchError>,
    pub last_outcome: Option<RevealOutcome>,
}

impl SessionState {
    pub fn correct_count(&self) -> usize {
        self.history.iter().filter(|r| r.correct).count()
    }

    /// Share of correct predictions in percent, two decimals.
    pub fn accuracy_pct(&self) -> Option<f64> {
        if self.history.is_empty() {
            return None;
        }
        let pct = self.correct_count() as f64 / self.history.len() as f64 * 100.0;
        Some((pct * 100.0).round() / 100.0)
    }
}

/// Issued by [`GameStateMachine::begin_load`]; names what to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
    pub symbol: String,
    pub interval: Interval,
}

/// Read-only snapshot for the presentation layer.
#[derive(Debug)]
pub struct GameView<'a> {
    pub phase: GamePhase,
    pub symbol: &'a str,
    pub interval: Interval,
    pub universe: &'a UniverseSelection,
    pub score: i64,
    pub accuracy_pct: Option<f64>,
    pub total_predictions: usize,
    pub prediction_candle_count: usize,
    /// Candles to draw; the withheld tail is excluded unless revealing.
    pub candles: &'a [Candle],
    pub highlight_from: Option<usize>,
    pub playable: bool,
    pub required_points: usize,
    pub series_source: Option<&'a (String, Interval)>,
    pub period: Option<(NaiveDateTime, NaiveDateTime)>,
    pub error: Option<&'a FetchError>,
    pub outcome: Option<&'a RevealOutcome>,
}

pub struct GameStateMachine<R> {
    config: GameConfig,
    state: SessionState,
    rng: R,
}

impl<R: Rng> GameStateMachine<R> {
    pub fn new(config: GameConfig, mut rng: R) -> Result<Self, GameError> {
        let universe = config.default_universe.clone();
        let active_symbol = if universe.is_custom() {
            config.default_symbol.clone()
        } else {
            SymbolPicker::new(&config.universes).pick(&universe, "", &mut rng)?
        };

        let state = SessionState {
            score: 0,
            history: Vec::new(),
            active_symbol,
            custom_symbol: config.default_symbol.clone(),
            universe,
            active_interval: config.default_interval,
            full_series: None,
            series_source: None,
            prediction_candle_count: config.prediction.snap(config.prediction.default),
            predicted: false,
            pending_direction: None,
            already_scored: false,
            phase: GamePhase::Loading,
            generation: 0,
            last_error: None,
            last_outcome: None,
        };

        Ok(Self { config, state, rng })
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn required_points(&self) -> usize {
        self.config.min_required_points + self.state.prediction_candle_count
    }

    pub fn is_playable(&self) -> bool {
        self.state
            .full_series
            .as_ref()
            .is_some_and(|s| s.len() >= self.required_points())
    }

    pub fn handle(&mut self, event: GameEvent) -> Result<(), GameError> {
        tracing::debug!(event = event.name(), phase = %self.state.phase, "handling event");
        match event {
            GameEvent::UniverseChanged(selection) => self.change_universe(selection),
            GameEvent::IntervalChanged(interval) => self.change_interval(interval),
            GameEvent::CustomSymbolChanged(text) => self.change_custom_symbol(&text),
            GameEvent::PredictionCandleCountChanged(n) => self.change_prediction_count(n),
            GameEvent::PredictionSubmitted(direction) => self.submit_prediction(direction),
            GameEvent::NextRequested => self.next(),
            GameEvent::ResetRequested => {
                self.reset();
                Ok(())
            }
        }
    }

    fn change_universe(&mut self, selection: UniverseSelection) -> Result<(), GameError> {
        if selection == self.state.universe {
            return Ok(());
        }

        let symbol = if selection.is_custom() {
            if self.state.custom_symbol.is_empty() {
                self.config.default_symbol.clone()
            } else {
                self.state.custom_symbol.clone()
            }
        } else {
            SymbolPicker::new(&self.config.universes).pick(&selection, "", &mut self.rng)?
        };

        tracing::info!(universe = %selection, symbol = %symbol, "universe changed");
        self.state.universe = selection;
        self.state.active_symbol = symbol;
        self.mark_stale();
        Ok(())
    }

    fn change_interval(&mut self, interval: Interval) -> Result<(), GameError> {
        if !self.config.intervals.contains(&interval) {
            return Err(GameError::UnsupportedInterval(interval));
        }
        if interval == self.state.active_interval {
            return Ok(());
        }

        tracing::info!(%interval, "interval changed");
        self.state.active_interval = interval;
        self.mark_stale();
        Ok(())
    }

    fn change_custom_symbol(&mut self, text: &str) -> Result<(), GameError> {
        let symbol = normalize_symbol(text);
        if symbol.is_empty() {
            return Err(UniverseError::EmptySymbol.into());
        }

        self.state.custom_symbol = symbol.clone();
        if self.state.universe.is_custom() && symbol != self.state.active_symbol {
            tracing::info!(symbol = %symbol, "custom symbol changed");
            self.state.active_symbol = symbol;
            self.mark_stale();
        }
        Ok(())
    }

    fn change_prediction_count(&mut self, n: usize) -> Result<(), GameError> {
        // A scored reveal keeps the split it was scored on.
        if self.state.phase == GamePhase::Revealing {
            return Err(GameError::InvalidTransition {
                event: "prediction candle count change",
                phase: self.state.phase,
            });
        }
        self.state.prediction_candle_count = self.config.prediction.snap(n);
        Ok(())
    }

    fn submit_prediction(&mut self, direction: Direction) -> Result<(), GameError> {
        if self.state.phase != GamePhase::AwaitingPrediction {
            return Err(GameError::InvalidTransition {
                event: "prediction",
                phase: self.state.phase,
            });
        }
        if !self.is_playable() {
            return Err(GameError::NotPlayable {
                have: self.state.full_series.as_ref().map_or(0, Series::len),
                need: self.required_points(),
            });
        }

        self.state.pending_direction = Some(direction);
        self.state.predicted = true;
        self.state.already_scored = false;
        self.state.phase = GamePhase::Revealing;
        self.reveal()?;
        Ok(())
    }

    /// Shows the withheld candles and scores the pending prediction.
    ///
    /// Safe to call on every render while revealing: the score and history
    /// change only on the first call after a prediction.
    pub fn reveal(&mut self) -> Result<RevealOutcome, GameError> {
        let invalid = GameError::InvalidTransition {
            event: "reveal",
            phase: self.state.phase,
        };
        if self.state.phase != GamePhase::Revealing {
            return Err(invalid);
        }
        let direction = self.state.pending_direction.ok_or(invalid)?;
        let series = self
            .state
            .full_series
            .as_ref()
            .ok_or(GameError::NotPlayable {
                have: 0,
                need: self.config.min_required_points + self.state.prediction_candle_count,
            })?;

        let split_index = series
            .len()
            .saturating_sub(self.state.prediction_candle_count);
        let (_, withheld) = series.split_at(split_index);
        let actual = classify(withheld);
        let correct = actual == Some(direction);

        if !self.state.already_scored {
            self.state.history.push(PredictionRecord { direction, correct });
            self.state.score += if correct { 1 } else { -1 };
            self.state.already_scored = true;
            tracing::info!(
                symbol = %self.state.active_symbol,
                predicted = %direction,
                actual = ?actual,
                correct,
                score = self.state.score,
                "prediction scored"
            );
        }

        let outcome = RevealOutcome {
            direction,
            actual,
            correct,
            split_index,
        };
        self.state.last_outcome = Some(outcome.clone());
        Ok(outcome)
    }

    fn next(&mut self) -> Result<(), GameError> {
        if self.state.phase != GamePhase::Revealing {
            return Err(GameError::InvalidTransition {
                event: "next",
                phase: self.state.phase,
            });
        }

        let new_symbol = if self.state.universe.is_custom() {
            None
        } else {
            Some(
                SymbolPicker::new(&self.config.universes).pick(
                    &self.state.universe,
                    "",
                    &mut self.rng,
                )?,
            )
        };

        self.clear_prediction();
        self.state.last_outcome = None;
        match new_symbol {
            Some(symbol) => {
                tracing::info!(symbol = %symbol, "next round");
                self.state.active_symbol = symbol;
                self.mark_stale();
            }
            None => self.state.phase = GamePhase::AwaitingPrediction,
        }
        Ok(())
    }

    fn reset(&mut self) {
        let symbol = if self.state.universe.is_custom() {
            self.config.default_symbol.clone()
        } else {
            SymbolPicker::new(&self.config.universes)
                .pick(&self.state.universe, "", &mut self.rng)
                .unwrap_or_else(|_| self.config.default_symbol.clone())
        };

        tracing::info!(symbol = %symbol, "session reset");
        self.state.score = 0;
        self.state.history.clear();
        self.clear_prediction();
        self.state.active_symbol = symbol;
        self.state.custom_symbol = self.config.default_symbol.clone();
        self.state.active_interval = self.config.default_interval;
        self.state.prediction_candle_count =
            self.config.prediction.snap(self.config.prediction.default);
        self.state.full_series = None;
        self.state.series_source = None;
        self.state.last_error = None;
        self.state.last_outcome = None;
        self.mark_stale();
    }

    fn clear_prediction(&mut self) {
        self.state.predicted = false;
        self.state.already_scored = false;
        self.state.pending_direction = None;
    }

    fn mark_stale(&mut self) {
        self.state.generation += 1;
        self.state.phase = GamePhase::Loading;
    }

    /// Returns what to fetch when the session needs data.
    pub fn begin_load(&self) -> Option<LoadTicket> {
        if self.state.phase != GamePhase::Loading {
            return None;
        }
        Some(LoadTicket {
            generation: self.state.generation,
            symbol: self.state.active_symbol.clone(),
            interval: self.state.active_interval,
        })
    }

    /// Applies a fetch result. Returns `false` when the ticket is stale and
    /// the result was discarded.
    pub fn complete_load(&mut self, ticket: LoadTicket, result: Result<Series, FetchError>) -> bool {
        if ticket.generation != self.state.generation || self.state.phase != GamePhase::Loading {
            tracing::debug!(
                symbol = %ticket.symbol,
                ticket = ticket.generation,
                current = self.state.generation,
                "discarding stale load"
            );
            return false;
        }

        match result {
            Ok(series) => {
                tracing::info!(
                    symbol = %ticket.symbol,
                    interval = %ticket.interval,
                    candles = series.len(),
                    "series loaded"
                );
                self.state.full_series = Some(series);
                self.state.series_source = Some((ticket.symbol, ticket.interval));
                self.clear_prediction();
                self.state.last_error = None;
                self.state.last_outcome = None;
                self.state.phase = GamePhase::AwaitingPrediction;
            }
            Err(err) => {
                tracing::warn!(symbol = %ticket.symbol, error = %err, "load failed");
                self.state.phase = GamePhase::Error(err.kind());
                self.state.last_error = Some(err);
            }
        }
        true
    }

    /// Runs a pending load to completion. Returns `false` when nothing was due.
    pub fn load_with(&mut self, fetcher: &MarketDataFetcher<'_>, now: NaiveDateTime) -> bool {
        let Some(ticket) = self.begin_load() else {
            return false;
        };
        let result = fetcher.fetch(&ticket.symbol, ticket.interval, now, &mut self.rng);
        self.complete_load(ticket, result)
    }

    pub fn view(&self) -> GameView<'_> {
        let state = &self.state;
        let playable = self.is_playable();
        let count = state.prediction_candle_count;

        let (candles, highlight_from): (&[Candle], Option<usize>) = match &state.full_series {
            Some(series) if playable => {
                let split = series.len() - count;
                if state.phase == GamePhase::Revealing {
                    (series.candles(), Some(split))
                } else {
                    (series.split_at(split).0, None)
                }
            }
            _ => (&[], None),
        };

        let period = state
            .full_series
            .as_ref()
            .and_then(|s| Some((s.first_timestamp()?, s.last_timestamp()?)));

        GameView {
            phase: state.phase,
            symbol: &state.active_symbol,
            interval: state.active_interval,
            universe: &state.universe,
            score: state.score,
            accuracy_pct: state.accuracy_pct(),
            total_predictions: state.history.len(),
            prediction_candle_count: count,
            candles,
            highlight_from,
            playable,
            required_points: self.required_points(),
            series_source: state.series_source.as_ref(),
            period,
            error: state.last_error.as_ref(),
            outcome: state.last_outcome.as_ref(),
        }
    }
}
