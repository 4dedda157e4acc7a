//! Core domain types and game logic.

pub mod ohlcv;
pub mod interval;
pub mod period;
pub mod trend;
pub mod universe;
pub mod settings;
pub mod fetcher;
pub mod game;
pub mod config_validation;
pub mod error;
