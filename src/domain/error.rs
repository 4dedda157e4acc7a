//! Domain error types.

use crate::domain::universe::UniverseError;

/// Top-level error type for candlecall.
#[derive(Debug, thiserror::Error)]
pub enum CandlecallError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("provider error: {reason}")]
    Provider { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Universe(#[from] UniverseError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&CandlecallError> for std::process::ExitCode {
    fn from(err: &CandlecallError) -> Self {
        let code: u8 = match err {
            CandlecallError::Io(_) => 1,
            CandlecallError::ConfigParse { .. }
            | CandlecallError::ConfigMissing { .. }
            | CandlecallError::ConfigInvalid { .. }
            | CandlecallError::Universe(_) => 2,
            CandlecallError::Database { .. } | CandlecallError::DatabaseQuery { .. } => 3,
            CandlecallError::Provider { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}

/// Discriminant of a [`FetchError`], kept by the game while it shows an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    NoData,
    MissingFields,
    InsufficientData,
    FetchFailed,
}

/// Why a market data fetch produced no playable series.
///
/// Every provider failure ends up here; nothing escapes the fetcher as a panic.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchError {
    #[error("no data found for {symbol} with interval {interval}")]
    NoData { symbol: String, interval: String },

    #[error("missing required price data for {symbol}: {field}")]
    MissingFields { symbol: String, field: &'static str },

    #[error("not enough data points for {symbol}: have {have}, need {need}")]
    InsufficientData {
        symbol: String,
        have: usize,
        need: usize,
    },

    #[error("error fetching data for {symbol}: {reason}")]
    FetchFailed { symbol: String, reason: String },
}

impl FetchError {
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            FetchError::NoData { .. } => FetchErrorKind::NoData,
            FetchError::MissingFields { .. } => FetchErrorKind::MissingFields,
            FetchError::InsufficientData { .. } => FetchErrorKind::InsufficientData,
            FetchError::FetchFailed { .. } => FetchErrorKind::FetchFailed,
        }
    }
}
