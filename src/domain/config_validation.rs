//! Configuration validation.
//!
//! Checks raw config values before a session starts, so a bad INI file fails
//! with a section/key pointer instead of a confusing in-game error.

use crate::domain::error::CandlecallError;
use crate::domain::interval::{Interval, parse_intervals};
use crate::domain::settings::default_universes;
use crate::domain::universe::parse_codes;
use crate::ports::config_port::ConfigPort;

pub fn validate_game_config(config: &dyn ConfigPort) -> Result<(), CandlecallError> {
    validate_intervals(config)?;
    validate_prediction_bounds(config)?;
    validate_min_required_points(config)?;
    validate_widen_days(config)?;
    validate_universes(config)?;
    validate_default_symbol(config)?;
    Ok(())
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> CandlecallError {
    CandlecallError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn validate_intervals(config: &dyn ConfigPort) -> Result<(), CandlecallError> {
    let intervals = match config.get_string("game", "intervals") {
        Some(list) => {
            let parsed = parse_intervals(&list)
                .map_err(|e| invalid("game", "intervals", e.to_string()))?;
            if parsed.is_empty() {
                return Err(invalid("game", "intervals", "at least one interval is required"));
            }
            parsed
        }
        None => Interval::ALL.to_vec(),
    };

    if let Some(default) = config.get_string("game", "default_interval") {
        let default: Interval = default
            .parse()
            .map_err(|e: crate::domain::interval::UnknownInterval| {
                invalid("game", "default_interval", e.to_string())
            })?;
        if !intervals.contains(&default) {
            return Err(invalid(
                "game",
                "default_interval",
                "default_interval must be one of the enabled intervals",
            ));
        }
    }
    Ok(())
}

fn validate_prediction_bounds(config: &dyn ConfigPort) -> Result<(), CandlecallError> {
    let min = config.get_int("game", "prediction_candles_min", 5);
    let max = config.get_int("game", "prediction_candles_max", 50);
    let step = config.get_int("game", "prediction_candles_step", 5);
    let default = config.get_int("game", "prediction_candles_default", 10);

    if min < 2 {
        return Err(invalid(
            "game",
            "prediction_candles_min",
            "prediction_candles_min must be at least 2",
        ));
    }
    if max < min {
        return Err(invalid(
            "game",
            "prediction_candles_max",
            "prediction_candles_max must not be below prediction_candles_min",
        ));
    }
    if step < 1 {
        return Err(invalid(
            "game",
            "prediction_candles_step",
            "prediction_candles_step must be positive",
        ));
    }
    if default < min || default > max {
        return Err(invalid(
            "game",
            "prediction_candles_default",
            "prediction_candles_default must lie within min and max",
        ));
    }
    Ok(())
}

fn validate_min_required_points(config: &dyn ConfigPort) -> Result<(), CandlecallError> {
    let value = config.get_int("game", "min_required_points", 70);
    if value < 1 {
        return Err(invalid(
            "game",
            "min_required_points",
            "min_required_points must be positive",
        ));
    }
    Ok(())
}

fn validate_widen_days(config: &dyn ConfigPort) -> Result<(), CandlecallError> {
    let value = config.get_int("game", "widen_days", 100);
    if value < 0 {
        return Err(invalid("game", "widen_days", "widen_days must be non-negative"));
    }
    Ok(())
}

fn validate_universes(config: &dyn ConfigPort) -> Result<(), CandlecallError> {
    let mut names = config.keys("universes");
    for name in &names {
        let codes = config.get_string("universes", name).unwrap_or_default();
        parse_codes(&codes).map_err(|e| invalid("universes", name, e.to_string()))?;
    }
    if names.is_empty() {
        names = default_universes()
            .names()
            .into_iter()
            .map(String::from)
            .collect();
    }

    if let Some(default) = config.get_string("game", "default_universe") {
        let default = default.trim();
        let known = default.eq_ignore_ascii_case("any")
            || default.eq_ignore_ascii_case("custom")
            || names.iter().any(|n| n.eq_ignore_ascii_case(default));
        if !known {
            return Err(invalid(
                "game",
                "default_universe",
                format!("unknown universe {default}"),
            ));
        }
    }
    Ok(())
}

fn validate_default_symbol(config: &dyn ConfigPort) -> Result<(), CandlecallError> {
    match config.get_string("game", "default_symbol") {
        Some(s) if s.trim().is_empty() => Err(invalid(
            "game",
            "default_symbol",
            "default_symbol must not be empty",
        )),
        _ => Ok(()),
    }
}
