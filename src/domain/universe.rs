//! Symbol universes and random symbol selection.
//!
//! Universes come from configuration as comma-separated code lists. A pick is
//! either uniform within one universe, uniform over every universe combined, or
//! the player's own symbol in custom mode.

use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in code list")]
    EmptyToken,

    #[error("duplicate code: {0}")]
    DuplicateCode(String),

    #[error("unknown universe: {0}")]
    UnknownUniverse(String),

    #[error("universe {0} has no symbols")]
    EmptyUniverse(String),

    #[error("custom symbol is empty")]
    EmptySymbol,
}

pub fn parse_codes(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut codes = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let code = trimmed.to_uppercase();
        if seen.contains(&code) {
            return Err(UniverseError::DuplicateCode(code));
        }
        seen.insert(code.clone());
        codes.push(code);
    }

    Ok(codes)
}

/// Trimmed, uppercased form of a user-typed symbol.
pub fn normalize_symbol(input: &str) -> String {
    input.trim().to_uppercase()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Universe {
    pub name: String,
    pub codes: Vec<String>,
}

impl Universe {
    pub fn count(&self) -> usize {
        self.codes.len()
    }
}

/// Named universes in configuration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Universes {
    universes: Vec<Universe>,
}

impl Universes {
    pub fn new(universes: Vec<Universe>) -> Self {
        Self { universes }
    }

    pub fn names(&self) -> Vec<&str> {
        self.universes.iter().map(|u| u.name.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&Universe> {
        self.universes.iter().find(|u| u.name == name)
    }

    /// Case-insensitive lookup, for names typed at a prompt.
    pub fn find(&self, name: &str) -> Option<&Universe> {
        let wanted = name.trim();
        self.universes
            .iter()
            .find(|u| u.name.eq_ignore_ascii_case(wanted))
    }

    pub fn all_codes(&self) -> Vec<&str> {
        self.universes
            .iter()
            .flat_map(|u| u.codes.iter().map(String::as_str))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.universes.is_empty()
    }
}

/// What the universe selector currently points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UniverseSelection {
    Named(String),
    Any,
    Custom,
}

impl UniverseSelection {
    pub fn is_custom(&self) -> bool {
        matches!(self, UniverseSelection::Custom)
    }
}

impl fmt::Display for UniverseSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UniverseSelection::Named(name) => f.write_str(name),
            UniverseSelection::Any => f.write_str("Any"),
            UniverseSelection::Custom => f.write_str("Custom"),
        }
    }
}

pub struct SymbolPicker<'a> {
    universes: &'a Universes,
}

impl<'a> SymbolPicker<'a> {
    pub fn new(universes: &'a Universes) -> Self {
        Self { universes }
    }

    pub fn pick<R: Rng + ?Sized>(
        &self,
        selection: &UniverseSelection,
        custom: &str,
        rng: &mut R,
    ) -> Result<String, UniverseError> {
        match selection {
            UniverseSelection::Custom => {
                let symbol = normalize_symbol(custom);
                if symbol.is_empty() {
                    return Err(UniverseError::EmptySymbol);
                }
                Ok(symbol)
            }
            UniverseSelection::Named(name) => {
                let universe = self
                    .universes
                    .get(name)
                    .ok_or_else(|| UniverseError::UnknownUniverse(name.clone()))?;
                universe
                    .codes
                    .choose(rng)
                    .cloned()
                    .ok_or_else(|| UniverseError::EmptyUniverse(name.clone()))
            }
            UniverseSelection::Any => self
                .universes
                .all_codes()
                .choose(rng)
                .map(|s| s.to_string())
                .ok_or_else(|| UniverseError::EmptyUniverse("Any".to_string())),
        }
    }
}
