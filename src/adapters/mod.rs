//! Concrete adapter implementations for ports.

pub mod csv_adapter;
pub mod file_config_adapter;
#[cfg(feature = "sqlite")]
pub mod sqlite_adapter;
pub mod svg_chart;
#[cfg(feature = "yahoo")]
pub mod yahoo_adapter;
