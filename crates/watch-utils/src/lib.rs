//! Shared utilities for instrument-watch
//!
//! Environment-driven settings and tracing setup used by the binaries.

pub mod config;
pub mod logging;

pub use config::{Environment, LogFormat, Settings, SettingsError};
pub use logging::init_tracing;
