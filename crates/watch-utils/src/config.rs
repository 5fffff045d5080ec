//! Process-level settings loaded from the environment

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while reading settings
#[derive(Debug, Error)]
pub enum SettingsError {
    /// A variable was set to a value we cannot interpret
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl FromStr for Environment {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(SettingsError::InvalidValue {
                key: "ENVIRONMENT".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines with file and line numbers
    Pretty,
    /// One JSON object per event
    Json,
}

impl FromStr for LogFormat {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(SettingsError::InvalidValue {
                key: "LOG_FORMAT".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// Main settings structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Application name, used as the default log target
    pub app_name: String,
    /// Deployment environment
    pub environment: Environment,
    /// Default log level when `RUST_LOG` is not set
    pub log_level: String,
    /// Log output format
    pub log_format: LogFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Self::for_environment(Environment::Development)
    }
}

impl Settings {
    /// Defaults for the given environment
    pub fn for_environment(environment: Environment) -> Self {
        match environment {
            Environment::Development => Self {
                app_name: "instrument-watch".to_string(),
                environment,
                log_level: "debug".to_string(),
                log_format: LogFormat::Pretty,
            },
            Environment::Production => Self {
                app_name: "instrument-watch".to_string(),
                environment,
                log_level: "warn".to_string(),
                log_format: LogFormat::Json,
            },
        }
    }

    /// Load `.env` (if present) and read settings from the process environment
    pub fn from_env() -> Result<Self, SettingsError> {
        // A missing .env file is normal outside development
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = match lookup("ENVIRONMENT") {
            Some(value) => value.parse()?,
            None => Environment::default(),
        };

        let mut settings = Self::for_environment(environment);

        if let Some(level) = lookup("LOG_LEVEL") {
            settings.log_level = level.trim().to_lowercase();
        }
        if let Some(format) = lookup("LOG_FORMAT") {
            settings.log_format = format.parse()?;
        }
        if let Some(name) = lookup("APP_NAME") {
            settings.app_name = name;
        }

        Ok(settings)
    }

    /// Whether this is a production deployment
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_development() {
        let settings = Settings::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(settings.environment, Environment::Development);
        assert_eq!(settings.log_level, "debug");
        assert_eq!(settings.log_format, LogFormat::Pretty);
        assert!(!settings.is_production());
    }

    #[test]
    fn test_production_defaults() {
        let settings = Settings::from_lookup(lookup_from(&[("ENVIRONMENT", "production")])).unwrap();
        assert!(settings.is_production());
        assert_eq!(settings.log_level, "warn");
        assert_eq!(settings.log_format, LogFormat::Json);
    }

    #[test]
    fn test_overrides() {
        let settings = Settings::from_lookup(lookup_from(&[
            ("ENVIRONMENT", "prod"),
            ("LOG_LEVEL", "INFO"),
            ("LOG_FORMAT", "pretty"),
        ]))
        .unwrap();
        assert_eq!(settings.log_level, "info");
        assert_eq!(settings.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_invalid_environment() {
        let result = Settings::from_lookup(lookup_from(&[("ENVIRONMENT", "staging")]));
        assert!(matches!(result, Err(SettingsError::InvalidValue { .. })));
    }
}
