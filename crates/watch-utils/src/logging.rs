//! Logging and tracing utilities

use crate::config::{LogFormat, Settings};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Build the filter: `RUST_LOG` wins, otherwise the settings' level
pub fn env_filter(settings: &Settings) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log_level))
}

/// Initialize the global tracing subscriber
///
/// Development builds get readable lines with source locations; production
/// builds emit JSON. Calling this twice is harmless: the second install is
/// ignored.
pub fn init_tracing(settings: &Settings) {
    let registry = tracing_subscriber::registry().with(env_filter(settings));

    let result = match settings.log_format {
        LogFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
    };

    if result.is_ok() {
        tracing::debug!(
            environment = %settings.environment,
            level = %settings.log_level,
            "Tracing initialized"
        );
    }
}
