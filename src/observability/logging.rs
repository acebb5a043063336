//! Structured logging configuration.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingSettings;

/// Environment variable holding the log filter directive.
pub const LOG_ENV: &str = "TREEGUARD_LOG";

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human readable single-line output.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Parses a format name, falling back to [`LogFormat::Text`].
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }
}

/// Resolved logging configuration.
#[derive(Debug)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// Event filter.
    pub filter: EnvFilter,
}

impl LoggingConfig {
    /// Builds the logging configuration.
    ///
    /// Precedence for the filter: `TREEGUARD_LOG`, `RUST_LOG`, the configured
    /// level, then `debug` when verbose or `info` otherwise.
    #[must_use]
    pub fn from_settings(settings: &LoggingSettings, verbose: bool) -> Self {
        let directive = std::env::var(LOG_ENV)
            .or_else(|_| std::env::var("RUST_LOG"))
            .ok()
            .or_else(|| settings.level.clone())
            .unwrap_or_else(|| if verbose { "debug" } else { "info" }.to_string());

        let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("info"));

        Self {
            format: settings.format,
            filter,
        }
    }
}
