//! # Logging Bootstrap
//!
//! `tracing-subscriber` setup shared by host shells and integration tests.
//! Supports pretty, compact, and JSON output with env-filter directives
//! (explicit filter string, falling back to `RUST_LOG`, then `info`).

use crate::error::{Error, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable multi-line format for development.
    Pretty,
    /// Single-line format for terminals and CI.
    Compact,
    /// Structured JSON for machine ingestion.
    Json,
}

impl Default for LogFormat {
    fn default() -> Self {
        #[cfg(debug_assertions)]
        return Self::Pretty;

        #[cfg(not(debug_assertions))]
        return Self::Json;
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Default)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// Filter directives, e.g. `"core_playback=debug"`.
    pub filter: Option<String>,
}

impl LoggingConfig {
    /// Set the output format.
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Set explicit filter directives.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }
}

/// Install the global tracing subscriber.
///
/// # Errors
///
/// Fails if a global subscriber is already installed or the filter string
/// does not parse.
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let filter = match &config.filter {
        Some(directives) => {
            EnvFilter::try_new(directives).map_err(|e| Error::Logging(e.to_string()))?
        }
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let registry = tracing_subscriber::registry().with(filter);
    let result = match config.format {
        LogFormat::Pretty => registry.with(fmt::layer().pretty()).try_init(),
        LogFormat::Compact => registry.with(fmt::layer().compact()).try_init(),
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
    };
    result.map_err(|e| Error::Logging(e.to_string()))
}
