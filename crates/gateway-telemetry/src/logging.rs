//! Structured logging setup.

use crate::error::TelemetryError;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Log line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogOutput {
    /// Human-readable, for terminals
    #[default]
    Pretty,
    /// One JSON object per line, for log shippers
    Json,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Service name recorded at startup
    pub service_name: String,
    /// Filter used when `RUST_LOG` is unset
    pub level: String,
    /// Line format
    pub output: LogOutput,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            service_name: "gemini-chat-gateway".to_string(),
            level: "info".to_string(),
            output: LogOutput::Pretty,
        }
    }
}

impl LoggingConfig {
    /// Create a logging configuration with the given default level
    #[must_use]
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            ..Default::default()
        }
    }

    /// Set the line format
    #[must_use]
    pub fn with_output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    /// Build the filter: `RUST_LOG` wins, then the configured level
    pub fn env_filter(&self) -> Result<EnvFilter, TelemetryError> {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => EnvFilter::try_new(&self.level)
                .map_err(|e| TelemetryError::Init(format!("invalid log level '{}': {e}", self.level))),
        }
    }
}

/// Install the global subscriber.
///
/// # Errors
/// Returns error if the level is not a valid filter or a subscriber is
/// already installed
pub fn init_logging(config: &LoggingConfig) -> Result<(), TelemetryError> {
    let filter = config.env_filter()?;

    let fmt_layer = match config.output {
        LogOutput::Pretty => fmt::layer().with_target(true).boxed(),
        LogOutput::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(fmt_layer.with_filter(filter))
        .try_init()
        .map_err(|e| TelemetryError::Init(e.to_string()))?;

    info!(
        service = %config.service_name,
        level = %config.level,
        output = ?config.output,
        "Logging initialized"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.output, LogOutput::Pretty);
    }

    #[test]
    fn test_builder() {
        let config = LoggingConfig::new("debug,hyper=warn").with_output(LogOutput::Json);
        assert_eq!(config.output, LogOutput::Json);
        assert!(config.env_filter().is_ok());
    }
}
