//! Telemetry errors.

/// Telemetry setup error
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// Failed to install the log subscriber
    #[error("Failed to initialize logging: {0}")]
    Init(String),
    /// Failed to create or register a metric
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}
