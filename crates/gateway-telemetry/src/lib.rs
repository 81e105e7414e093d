//! # Gateway Telemetry
//!
//! Observability for the chat gateway:
//! - Structured logging via `tracing`
//! - Prometheus metrics for requests, stream events and usage increments

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::TelemetryError;
pub use logging::{init_logging, LogOutput, LoggingConfig};
pub use metrics::Metrics;
