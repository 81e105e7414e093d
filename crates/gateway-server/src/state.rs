//! Shared application state.

use crate::orchestrator::Orchestrator;
use gateway_telemetry::Metrics;
use std::sync::Arc;
use std::time::Instant;

/// Default maximum request body (images are inlined as base64)
pub const DEFAULT_BODY_LIMIT: usize = 20 * 1024 * 1024;

/// State handed to every handler
#[derive(Clone)]
pub struct AppState {
    /// Request pipeline
    pub orchestrator: Arc<Orchestrator>,
    /// Metrics registry
    pub metrics: Metrics,
    /// Maximum accepted request body in bytes
    pub body_limit: usize,
    /// Process start, for uptime
    pub started_at: Instant,
}

impl AppState {
    /// Create state around an orchestrator; metrics are shared with it
    pub fn new(orchestrator: Orchestrator) -> Self {
        let metrics = orchestrator.metrics().clone();
        Self {
            orchestrator: Arc::new(orchestrator),
            metrics,
            body_limit: DEFAULT_BODY_LIMIT,
            started_at: Instant::now(),
        }
    }

    /// Set the request body limit
    #[must_use]
    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }
}
