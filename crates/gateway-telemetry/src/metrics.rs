//! Prometheus metrics for the gateway.

use crate::error::TelemetryError;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::time::Duration;

/// Gateway metrics backed by a dedicated registry
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    requests: IntCounterVec,
    stream_events: IntCounterVec,
    usage_increments: IntCounterVec,
    upstream_latency: Histogram,
    active_streams: IntGauge,
}

impl Metrics {
    /// Create and register all gateway metrics
    ///
    /// # Errors
    /// Returns error if a metric cannot be created or registered
    pub fn new() -> Result<Self, TelemetryError> {
        let registry = Registry::new();

        let requests = IntCounterVec::new(
            Opts::new("gateway_requests_total", "Chat requests by outcome"),
            &["outcome"],
        )?;
        let stream_events = IntCounterVec::new(
            Opts::new(
                "gateway_stream_events_total",
                "Downstream stream events by kind",
            ),
            &["kind"],
        )?;
        let usage_increments = IntCounterVec::new(
            Opts::new(
                "gateway_usage_increments_total",
                "Usage increment calls by result",
            ),
            &["result"],
        )?;
        let upstream_latency = Histogram::with_opts(
            HistogramOpts::new(
                "gateway_upstream_latency_seconds",
                "Time until the upstream accepted or rejected the call",
            )
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
        )?;
        let active_streams = IntGauge::new(
            "gateway_active_streams",
            "Streams currently being relayed",
        )?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(stream_events.clone()))?;
        registry.register(Box::new(usage_increments.clone()))?;
        registry.register(Box::new(upstream_latency.clone()))?;
        registry.register(Box::new(active_streams.clone()))?;

        Ok(Self {
            registry,
            requests,
            stream_events,
            usage_increments,
            upstream_latency,
            active_streams,
        })
    }

    /// Count a finished pre-stream phase (`accepted`, or an error kind)
    pub fn record_request(&self, outcome: &str) {
        self.requests.with_label_values(&[outcome]).inc();
    }

    /// Count one downstream event
    pub fn record_stream_event(&self, kind: &str) {
        self.stream_events.with_label_values(&[kind]).inc();
    }

    /// Count one usage increment attempt
    pub fn record_usage_increment(&self, success: bool) {
        let result = if success { "success" } else { "failure" };
        self.usage_increments.with_label_values(&[result]).inc();
    }

    /// Record how long the upstream took to answer the initial call
    pub fn observe_upstream_latency(&self, latency: Duration) {
        self.upstream_latency.observe(latency.as_secs_f64());
    }

    /// A relay started
    pub fn stream_started(&self) {
        self.active_streams.inc();
    }

    /// A relay finished
    pub fn stream_finished(&self) {
        self.active_streams.dec();
    }

    /// Render all metrics in the Prometheus text format
    pub fn gather(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if encoder.encode(&self.registry.gather(), &mut buffer).is_err() {
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }

    /// Current value of `gateway_requests_total{outcome}`
    pub fn request_count(&self, outcome: &str) -> u64 {
        self.requests.with_label_values(&[outcome]).get()
    }

    /// Current value of `gateway_stream_events_total{kind}`
    pub fn stream_event_count(&self, kind: &str) -> u64 {
        self.stream_events.with_label_values(&[kind]).get()
    }

    /// Current value of `gateway_active_streams`
    pub fn active_stream_count(&self) -> i64 {
        self.active_streams.get()
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let metrics = Metrics::new().unwrap();
        metrics.record_request("accepted");
        metrics.record_request("accepted");
        metrics.record_request("quota_exceeded");
        metrics.record_stream_event("delta");

        assert_eq!(metrics.request_count("accepted"), 2);
        assert_eq!(metrics.request_count("quota_exceeded"), 1);
        assert_eq!(metrics.stream_event_count("delta"), 1);
        assert_eq!(metrics.stream_event_count("done"), 0);
    }

    #[test]
    fn test_active_streams() {
        let metrics = Metrics::new().unwrap();
        metrics.stream_started();
        metrics.stream_started();
        metrics.stream_finished();
        assert_eq!(metrics.active_stream_count(), 1);
    }

    #[test]
    fn test_gather_text_format() {
        let metrics = Metrics::new().unwrap();
        metrics.record_usage_increment(true);
        metrics.observe_upstream_latency(Duration::from_millis(120));

        let text = metrics.gather();
        assert!(text.contains("gateway_usage_increments_total{result=\"success\"} 1"));
        assert!(text.contains("gateway_upstream_latency_seconds_count 1"));
    }

    #[test]
    fn test_independent_registries() {
        let a = Metrics::new().unwrap();
        let b = Metrics::new().unwrap();
        a.record_request("accepted");
        assert_eq!(b.request_count("accepted"), 0);
    }
}
