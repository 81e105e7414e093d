//! Request orchestration.
//!
//! For each chat request: resolve identity, gate on quota, translate, open the
//! upstream stream, charge one unit of usage, then hand the stream to a relay.
//! Any failure before the relay starts is returned as a [`GatewayError`] with
//! no side effects beyond those already listed as done.

use crate::relay::spawn_relay;
use gateway_core::{
    bearer_token, ChatRequest, DownstreamEvent, GatewayError, IdentityResolver, LLMProvider,
    QuotaLedger, UserIdentity,
};
use gateway_telemetry::Metrics;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, error, field, info, instrument, warn, Span};

/// An admitted request whose events are being produced
#[derive(Debug)]
pub struct ChatStream {
    /// Who is being charged for this stream
    pub user: UserIdentity,
    /// Upstream model the request went to
    pub model: String,
    /// Downstream events, ending with `Done` or `Error`
    pub events: mpsc::Receiver<DownstreamEvent>,
}

/// Sequences the collaborators for one request
pub struct Orchestrator {
    identity: Arc<dyn IdentityResolver>,
    ledger: Arc<dyn QuotaLedger>,
    provider: Arc<dyn LLMProvider>,
    metrics: Metrics,
    channel_capacity: usize,
}

impl Orchestrator {
    /// Create an orchestrator
    pub fn new(
        identity: Arc<dyn IdentityResolver>,
        ledger: Arc<dyn QuotaLedger>,
        provider: Arc<dyn LLMProvider>,
        metrics: Metrics,
    ) -> Self {
        Self {
            identity,
            ledger,
            provider,
            metrics,
            channel_capacity: 32,
        }
    }

    /// Set the relay channel capacity
    #[must_use]
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Metrics shared with the relay
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Admit a request and start relaying its upstream stream.
    ///
    /// `authorization` is the raw `Authorization` header; `body` the raw
    /// request body. The body is only parsed once the caller is known to be
    /// authenticated and within quota.
    #[instrument(
        skip_all,
        fields(provider = %self.provider.id(), user_id = field::Empty, model = field::Empty)
    )]
    pub async fn handle(
        &self,
        authorization: Option<&str>,
        body: &[u8],
    ) -> Result<ChatStream, GatewayError> {
        let result = self.admit(authorization, body).await;
        match &result {
            Ok(_) => self.metrics.record_request("accepted"),
            Err(e) => {
                self.metrics.record_request(e.kind());
                match e.http_status() {
                    401 | 403 => info!(status = e.http_status(), error = %e, "Request rejected"),
                    _ => warn!(status = e.http_status(), error = %e, "Request failed"),
                }
            }
        }
        result
    }

    async fn admit(
        &self,
        authorization: Option<&str>,
        body: &[u8],
    ) -> Result<ChatStream, GatewayError> {
        let user = self.resolve_identity(authorization).await?;
        Span::current().record("user_id", user.as_str());

        let profile = self.ledger.read_profile(&user).await?;
        if !profile.has_remaining() {
            debug!(
                usage_count = profile.usage_count,
                usage_limit = profile.usage_limit,
                "Quota exhausted"
            );
            return Err(GatewayError::quota_exceeded());
        }

        let request = ChatRequest::from_slice(body)?;
        let prepared = self.provider.translate(&request)?;
        Span::current().record("model", prepared.model.as_str());
        let model = prepared.model.clone();

        let started = Instant::now();
        let opened = self.provider.open_stream(prepared).await;
        self.metrics.observe_upstream_latency(started.elapsed());
        let segments = opened?;

        // Charged once the upstream has accepted the call, whatever happens next.
        match self.ledger.increment_usage(&user).await {
            Ok(()) => self.metrics.record_usage_increment(true),
            Err(e) => {
                self.metrics.record_usage_increment(false);
                error!(error = %e, "Usage increment failed after upstream accepted the request");
            }
        }

        info!(
            usage_count = profile.usage_count + 1,
            usage_limit = profile.usage_limit,
            "Streaming response"
        );

        Ok(ChatStream {
            user,
            model,
            events: spawn_relay(segments, self.channel_capacity, self.metrics.clone()),
        })
    }

    async fn resolve_identity(
        &self,
        authorization: Option<&str>,
    ) -> Result<UserIdentity, GatewayError> {
        let token = bearer_token(authorization)?;
        self.identity.resolve(token).await.map_err(|e| match e {
            GatewayError::Authentication { .. } => e,
            other => {
                warn!(error = %other, "Identity resolver failed");
                GatewayError::authentication("Unauthorized")
            }
        })
    }
}
