//! HTTP request handlers for the gateway API.

use axum::{
    body::Bytes,
    extract::State,
    http::header,
    response::{
        sse::{Event, Sse},
        IntoResponse, Response,
    },
    Json,
};
use serde::Serialize;
use std::convert::Infallible;
use tracing::{debug, instrument};

use crate::{
    error::ApiError,
    extractors::{AuthorizationHeader, RequestId},
    state::AppState,
};

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Version
    pub version: String,
    /// Uptime in seconds
    pub uptime_seconds: u64,
}

/// Liveness endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    })
}

/// Metrics endpoint (Prometheus format)
pub async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.gather(),
    )
}

/// Streaming chat endpoint.
///
/// Pre-stream failures come back as JSON errors; once admitted, the response is
/// an event stream of `data: ...` frames ending in `[DONE]` or an error frame.
#[instrument(skip_all, fields(request_id = %request_id))]
pub async fn chat_stream(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    AuthorizationHeader(authorization): AuthorizationHeader,
    body: Bytes,
) -> Result<Response, ApiError> {
    debug!(body_bytes = body.len(), "Processing chat request");

    let stream = state
        .orchestrator
        .handle(authorization.as_deref(), &body)
        .await?;

    let mut events = stream.events;
    let sse_stream = async_stream::stream! {
        while let Some(event) = events.recv().await {
            yield Ok::<_, Infallible>(Event::default().data(event.sse_data()));
        }
    };

    Ok(Sse::new(sse_stream).into_response())
}
