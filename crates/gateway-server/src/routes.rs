//! Route definitions for the gateway API.

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::{handlers, middleware, state::AppState};

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.body_limit;

    Router::new()
        // Health and metrics
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        // Chat streaming, under the edge-function path and a versioned alias
        .route("/functions/v1/gemini-chat", post(handlers::chat_stream))
        .route("/v1/chat/stream", post(handlers::chat_stream))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(middleware::cors_layer())
        .with_state(state)
}
