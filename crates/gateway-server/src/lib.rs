//! # Gateway Server
//!
//! HTTP surface of the chat gateway:
//! - Axum router with the streaming chat endpoint, health and metrics
//! - Request orchestration (identity, quota, translation, upstream, usage)
//! - Stream relay from upstream segments to server-sent events
//! - Graceful shutdown

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod orchestrator;
pub mod relay;
pub mod routes;
pub mod server;
pub mod shutdown;
pub mod state;

pub use error::{ApiError, ServerError};
pub use orchestrator::{ChatStream, Orchestrator};
pub use relay::{relay, spawn_relay, RelayOutcome};
pub use routes::create_router;
pub use server::Server;
pub use shutdown::shutdown_signal;
pub use state::{AppState, DEFAULT_BODY_LIMIT};
