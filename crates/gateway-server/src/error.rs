//! HTTP-facing errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use gateway_core::{ErrorPayload, GatewayError};

/// Error returned before a response stream starts; rendered as `{"error": "..."}`
#[derive(Debug, Clone)]
pub struct ApiError {
    /// HTTP status
    pub status: StatusCode,
    /// Message placed in the `error` field
    pub message: String,
}

impl ApiError {
    /// Create an error with an explicit status
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        let status =
            StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self::new(status, err.to_string())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.status.as_u16(), self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorPayload {
                error: &self.message,
            }),
        )
            .into_response()
    }
}

/// Server lifecycle errors
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The listener could not be bound
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        /// Address we tried to bind
        addr: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
    /// The server loop failed
    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}
