//! Upstream model provider abstraction.

use crate::error::GatewayError;
use crate::request::ChatRequest;
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Stream of decoded text segments from an accepted upstream call.
///
/// Each item is one logical text segment, in upstream order. An `Err` item is a
/// mid-stream failure and is always the last item the stream yields.
pub type SegmentStream = BoxStream<'static, Result<String, GatewayError>>;

/// An upstream request body ready to send
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRequest {
    /// Resolved model identifier
    pub model: String,
    /// Provider-specific JSON body
    pub body: serde_json::Value,
}

/// A streaming chat backend
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Provider instance ID, used in logs and metrics
    fn id(&self) -> &str;

    /// Map a client request to the provider's schema without any I/O.
    ///
    /// # Errors
    /// Returns [`GatewayError::Translation`] when the request cannot be expressed
    fn translate(&self, request: &ChatRequest) -> Result<PreparedRequest, GatewayError>;

    /// Issue the streaming call.
    ///
    /// Resolves once the provider has accepted the call (success status). A
    /// rejected call, connect failure, or timeout is [`GatewayError::Upstream`].
    async fn open_stream(&self, request: PreparedRequest) -> Result<SegmentStream, GatewayError>;
}
