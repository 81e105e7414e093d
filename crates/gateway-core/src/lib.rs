//! # Gateway Core
//!
//! Core types, traits, and error handling for the chat gateway.
//!
//! This crate provides the foundational types used throughout the gateway:
//! - Client request types and content parts
//! - Downstream stream events and their SSE framing
//! - Collaborator contracts (identity, quota ledger, upstream provider)
//! - Error types and handling

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod identity;
pub mod provider;
pub mod quota;
pub mod request;
pub mod streaming;
pub mod types;

// Re-export commonly used types
pub use error::{GatewayError, GatewayResult};
pub use identity::{bearer_token, IdentityResolver};
pub use provider::{LLMProvider, PreparedRequest, SegmentStream};
pub use quota::{Profile, QuotaLedger};
pub use request::{ChatMessage, ChatRequest, ContentPart, MessageRole};
pub use streaming::{DownstreamEvent, ErrorPayload, DONE_SENTINEL};
pub use types::{ModelId, UserIdentity};
