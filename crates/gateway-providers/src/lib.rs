//! # Gateway Providers
//!
//! Upstream model providers for the chat gateway.
//!
//! - Google AI (Gemini), streaming via `streamGenerateContent`

#![forbid(unsafe_code)]
#![warn(missing_docs)]

#[cfg(feature = "google")]
pub mod google;

#[cfg(feature = "google")]
pub mod google_stream;

#[cfg(feature = "google")]
pub use google::{GoogleConfig, GoogleProvider, DEFAULT_BASE_URL};

#[cfg(feature = "google")]
pub use google_stream::{GeminiStreamDecoder, JsonObjectScanner, DEFAULT_MAX_OBJECT_BYTES};
