//! Downstream streaming events.
//!
//! Each event is framed on the wire as `data: <payload>\n\n` where the payload is
//! `{"choices":[{"delta":{"content":"..."}}]}` for a delta, the literal
//! `[DONE]` for completion, and `{"error":"..."}` for a failure.

use serde::Serialize;

/// Literal payload that ends a successful stream
pub const DONE_SENTINEL: &str = "[DONE]";

/// Event delivered to the downstream client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownstreamEvent {
    /// A piece of generated text
    Delta {
        /// Text in upstream order
        text: String,
    },
    /// The stream failed; nothing follows
    Error {
        /// Human-readable cause
        message: String,
    },
    /// The stream completed; nothing follows
    Done,
}

impl DownstreamEvent {
    /// Create a delta event
    pub fn delta(text: impl Into<String>) -> Self {
        Self::Delta { text: text.into() }
    }

    /// Create an error event
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Metric/log label for the event kind
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Delta { .. } => "delta",
            Self::Error { .. } => "error",
            Self::Done => "done",
        }
    }

    /// Payload placed after `data: ` in the SSE frame
    #[must_use]
    pub fn sse_data(&self) -> String {
        match self {
            Self::Delta { text } => to_json(&DeltaPayload {
                choices: [DeltaChoice {
                    delta: DeltaContent { content: text },
                }],
            }),
            Self::Error { message } => to_json(&ErrorPayload { error: message }),
            Self::Done => DONE_SENTINEL.to_string(),
        }
    }
}

/// Body of a pre-stream error response and of an error event
#[derive(Debug, Serialize)]
pub struct ErrorPayload<'a> {
    /// Human-readable cause
    pub error: &'a str,
}

#[derive(Serialize)]
struct DeltaPayload<'a> {
    choices: [DeltaChoice<'a>; 1],
}

#[derive(Serialize)]
struct DeltaChoice<'a> {
    delta: DeltaContent<'a>,
}

#[derive(Serialize)]
struct DeltaContent<'a> {
    content: &'a str,
}

fn to_json<T: Serialize>(value: &T) -> String {
    // Only string fields are serialized, which cannot fail.
    serde_json::to_string(value).unwrap_or_default()
}
