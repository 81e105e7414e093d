//! Request types for the gateway.
//!
//! The client sends `{messages, model?}`. Each message carries either a plain
//! string or an ordered list of tagged parts:
//!
//! - `{"type": "text", "text": "..."}`
//! - `{"type": "image_url", "image_url": {"url": "data:image/png;base64,..."}}`
//! - `{"type": "image", "mime_type": "image/png", "data": "<base64>"}`
//!
//! Image payloads are base64-decoded exactly once, while the body is parsed.

use crate::error::GatewayError;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};

/// Mime type assumed for data URLs that do not declare one
pub const DEFAULT_IMAGE_MIME_TYPE: &str = "image/jpeg";

/// Chat request as received from the client
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChatRequest {
    /// Conversation so far, oldest first
    pub messages: Vec<ChatMessage>,

    /// Target model; the configured default is used when absent
    #[serde(default)]
    pub model: Option<String>,
}

impl ChatRequest {
    /// Create a new builder for `ChatRequest`
    #[must_use]
    pub fn builder() -> ChatRequestBuilder {
        ChatRequestBuilder::default()
    }

    /// Parse a raw request body.
    ///
    /// # Errors
    /// Returns a translation error for malformed JSON, unknown roles or part
    /// tags, undecodable image data, or an empty message list
    pub fn from_slice(body: &[u8]) -> Result<Self, GatewayError> {
        let request: Self = serde_json::from_slice(body)?;
        if request.messages.is_empty() {
            return Err(GatewayError::translation("messages cannot be empty"));
        }
        Ok(request)
    }
}

/// Builder for `ChatRequest`
#[derive(Debug, Default)]
pub struct ChatRequestBuilder {
    messages: Vec<ChatMessage>,
    model: Option<String>,
}

impl ChatRequestBuilder {
    /// Set the model
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Add a message
    #[must_use]
    pub fn message(mut self, message: ChatMessage) -> Self {
        self.messages.push(message);
        self
    }

    /// Build the request
    #[must_use]
    pub fn build(self) -> ChatRequest {
        ChatRequest {
            messages: self.messages,
            model: self.model,
        }
    }
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System instructions
    System,
    /// End-user turn
    User,
    /// Model turn
    Assistant,
}

/// One chat message with its ordered content parts
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawMessage")]
pub struct ChatMessage {
    /// Who produced the message
    pub role: MessageRole,
    /// Content parts in their original order
    pub content: Vec<ContentPart>,
}

impl ChatMessage {
    /// Create a user message with a single text part
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: vec![ContentPart::text(text)],
        }
    }

    /// Create an assistant message with a single text part
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: vec![ContentPart::text(text)],
        }
    }

    /// Create a system message with a single text part
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: vec![ContentPart::text(text)],
        }
    }

    /// Create a message from explicit parts
    #[must_use]
    pub fn with_parts(role: MessageRole, content: Vec<ContentPart>) -> Self {
        Self { role, content }
    }
}

/// A single piece of message content
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPart {
    /// Plain text
    Text {
        /// The text
        text: String,
    },
    /// Binary image with its declared mime type
    Image {
        /// Declared mime type, e.g. `image/png`
        mime_type: String,
        /// Decoded image bytes
        data: Vec<u8>,
    },
}

impl ContentPart {
    /// Create a text part
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Create an image part from decoded bytes
    pub fn image(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self::Image {
            mime_type: mime_type.into(),
            data,
        }
    }
}

#[derive(Deserialize)]
struct RawMessage {
    role: MessageRole,
    content: RawContent,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawContent {
    Text(String),
    Parts(Vec<serde_json::Value>),
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RawPart {
    Text {
        text: String,
    },
    ImageUrl {
        image_url: RawImageUrl,
    },
    Image {
        #[serde(alias = "mimeType")]
        mime_type: String,
        data: String,
    },
}

#[derive(Deserialize)]
struct RawImageUrl {
    url: String,
}

impl TryFrom<RawMessage> for ChatMessage {
    type Error = GatewayError;

    fn try_from(raw: RawMessage) -> Result<Self, Self::Error> {
        let content = match raw.content {
            RawContent::Text(text) => vec![ContentPart::Text { text }],
            RawContent::Parts(parts) => parts
                .into_iter()
                .map(decode_part)
                .collect::<Result<Vec<_>, _>>()?,
        };

        Ok(Self {
            role: raw.role,
            content,
        })
    }
}

fn decode_part(value: serde_json::Value) -> Result<ContentPart, GatewayError> {
    let tag = value
        .get("type")
        .and_then(serde_json::Value::as_str)
        .unwrap_or("<missing>")
        .to_string();

    let raw: RawPart = serde_json::from_value(value).map_err(|e| {
        GatewayError::translation(format!("unsupported content part '{tag}': {e}"))
    })?;

    match raw {
        RawPart::Text { text } => Ok(ContentPart::Text { text }),
        RawPart::ImageUrl { image_url } => {
            let (mime_type, encoded) = parse_data_url(&image_url.url)?;
            Ok(ContentPart::Image {
                mime_type,
                data: decode_base64(encoded)?,
            })
        }
        RawPart::Image { mime_type, data } => Ok(ContentPart::Image {
            mime_type,
            data: decode_base64(&data)?,
        }),
    }
}

/// Split a `data:<mime>;base64,<payload>` URL into mime type and payload.
///
/// # Errors
/// Returns a translation error for non-data URLs and non-base64 data URLs
pub fn parse_data_url(url: &str) -> Result<(String, &str), GatewayError> {
    let rest = url.strip_prefix("data:").ok_or_else(|| {
        GatewayError::translation("only inline data URLs are supported for images")
    })?;
    let (meta, data) = rest
        .split_once(',')
        .ok_or_else(|| GatewayError::translation("malformed data URL"))?;
    let mime = meta
        .strip_suffix(";base64")
        .ok_or_else(|| GatewayError::translation("image data URL must be base64-encoded"))?;

    let mime = if mime.is_empty() {
        DEFAULT_IMAGE_MIME_TYPE
    } else {
        mime
    };
    Ok((mime.to_string(), data))
}

fn decode_base64(data: &str) -> Result<Vec<u8>, GatewayError> {
    STANDARD
        .decode(data.trim())
        .map_err(|e| GatewayError::translation(format!("invalid base64 image data: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_content() {
        let request =
            ChatRequest::from_slice(br#"{"messages":[{"role":"user","content":"hi"}]}"#).unwrap();

        assert_eq!(request.model, None);
        assert_eq!(request.messages, vec![ChatMessage::user("hi")]);
    }

    #[test]
    fn test_mixed_parts_keep_order() {
        let body = br#"{
            "model": "gemini-1.5-flash",
            "messages": [{
                "role": "user",
                "content": [
                    {"type": "text", "text": "what is this?"},
                    {"type": "image_url", "image_url": {"url": "data:image/png;base64,AAEC"}},
                    {"type": "image", "mime_type": "image/webp", "data": "/w=="},
                    {"type": "text", "text": "thanks"}
                ]
            }]
        }"#;

        let request = ChatRequest::from_slice(body).unwrap();
        assert_eq!(request.model.as_deref(), Some("gemini-1.5-flash"));
        assert_eq!(
            request.messages[0].content,
            vec![
                ContentPart::text("what is this?"),
                ContentPart::image("image/png", vec![0, 1, 2]),
                ContentPart::image("image/webp", vec![0xff]),
                ContentPart::text("thanks"),
            ]
        );
    }

    #[test]
    fn test_unknown_part_tag_is_translation_error() {
        let body = br#"{"messages":[{"role":"user","content":[{"type":"video","url":"x"}]}]}"#;
        let err = ChatRequest::from_slice(body).unwrap_err();

        assert!(matches!(err, GatewayError::Translation { .. }));
        assert!(err.to_string().contains("video"));
    }

    #[test]
    fn test_unknown_role_is_rejected() {
        let body = br#"{"messages":[{"role":"tool","content":"x"}]}"#;
        assert!(matches!(
            ChatRequest::from_slice(body),
            Err(GatewayError::Translation { .. })
        ));
    }

    #[test]
    fn test_invalid_base64_is_rejected() {
        let body = br#"{"messages":[{"role":"user","content":[{"type":"image","mime_type":"image/png","data":"***"}]}]}"#;
        let err = ChatRequest::from_slice(body).unwrap_err();
        assert!(err.to_string().contains("base64"));
    }

    #[test]
    fn test_empty_messages_rejected() {
        assert!(ChatRequest::from_slice(br#"{"messages":[]}"#).is_err());
        assert!(ChatRequest::from_slice(b"not json").is_err());
    }

    #[test]
    fn test_parse_data_url() {
        let (mime, data) = parse_data_url("data:image/png;base64,iVBORw0KGgo").unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(data, "iVBORw0KGgo");

        let (mime, _) = parse_data_url("data:;base64,AAAA").unwrap();
        assert_eq!(mime, DEFAULT_IMAGE_MIME_TYPE);

        assert!(parse_data_url("https://example.com/cat.png").is_err());
        assert!(parse_data_url("data:image/png,rawbytes").is_err());
    }

    #[test]
    fn test_builder() {
        let request = ChatRequest::builder()
            .model("gemini-1.5-pro")
            .message(ChatMessage::system("be brief"))
            .message(ChatMessage::user("hello"))
            .build();

        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, MessageRole::System);
    }
}
