//! Google Gemini provider.
//!
//! Talks to the Google AI Studio streaming endpoint:
//! `{base_url}/models/{MODEL}:streamGenerateContent`
//!
//! The response body is a JSON array of partial responses delivered in
//! arbitrary fragments; see [`crate::google_stream`] for how it is decoded.

use crate::google_stream::{GeminiStreamDecoder, DEFAULT_MAX_OBJECT_BYTES};
use async_stream::try_stream;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use futures_util::StreamExt;
use gateway_core::{
    ChatRequest, ContentPart, GatewayError, LLMProvider, MessageRole, ModelId, PreparedRequest,
    SegmentStream,
};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, Serializer};
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Default API root for Google AI Studio
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Header carrying the API key
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Google provider configuration
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    /// Provider instance ID
    pub id: String,
    /// API key
    pub api_key: SecretString,
    /// API root, without the `/models/...` suffix
    pub base_url: String,
    /// Model used when the request names none
    pub default_model: String,
    /// `generationConfig.maxOutputTokens`
    pub max_output_tokens: u32,
    /// TCP/TLS connect timeout
    pub connect_timeout: Duration,
    /// Time allowed until response headers arrive
    pub request_timeout: Duration,
    /// Time allowed between two body reads
    pub read_timeout: Duration,
    /// Largest unfinished response object buffered before the stream fails
    pub max_object_bytes: usize,
}

impl GoogleConfig {
    /// Create a Google AI Studio configuration with default limits
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            id: "google".to_string(),
            api_key: SecretString::new(api_key.into()),
            base_url: DEFAULT_BASE_URL.to_string(),
            default_model: "gemini-1.5-pro".to_string(),
            max_output_tokens: 4096,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
            read_timeout: Duration::from_secs(60),
            max_object_bytes: DEFAULT_MAX_OBJECT_BYTES,
        }
    }

    /// Set the API root
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the default model
    #[must_use]
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Set the output token limit
    #[must_use]
    pub fn with_max_output_tokens(mut self, tokens: u32) -> Self {
        self.max_output_tokens = tokens;
        self
    }

    /// Set the connect, request, and read timeouts
    #[must_use]
    pub fn with_timeouts(mut self, connect: Duration, request: Duration, read: Duration) -> Self {
        self.connect_timeout = connect;
        self.request_timeout = request;
        self.read_timeout = read;
        self
    }

    /// Set the largest response object the stream decoder will buffer
    #[must_use]
    pub fn with_max_object_bytes(mut self, limit: usize) -> Self {
        self.max_object_bytes = limit;
        self
    }
}

/// Google Gemini provider implementation
pub struct GoogleProvider {
    config: GoogleConfig,
    client: Client,
}

impl GoogleProvider {
    /// Create a new Google provider
    ///
    /// # Errors
    /// Returns error if the API key is empty or the HTTP client cannot be created
    pub fn new(config: GoogleConfig) -> Result<Self, GatewayError> {
        if config.api_key.expose_secret().trim().is_empty() {
            return Err(GatewayError::configuration(
                "API key is required for Google AI Studio",
            ));
        }

        // No overall timeout: it would cut long generations short.
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(100)
            .build()
            .map_err(|e| GatewayError::internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    /// Build the endpoint URL for a model
    fn endpoint_url(&self, model: &str) -> String {
        format!(
            "{}/models/{}:streamGenerateContent",
            self.config.base_url.trim_end_matches('/'),
            model
        )
    }

    /// Transform message parts to Google parts, preserving order
    fn transform_parts(parts: &[ContentPart]) -> Vec<GooglePart<'_>> {
        parts
            .iter()
            .map(|part| match part {
                ContentPart::Text { text } => GooglePart::Text { text },
                ContentPart::Image { mime_type, data } => GooglePart::InlineData {
                    inline_data: GoogleInlineData { mime_type, data },
                },
            })
            .collect()
    }

    /// Parse error response
    fn parse_error(status: u16, body: &str) -> GatewayError {
        #[derive(Deserialize)]
        struct GoogleErrorResponse {
            error: GoogleErrorDetail,
        }

        #[derive(Deserialize)]
        struct GoogleErrorDetail {
            message: String,
        }

        let detail = match serde_json::from_str::<GoogleErrorResponse>(body) {
            Ok(response) => response.error.message,
            Err(_) if body.trim().is_empty() => format!("HTTP {status}"),
            Err(_) => format!("HTTP {status}: {}", body.trim()),
        };
        GatewayError::upstream(format!("Gemini API error: {detail}"), Some(status))
    }
}

#[async_trait]
impl LLMProvider for GoogleProvider {
    fn id(&self) -> &str {
        &self.config.id
    }

    fn translate(&self, request: &ChatRequest) -> Result<PreparedRequest, GatewayError> {
        // A blank model counts as no model
        let model = ModelId::new(
            request
                .model
                .as_deref()
                .filter(|m| !m.trim().is_empty())
                .unwrap_or(&self.config.default_model),
        )?;

        let mut contents = Vec::with_capacity(request.messages.len());
        let mut system_parts = Vec::new();

        for message in &request.messages {
            match message.role {
                MessageRole::System => {
                    // Gemini takes system text out of band
                    for part in &message.content {
                        match part {
                            ContentPart::Text { text } => {
                                system_parts.push(GooglePart::Text { text });
                            }
                            ContentPart::Image { .. } => {
                                return Err(GatewayError::translation(
                                    "system messages may only contain text",
                                ));
                            }
                        }
                    }
                }
                MessageRole::User => contents.push(GoogleContent {
                    role: Some("user"),
                    parts: Self::transform_parts(&message.content),
                }),
                MessageRole::Assistant => contents.push(GoogleContent {
                    role: Some("model"),
                    parts: Self::transform_parts(&message.content),
                }),
            }
        }

        if contents.is_empty() {
            return Err(GatewayError::translation(
                "at least one user or assistant message is required",
            ));
        }

        let body = GoogleRequest {
            contents,
            system_instruction: (!system_parts.is_empty()).then(|| GoogleContent {
                role: None,
                parts: system_parts,
            }),
            generation_config: GoogleGenerationConfig {
                max_output_tokens: self.config.max_output_tokens,
            },
        };

        Ok(PreparedRequest {
            model: model.as_str().to_string(),
            body: serde_json::to_value(&body)?,
        })
    }

    async fn open_stream(&self, request: PreparedRequest) -> Result<SegmentStream, GatewayError> {
        let url = self.endpoint_url(&request.model);

        debug!(
            provider = "google",
            model = %request.model,
            url = %url,
            "Sending streaming request"
        );

        let started = Instant::now();
        let send = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, self.config.api_key.expose_secret())
            .json(&request.body)
            .send();

        let response = tokio::time::timeout(self.config.request_timeout, send)
            .await
            .map_err(|_| {
                error!(
                    timeout_ms = self.config.request_timeout.as_millis() as u64,
                    "Gemini API request timed out"
                );
                GatewayError::upstream("Gemini API request timed out", None)
            })?
            .map_err(|e| {
                let e = e.without_url();
                error!(error = %e, "Gemini API request failed");
                GatewayError::upstream(format!("Gemini API request failed: {e}"), None)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Gemini API rejected request");
            return Err(Self::parse_error(status.as_u16(), &body));
        }

        debug!(
            status = status.as_u16(),
            latency_ms = started.elapsed().as_millis() as u64,
            "Gemini stream opened"
        );

        let read_timeout = self.config.read_timeout;
        let max_object_bytes = self.config.max_object_bytes;
        let stream = try_stream! {
            let mut byte_stream = response.bytes_stream();
            let mut decoder = GeminiStreamDecoder::with_max_object_bytes(max_object_bytes);

            loop {
                let next = tokio::time::timeout(read_timeout, byte_stream.next())
                    .await
                    .map_err(|_| read_timed_out(read_timeout))?;

                let Some(chunk) = next else { break };
                let chunk = chunk.map_err(|e| {
                    GatewayError::stream(format!("Stream error: {}", e.without_url()))
                })?;

                for segment in decoder.feed(&chunk) {
                    yield segment?;
                }
            }

            let discarded = decoder.finish();
            if discarded > 0 {
                debug!(bytes = discarded, "Discarded unfinished trailing object");
            }
        };

        Ok(Box::pin(stream))
    }
}

fn read_timed_out(timeout: Duration) -> GatewayError {
    GatewayError::stream(format!("Upstream read timed out after {timeout:?}"))
}

// Google API Types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GoogleRequest<'a> {
    contents: Vec<GoogleContent<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GoogleContent<'a>>,
    generation_config: GoogleGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GoogleContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<GooglePart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GooglePart<'a> {
    Text {
        text: &'a str,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GoogleInlineData<'a>,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GoogleInlineData<'a> {
    mime_type: &'a str,
    #[serde(serialize_with = "serialize_base64")]
    data: &'a [u8],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GoogleGenerationConfig {
    max_output_tokens: u32,
}

fn serialize_base64<S: Serializer>(data: &&[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&STANDARD.encode(data))
}
