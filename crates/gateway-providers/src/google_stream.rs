//! Incremental decoding of Gemini `streamGenerateContent` bodies.
//!
//! The upstream body is a JSON array of response objects (or, with `alt=sse`,
//! one object per `data:` line) delivered in fragments that ignore every
//! logical boundary. [`JsonObjectScanner`] carries unresolved bytes across
//! fragments and yields each top-level object once it is complete;
//! [`GeminiStreamDecoder`] turns those objects into text segments.
//!
//! Scanning is done on raw bytes. JSON structural characters are ASCII and never
//! appear inside a UTF-8 multi-byte sequence, so a fragment boundary that splits
//! a character or an escape sequence cannot confuse the scanner. Text is only
//! decoded once a whole object is available.

use gateway_core::GatewayError;
use serde::Deserialize;

/// Default limit on a single buffered upstream object
pub const DEFAULT_MAX_OBJECT_BYTES: usize = 8 * 1024 * 1024;

/// Extracts complete top-level JSON objects from a fragmented byte stream.
///
/// Bytes outside an object (`[`, `,`, whitespace, `data:` prefixes) are
/// skipped. Bytes of an unfinished object stay buffered for the next fragment.
#[derive(Debug, Default)]
pub struct JsonObjectScanner {
    buffer: Vec<u8>,
    cursor: usize,
    object_start: Option<usize>,
    depth: usize,
    in_string: bool,
    escaped: bool,
}

impl JsonObjectScanner {
    /// Create an empty scanner
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment to the accumulation buffer
    pub fn push(&mut self, fragment: &[u8]) {
        self.compact();
        self.buffer.extend_from_slice(fragment);
    }

    /// Return the next complete object, or `None` if more input is needed
    pub fn next_object(&mut self) -> Option<Vec<u8>> {
        while self.cursor < self.buffer.len() {
            let byte = self.buffer[self.cursor];
            let at = self.cursor;
            self.cursor += 1;

            let Some(start) = self.object_start else {
                if byte == b'{' {
                    self.object_start = Some(at);
                    self.depth = 1;
                }
                continue;
            };

            if self.escaped {
                self.escaped = false;
            } else if self.in_string {
                match byte {
                    b'\\' => self.escaped = true,
                    b'"' => self.in_string = false,
                    _ => {}
                }
            } else {
                match byte {
                    b'"' => self.in_string = true,
                    b'{' | b'[' => self.depth += 1,
                    b'}' | b']' => {
                        self.depth -= 1;
                        if self.depth == 0 {
                            self.object_start = None;
                            return Some(self.buffer[start..=at].to_vec());
                        }
                    }
                    _ => {}
                }
            }
        }
        None
    }

    /// Number of buffered bytes belonging to an unfinished object
    #[must_use]
    pub fn partial_len(&self) -> usize {
        self.object_start
            .map_or(0, |start| self.buffer.len() - start)
    }

    /// Drop bytes that can no longer contribute to an object
    fn compact(&mut self) {
        let keep_from = self.object_start.unwrap_or(self.cursor);
        if keep_from > 0 {
            self.buffer.drain(..keep_from);
            self.cursor -= keep_from;
            if let Some(start) = self.object_start.as_mut() {
                *start -= keep_from;
            }
        }
    }
}

/// Turns upstream fragments into text segments in source order.
///
/// After an upstream failure payload, an undecodable object, or an object
/// that outgrows `max_object_bytes`, the decoder is poisoned and yields
/// nothing further.
#[derive(Debug)]
pub struct GeminiStreamDecoder {
    scanner: JsonObjectScanner,
    max_object_bytes: usize,
    failed: bool,
}

impl Default for GeminiStreamDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl GeminiStreamDecoder {
    /// Create a decoder with an empty buffer
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_object_bytes(DEFAULT_MAX_OBJECT_BYTES)
    }

    /// Create a decoder that fails once an unfinished object exceeds `limit` bytes
    #[must_use]
    pub fn with_max_object_bytes(limit: usize) -> Self {
        Self {
            scanner: JsonObjectScanner::new(),
            max_object_bytes: limit,
            failed: false,
        }
    }

    /// Feed one fragment and collect every segment it completes.
    ///
    /// The returned items are in upstream order; if one is an `Err` it is the
    /// last one and the decoder stops producing output.
    pub fn feed(&mut self, fragment: &[u8]) -> Vec<Result<String, GatewayError>> {
        let mut out = Vec::new();
        if self.failed {
            return out;
        }

        self.scanner.push(fragment);
        while let Some(object) = self.scanner.next_object() {
            match decode_object(&object) {
                Ok(texts) => out.extend(texts.into_iter().map(Ok)),
                Err(err) => {
                    self.failed = true;
                    out.push(Err(err));
                    return out;
                }
            }
        }

        let pending = self.scanner.partial_len();
        if pending > self.max_object_bytes {
            self.failed = true;
            out.push(Err(GatewayError::stream(format!(
                "Upstream object exceeds {} bytes",
                self.max_object_bytes
            ))));
        }
        out
    }

    /// End of input. Returns how many trailing bytes of an unfinished object
    /// were discarded.
    #[must_use]
    pub fn finish(self) -> usize {
        self.scanner.partial_len()
    }
}

/// Decode one complete response object into its non-empty text parts
fn decode_object(object: &[u8]) -> Result<Vec<String>, GatewayError> {
    let response: StreamResponse = serde_json::from_slice(object).map_err(|e| {
        GatewayError::stream(format!("Malformed upstream payload: {e}"))
    })?;

    if let Some(error) = response.error {
        return Err(GatewayError::stream(format!(
            "Gemini API error: {}",
            error.message
        )));
    }

    if response.candidates.is_empty() {
        if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(GatewayError::stream(format!(
                "Prompt blocked by upstream: {reason}"
            )));
        }
    }

    let texts = response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .filter(|text| !text.is_empty())
                .collect()
        })
        .unwrap_or_default();

    Ok(texts)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamResponse {
    #[serde(default)]
    candidates: Vec<StreamCandidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    error: Option<StreamErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct StreamCandidate {
    #[serde(default)]
    content: Option<StreamContent>,
}

#[derive(Debug, Deserialize)]
struct StreamContent {
    #[serde(default)]
    parts: Vec<StreamPart>,
}

#[derive(Debug, Deserialize)]
struct StreamPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamErrorDetail {
    #[serde(default)]
    message: String,
}
