//! Validated domain newtypes.

use crate::error::GatewayError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque user identifier produced by an identity resolver.
///
/// Immutable for the lifetime of a request and never persisted by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserIdentity(String);

impl UserIdentity {
    /// Wrap an identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Model identifier that is safe to splice into an upstream URL path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ModelId(String);

impl ModelId {
    /// Maximum accepted length
    pub const MAX_LEN: usize = 128;

    /// Validate and wrap a model identifier
    ///
    /// # Errors
    /// Returns a translation error if the identifier is empty, too long, or
    /// contains characters outside `[A-Za-z0-9._-]`
    pub fn new(id: impl AsRef<str>) -> Result<Self, GatewayError> {
        let id = id.as_ref();
        if id.is_empty() {
            return Err(GatewayError::translation("model cannot be empty"));
        }
        if id.len() > Self::MAX_LEN {
            return Err(GatewayError::translation(format!(
                "model identifier exceeds {} characters",
                Self::MAX_LEN
            )));
        }
        if !id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'-' | b'_'))
        {
            return Err(GatewayError::translation(format!(
                "invalid model identifier: {id}"
            )));
        }
        Ok(Self(id.to_string()))
    }

    /// Borrow the identifier
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
