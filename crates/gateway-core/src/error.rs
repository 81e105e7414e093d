//! Error types for the chat gateway.
//!
//! Every failure a request can hit before its event stream starts maps to one
//! `GatewayError` variant with a fixed HTTP status. Mid-stream failures use
//! [`GatewayError::Stream`] and are only ever surfaced as a terminal error event.

/// Result alias used across the gateway crates.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Gateway error type
#[derive(Debug, Clone, thiserror::Error)]
pub enum GatewayError {
    /// Missing or invalid credential, or unknown user
    #[error("{message}")]
    Authentication {
        /// Human-readable cause
        message: String,
    },

    /// The caller has used up their allowance
    #[error("{message}")]
    QuotaExceeded {
        /// Human-readable cause
        message: String,
    },

    /// The request body could not be mapped to the upstream schema
    #[error("Invalid request: {message}")]
    Translation {
        /// Human-readable cause
        message: String,
    },

    /// Gateway misconfiguration (missing key, bad endpoint)
    #[error("Configuration error: {message}")]
    Configuration {
        /// Human-readable cause
        message: String,
    },

    /// The ledger has no profile row for this identity
    #[error("Profile not found")]
    ProfileNotFound,

    /// The ledger could not be reached or answered unexpectedly
    #[error("Ledger error: {message}")]
    Ledger {
        /// Human-readable cause
        message: String,
    },

    /// The upstream model service rejected or failed the initial call
    #[error("{message}")]
    Upstream {
        /// Human-readable cause
        message: String,
        /// Upstream HTTP status, when one was received
        status: Option<u16>,
    },

    /// The upstream stream failed after it had been accepted
    #[error("{message}")]
    Stream {
        /// Human-readable cause
        message: String,
    },

    /// Unexpected internal failure
    #[error("Internal error: {message}")]
    Internal {
        /// Human-readable cause
        message: String,
    },
}

impl GatewayError {
    /// Create an authentication error
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    /// Create a quota exceeded error with the default user-facing message
    pub fn quota_exceeded() -> Self {
        Self::QuotaExceeded {
            message: "Usage limit exceeded. Please upgrade your plan.".to_string(),
        }
    }

    /// Create a translation error
    pub fn translation(message: impl Into<String>) -> Self {
        Self::Translation {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a ledger error
    pub fn ledger(message: impl Into<String>) -> Self {
        Self::Ledger {
            message: message.into(),
        }
    }

    /// Create an upstream error
    pub fn upstream(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::Upstream {
            message: message.into(),
            status,
        }
    }

    /// Create a mid-stream error
    pub fn stream(message: impl Into<String>) -> Self {
        Self::Stream {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// HTTP status code returned to the client for a pre-stream failure
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Authentication { .. } => 401,
            Self::QuotaExceeded { .. } => 403,
            Self::Translation { .. }
            | Self::Configuration { .. }
            | Self::ProfileNotFound
            | Self::Ledger { .. }
            | Self::Internal { .. } => 500,
            Self::Upstream { .. } | Self::Stream { .. } => 502,
        }
    }

    /// Short machine-readable kind, used as a log field and metric label
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Authentication { .. } => "auth_failure",
            Self::QuotaExceeded { .. } => "quota_exceeded",
            Self::Translation { .. } => "translation_error",
            Self::Configuration { .. } => "configuration_error",
            Self::ProfileNotFound => "profile_not_found",
            Self::Ledger { .. } => "ledger_error",
            Self::Upstream { .. } => "upstream_error",
            Self::Stream { .. } => "stream_error",
            Self::Internal { .. } => "internal_error",
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        Self::translation(err.to_string())
    }
}
