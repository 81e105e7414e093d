//! Configuration error types.

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Configuration error type.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read config file {path}: {source}")]
    Io {
        /// File path
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The configuration file has an unknown extension.
    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),

    /// The configuration file could not be parsed.
    #[error("Failed to parse config: {0}")]
    Parse(String),

    /// An environment override has an invalid value.
    #[error("Invalid value for {var}: {message}")]
    Env {
        /// Variable name
        var: String,
        /// Cause
        message: String,
    },

    /// The configuration failed validation.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Create a validation error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }
}
