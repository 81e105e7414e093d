//! Gateway configuration types.

use crate::error::{ConfigError, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use validator::Validate;

/// Root configuration handed to the gateway at construction
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct GatewayConfig {
    /// HTTP listener settings
    #[validate(nested)]
    pub server: ServerConfig,
    /// Upstream model service settings
    #[validate(nested)]
    pub upstream: UpstreamConfig,
    /// Supabase-compatible collaborator endpoints
    pub supabase: SupabaseConfig,
    /// How bearer credentials are resolved
    pub identity: IdentityConfig,
    /// Where usage counters live
    pub ledger: LedgerConfig,
    /// Stream relay settings
    #[validate(nested)]
    pub relay: RelayConfig,
    /// Log output settings
    pub logging: LoggingSettings,
}

impl GatewayConfig {
    /// Validate field ranges and cross-section requirements.
    pub fn validate_all(&self) -> Result<()> {
        Validate::validate(self).map_err(|e| ConfigError::invalid(e.to_string()))?;

        if is_blank(self.upstream.api_key.as_ref()) {
            return Err(ConfigError::invalid(
                "upstream.api_key is required (set GEMINI_API_KEY)",
            ));
        }

        let needs_supabase = self.identity.mode == IdentityMode::Supabase
            || self.ledger.mode == LedgerMode::Supabase;
        if needs_supabase {
            url::Url::parse(&self.supabase.url).map_err(|e| {
                ConfigError::invalid(format!("supabase.url is not a valid URL: {e}"))
            })?;
        }

        match self.identity.mode {
            IdentityMode::Supabase if is_blank(self.supabase.anon_key.as_ref()) => {
                return Err(ConfigError::invalid(
                    "supabase.anon_key is required for supabase identity (set SUPABASE_ANON_KEY)",
                ));
            }
            IdentityMode::Jwt if is_blank(self.supabase.jwt_secret.as_ref()) => {
                return Err(ConfigError::invalid(
                    "supabase.jwt_secret is required for jwt identity (set SUPABASE_JWT_SECRET)",
                ));
            }
            IdentityMode::Static if self.identity.static_tokens.is_empty() => {
                return Err(ConfigError::invalid(
                    "identity.static_tokens must not be empty in static mode",
                ));
            }
            _ => {}
        }

        if self.ledger.mode == LedgerMode::Supabase
            && is_blank(self.supabase.service_role_key.as_ref())
        {
            return Err(ConfigError::invalid(
                "supabase.service_role_key is required for the supabase ledger (set SUPABASE_SERVICE_ROLE_KEY)",
            ));
        }

        Ok(())
    }
}

fn is_blank(secret: Option<&SecretString>) -> bool {
    secret.map_or(true, |s| s.expose_secret().trim().is_empty())
}

/// HTTP listener settings
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    #[validate(length(min = 1))]
    pub host: String,
    /// Bind port
    pub port: u16,
    /// Maximum accepted request body in bytes
    #[validate(range(min = 1024))]
    pub request_body_limit: usize,
    /// Grace period for in-flight requests on shutdown
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_body_limit: 20 * 1024 * 1024,
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

/// Upstream model service settings
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct UpstreamConfig {
    /// API root, without the `/models/...` suffix
    #[validate(url)]
    pub base_url: String,
    /// API key sent in the `x-goog-api-key` header
    pub api_key: Option<SecretString>,
    /// Model used when the client does not name one
    #[validate(length(min = 1))]
    pub default_model: String,
    /// Generation limit sent with every request
    #[validate(range(min = 1))]
    pub max_output_tokens: u32,
    /// TCP/TLS connect timeout
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Time allowed until the upstream answers with a status line
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Time allowed between two body reads
    #[serde(with = "humantime_serde")]
    pub read_timeout: Duration,
    /// Largest unfinished response object buffered before the stream fails
    #[validate(range(min = 1024))]
    pub max_object_bytes: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            api_key: None,
            default_model: "gemini-1.5-pro".to_string(),
            max_output_tokens: 4096,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
            read_timeout: Duration::from_secs(60),
            max_object_bytes: 8 * 1024 * 1024,
        }
    }
}

/// Supabase-compatible collaborator endpoints
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SupabaseConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`
    pub url: String,
    /// Public anon key, sent as `apikey` on auth calls
    pub anon_key: Option<SecretString>,
    /// Service role key used for profile reads and increments
    pub service_role_key: Option<SecretString>,
    /// HS256 secret for local token verification
    pub jwt_secret: Option<SecretString>,
    /// Per-call timeout
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for SupabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            anon_key: None,
            service_role_key: None,
            jwt_secret: None,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Identity resolution strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityMode {
    /// Ask the Supabase auth endpoint
    #[default]
    Supabase,
    /// Verify HS256 tokens locally
    Jwt,
    /// Fixed token table (development)
    Static,
}

/// Identity settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Resolution strategy
    pub mode: IdentityMode,
    /// Token to user ID table for `static` mode
    pub static_tokens: HashMap<String, String>,
}

/// Ledger backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerMode {
    /// Supabase `profiles` table and `increment_usage` RPC
    #[default]
    Supabase,
    /// Process-local counters (development)
    Memory,
}

/// Seed row for the in-memory ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ProfileSeed {
    /// Starting usage
    #[serde(default)]
    pub usage_count: u64,
    /// Allowance
    pub usage_limit: u64,
}

/// Ledger settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Backend
    pub mode: LedgerMode,
    /// Initial rows for `memory` mode, keyed by user ID
    pub profiles: HashMap<String, ProfileSeed>,
}

/// Stream relay settings
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct RelayConfig {
    /// Events buffered between the upstream reader and the response writer
    #[validate(range(min = 1, max = 4096))]
    pub channel_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 32,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

/// Log output settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
    /// Output format
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}
