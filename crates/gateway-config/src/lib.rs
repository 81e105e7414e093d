//! # Gateway Config
//!
//! Configuration management for the chat gateway.
//!
//! Configuration is an explicit [`GatewayConfig`] value built once at startup
//! from defaults, an optional YAML/TOML/JSON file named by `GATEWAY_CONFIG`,
//! and environment overrides. Nothing else in the gateway reads the environment.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod loader;

pub use config::{
    GatewayConfig, IdentityConfig, IdentityMode, LedgerConfig, LedgerMode, LogFormat,
    LoggingSettings, ProfileSeed, RelayConfig, ServerConfig, SupabaseConfig, UpstreamConfig,
};
pub use error::{ConfigError, Result};
pub use loader::{
    apply_env_overrides, load_config, load_from_file, parse_config, ConfigFormat, CONFIG_PATH_ENV,
};
