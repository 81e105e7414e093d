//! Configuration loading: file, then environment, then validation.

use crate::config::{GatewayConfig, IdentityMode, LedgerMode, LogFormat};
use crate::error::{ConfigError, Result};
use secrecy::SecretString;
use std::path::Path;
use tracing::{debug, info};

/// Environment variable naming an optional config file
pub const CONFIG_PATH_ENV: &str = "GATEWAY_CONFIG";

/// On-disk config format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// `.yaml` / `.yml`
    Yaml,
    /// `.toml`
    Toml,
    /// `.json`
    Json,
}

impl ConfigFormat {
    /// Detect the format from a file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => Ok(Self::Yaml),
            Some("toml") => Ok(Self::Toml),
            Some("json") => Ok(Self::Json),
            other => Err(ConfigError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }
}

/// Load configuration from `$GATEWAY_CONFIG` (if set) and the process environment.
///
/// # Errors
/// Returns an error if the file cannot be read or parsed, an override is
/// malformed, or the result fails validation
pub async fn load_config() -> Result<GatewayConfig> {
    let mut config = match std::env::var(CONFIG_PATH_ENV) {
        Ok(path) if !path.is_empty() => load_from_file(&path).await?,
        _ => {
            debug!("No config file given, starting from defaults");
            GatewayConfig::default()
        }
    };

    apply_env_overrides(&mut config, |var| std::env::var(var).ok())?;
    config.validate_all()?;

    info!(
        upstream = %config.upstream.base_url,
        default_model = %config.upstream.default_model,
        identity = ?config.identity.mode,
        ledger = ?config.ledger.mode,
        "Configuration loaded"
    );

    Ok(config)
}

/// Read and parse a config file without validating it.
pub async fn load_from_file(path: impl AsRef<Path>) -> Result<GatewayConfig> {
    let path = path.as_ref();
    let format = ConfigFormat::from_path(path)?;
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

    debug!(path = %path.display(), ?format, "Parsing config file");
    parse_config(&contents, format)
}

/// Parse configuration text in the given format.
pub fn parse_config(contents: &str, format: ConfigFormat) -> Result<GatewayConfig> {
    match format {
        ConfigFormat::Yaml => {
            serde_yaml::from_str(contents).map_err(|e| ConfigError::parse(e.to_string()))
        }
        ConfigFormat::Toml => toml::from_str(contents).map_err(|e| ConfigError::parse(e.to_string())),
        ConfigFormat::Json => {
            serde_json::from_str(contents).map_err(|e| ConfigError::parse(e.to_string()))
        }
    }
}

/// Apply environment overrides using `lookup` to read variables.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(host) = lookup("GATEWAY_HOST") {
        config.server.host = host;
    }
    if let Some(port) = lookup("GATEWAY_PORT") {
        config.server.port = port.parse().map_err(|e| ConfigError::Env {
            var: "GATEWAY_PORT".to_string(),
            message: format!("{e}"),
        })?;
    }

    if let Some(key) = lookup("GEMINI_API_KEY") {
        config.upstream.api_key = Some(SecretString::new(key));
    }
    if let Some(model) = lookup("GEMINI_DEFAULT_MODEL") {
        config.upstream.default_model = model;
    }
    if let Some(url) = lookup("GEMINI_BASE_URL") {
        config.upstream.base_url = url;
    }

    if let Some(url) = lookup("SUPABASE_URL") {
        config.supabase.url = url;
    }
    if let Some(key) = lookup("SUPABASE_ANON_KEY") {
        config.supabase.anon_key = Some(SecretString::new(key));
    }
    if let Some(key) = lookup("SUPABASE_SERVICE_ROLE_KEY") {
        config.supabase.service_role_key = Some(SecretString::new(key));
    }
    if let Some(secret) = lookup("SUPABASE_JWT_SECRET") {
        config.supabase.jwt_secret = Some(SecretString::new(secret));
    }

    if let Some(mode) = lookup("GATEWAY_IDENTITY_MODE") {
        config.identity.mode = match mode.to_ascii_lowercase().as_str() {
            "supabase" => IdentityMode::Supabase,
            "jwt" => IdentityMode::Jwt,
            "static" => IdentityMode::Static,
            other => return Err(env_error("GATEWAY_IDENTITY_MODE", other)),
        };
    }
    if let Some(mode) = lookup("GATEWAY_LEDGER_MODE") {
        config.ledger.mode = match mode.to_ascii_lowercase().as_str() {
            "supabase" => LedgerMode::Supabase,
            "memory" => LedgerMode::Memory,
            other => return Err(env_error("GATEWAY_LEDGER_MODE", other)),
        };
    }

    if let Some(level) = lookup("GATEWAY_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(format) = lookup("GATEWAY_LOG_FORMAT") {
        config.logging.format = match format.to_ascii_lowercase().as_str() {
            "pretty" | "text" => LogFormat::Pretty,
            "json" => LogFormat::Json,
            other => return Err(env_error("GATEWAY_LOG_FORMAT", other)),
        };
    }

    Ok(())
}

fn env_error(var: &str, value: &str) -> ConfigError {
    ConfigError::Env {
        var: var.to_string(),
        message: format!("unrecognized value '{value}'"),
    }
}
