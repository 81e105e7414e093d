//! # Gemini Chat Gateway
//!
//! Quota-gated streaming chat endpoint in front of the Gemini API.
//!
//! ## Usage
//!
//! ```bash
//! # Defaults plus environment
//! GEMINI_API_KEY=... SUPABASE_URL=... SUPABASE_ANON_KEY=... \
//!   SUPABASE_SERVICE_ROLE_KEY=... gemini-chat-gateway
//!
//! # With a config file
//! GATEWAY_CONFIG=/etc/gateway/config.yaml gemini-chat-gateway
//! ```

use anyhow::Context;
use gateway_config::{load_config, GatewayConfig, LogFormat};
use gateway_providers::{GoogleConfig, GoogleProvider};
use gateway_server::{AppState, Orchestrator, Server};
use gateway_telemetry::{init_logging, LogOutput, LoggingConfig, Metrics};
use secrecy::ExposeSecret;
use std::sync::Arc;
use tracing::{error, info};

/// Application entry point
#[tokio::main]
async fn main() {
    let config = match load_config().await {
        Ok(config) => config,
        Err(e) => {
            let _ = init_logging(&LoggingConfig::new("info"));
            error!(error = %e, "Failed to load configuration");
            std::process::exit(1);
        }
    };

    if let Err(e) = init_logging(&logging_config(&config)) {
        eprintln!("Failed to initialize logging: {e}");
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting Gemini chat gateway"
    );

    if let Err(e) = run(config).await {
        error!(error = format!("{e:#}"), "Application failed");
        std::process::exit(1);
    }
}

fn logging_config(config: &GatewayConfig) -> LoggingConfig {
    let output = match config.logging.format {
        LogFormat::Pretty => LogOutput::Pretty,
        LogFormat::Json => LogOutput::Json,
    };
    LoggingConfig::new(&config.logging.level).with_output(output)
}

/// Main application logic
async fn run(config: GatewayConfig) -> anyhow::Result<()> {
    info!(
        host = %config.server.host,
        port = config.server.port,
        identity = ?config.identity.mode,
        ledger = ?config.ledger.mode,
        "Configuration loaded"
    );

    let metrics = Metrics::new().context("failed to register metrics")?;

    let identity = gateway_accounts::identity_resolver(&config)
        .context("failed to create identity resolver")?;
    let ledger = gateway_accounts::quota_ledger(&config).context("failed to create quota ledger")?;
    let provider = create_provider(&config)?;

    let orchestrator = Orchestrator::new(identity, ledger, provider, metrics)
        .with_channel_capacity(config.relay.channel_capacity);
    let state = AppState::new(orchestrator).with_body_limit(config.server.request_body_limit);

    Server::new(&config.server, state).run().await?;

    info!("Gateway stopped");
    Ok(())
}

/// Create the Gemini provider from the upstream section
fn create_provider(config: &GatewayConfig) -> anyhow::Result<Arc<GoogleProvider>> {
    let upstream = &config.upstream;
    let api_key = upstream
        .api_key
        .as_ref()
        .context("upstream.api_key is not set")?;

    let google_config = GoogleConfig::new(api_key.expose_secret().as_str())
        .with_base_url(&upstream.base_url)
        .with_default_model(&upstream.default_model)
        .with_max_output_tokens(upstream.max_output_tokens)
        .with_timeouts(
            upstream.connect_timeout,
            upstream.request_timeout,
            upstream.read_timeout,
        )
        .with_max_object_bytes(upstream.max_object_bytes);

    let provider = GoogleProvider::new(google_config).context("failed to create Gemini provider")?;
    info!(
        model = %upstream.default_model,
        "Gemini provider initialized"
    );
    Ok(Arc::new(provider))
}
