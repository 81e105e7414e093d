//! Build collaborators from [`GatewayConfig`].

use crate::jwt::JwtIdentityResolver;
use crate::memory::{InMemoryQuotaLedger, StaticIdentityResolver};
use crate::supabase::{SupabaseClientConfig, SupabaseIdentityResolver, SupabaseQuotaLedger};
use gateway_config::{GatewayConfig, IdentityMode, LedgerMode};
use gateway_core::{GatewayError, IdentityResolver, Profile, QuotaLedger};
use secrecy::SecretString;
use std::sync::Arc;
use tracing::{info, warn};

/// Create the identity resolver selected by `identity.mode`
pub fn identity_resolver(config: &GatewayConfig) -> Result<Arc<dyn IdentityResolver>, GatewayError> {
    match config.identity.mode {
        IdentityMode::Supabase => {
            let key = required(config.supabase.anon_key.as_ref(), "supabase.anon_key")?;
            info!(url = %config.supabase.url, "Using Supabase identity resolver");
            Ok(Arc::new(SupabaseIdentityResolver::new(SupabaseClientConfig::new(
                &config.supabase.url,
                key,
                config.supabase.timeout,
            ))?))
        }
        IdentityMode::Jwt => {
            let secret = required(config.supabase.jwt_secret.as_ref(), "supabase.jwt_secret")?;
            info!("Using local JWT identity resolver");
            Ok(Arc::new(JwtIdentityResolver::new(&secret)))
        }
        IdentityMode::Static => {
            warn!(
                tokens = config.identity.static_tokens.len(),
                "Using static identity table; not for production"
            );
            Ok(Arc::new(StaticIdentityResolver::new(
                config.identity.static_tokens.clone(),
            )))
        }
    }
}

/// Create the quota ledger selected by `ledger.mode`
pub fn quota_ledger(config: &GatewayConfig) -> Result<Arc<dyn QuotaLedger>, GatewayError> {
    match config.ledger.mode {
        LedgerMode::Supabase => {
            let key = required(
                config.supabase.service_role_key.as_ref(),
                "supabase.service_role_key",
            )?;
            info!(url = %config.supabase.url, "Using Supabase quota ledger");
            Ok(Arc::new(SupabaseQuotaLedger::new(SupabaseClientConfig::new(
                &config.supabase.url,
                key,
                config.supabase.timeout,
            ))?))
        }
        LedgerMode::Memory => {
            let ledger = InMemoryQuotaLedger::new();
            for (user, seed) in &config.ledger.profiles {
                ledger.insert(user.clone(), Profile::new(seed.usage_count, seed.usage_limit));
            }
            warn!(
                profiles = config.ledger.profiles.len(),
                "Using in-memory quota ledger; usage is lost on restart"
            );
            Ok(Arc::new(ledger))
        }
    }
}

fn required(secret: Option<&SecretString>, name: &str) -> Result<SecretString, GatewayError> {
    secret
        .cloned()
        .ok_or_else(|| GatewayError::configuration(format!("{name} is required")))
}
