//! Supabase-backed identity resolver and quota ledger.
//!
//! - identity: `GET /auth/v1/user` with the caller's bearer token
//! - profile read: `GET /rest/v1/profiles?id=eq.<id>&select=usage_count,usage_limit`
//! - increment: `POST /rest/v1/rpc/increment_usage` with `{"user_id": <id>}`

use async_trait::async_trait;
use gateway_core::{GatewayError, IdentityResolver, Profile, QuotaLedger, UserIdentity};
use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Connection settings shared by both Supabase clients
#[derive(Debug, Clone)]
pub struct SupabaseClientConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`
    pub url: String,
    /// Key sent as `apikey` (anon key for auth, service role key for the ledger)
    pub key: SecretString,
    /// Per-call timeout
    pub timeout: Duration,
}

impl SupabaseClientConfig {
    /// Create a new client config
    pub fn new(url: impl Into<String>, key: SecretString, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            key,
            timeout,
        }
    }

    fn build_client(&self) -> Result<Client, GatewayError> {
        Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.timeout)
            .build()
            .map_err(|e| GatewayError::internal(format!("Failed to create HTTP client: {e}")))
    }

    /// Build the full URL for an API path
    fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.url.trim_end_matches('/'), path)
    }
}

/// Resolves bearer tokens through the Supabase auth API
pub struct SupabaseIdentityResolver {
    config: SupabaseClientConfig,
    http_client: Client,
}

impl SupabaseIdentityResolver {
    /// Create a resolver; `config.key` is the project's anon key
    pub fn new(config: SupabaseClientConfig) -> Result<Self, GatewayError> {
        let http_client = config.build_client()?;
        Ok(Self {
            config,
            http_client,
        })
    }
}

#[derive(Deserialize)]
struct SupabaseUser {
    #[serde(default)]
    id: String,
}

#[async_trait]
impl IdentityResolver for SupabaseIdentityResolver {
    #[instrument(skip_all)]
    async fn resolve(&self, token: &str) -> Result<UserIdentity, GatewayError> {
        let url = self.config.build_url("/auth/v1/user");
        let response = self
            .http_client
            .get(&url)
            .header("apikey", self.config.key.expose_secret())
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Identity lookup failed");
                GatewayError::authentication("Unauthorized")
            })?;

        let status = response.status();
        if !status.is_success() {
            debug!(status = status.as_u16(), "Token rejected by identity service");
            return Err(GatewayError::authentication("Unauthorized"));
        }

        let user: SupabaseUser = response.json().await.map_err(|e| {
            warn!(error = %e, "Unreadable identity response");
            GatewayError::authentication("Unauthorized")
        })?;

        if user.id.is_empty() {
            return Err(GatewayError::authentication("Unauthorized"));
        }
        Ok(UserIdentity::new(user.id))
    }
}

/// Reads and increments usage through the Supabase REST API
pub struct SupabaseQuotaLedger {
    config: SupabaseClientConfig,
    http_client: Client,
}

impl SupabaseQuotaLedger {
    /// Create a ledger client; `config.key` is the service role key
    pub fn new(config: SupabaseClientConfig) -> Result<Self, GatewayError> {
        let http_client = config.build_client()?;
        Ok(Self {
            config,
            http_client,
        })
    }

    /// Add service role headers to a request builder
    fn add_auth(&self, builder: RequestBuilder) -> RequestBuilder {
        let key = self.config.key.expose_secret();
        builder.header("apikey", key).bearer_auth(key)
    }
}

#[derive(Deserialize)]
struct ProfileRow {
    usage_count: u64,
    usage_limit: u64,
}

#[derive(Serialize)]
struct IncrementUsage<'a> {
    user_id: &'a str,
}

#[async_trait]
impl QuotaLedger for SupabaseQuotaLedger {
    #[instrument(skip_all, fields(user_id = %user))]
    async fn read_profile(&self, user: &UserIdentity) -> Result<Profile, GatewayError> {
        let url = self.config.build_url("/rest/v1/profiles");
        let response = self
            .add_auth(self.http_client.get(&url))
            .query(&[
                ("id", format!("eq.{user}")),
                ("select", "usage_count,usage_limit".to_string()),
            ])
            .send()
            .await
            .map_err(|e| GatewayError::ledger(format!("Profile read failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::ledger(format!(
                "Profile read returned HTTP {}",
                status.as_u16()
            )));
        }

        let rows: Vec<ProfileRow> = response
            .json()
            .await
            .map_err(|e| GatewayError::ledger(format!("Unreadable profile row: {e}")))?;

        rows.into_iter()
            .next()
            .map(|row| Profile::new(row.usage_count, row.usage_limit))
            .ok_or(GatewayError::ProfileNotFound)
    }

    #[instrument(skip_all, fields(user_id = %user))]
    async fn increment_usage(&self, user: &UserIdentity) -> Result<(), GatewayError> {
        let url = self.config.build_url("/rest/v1/rpc/increment_usage");
        let response = self
            .add_auth(self.http_client.post(&url))
            .json(&IncrementUsage {
                user_id: user.as_str(),
            })
            .send()
            .await
            .map_err(|e| GatewayError::ledger(format!("Usage increment failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::ledger(format!(
                "Usage increment returned HTTP {}",
                status.as_u16()
            )));
        }
        Ok(())
    }
}
