//! Process-local identity table and usage ledger.
//!
//! Used for development and tests; state is lost on restart.

use async_trait::async_trait;
use dashmap::DashMap;
use gateway_core::{GatewayError, IdentityResolver, Profile, QuotaLedger, UserIdentity};
use std::collections::HashMap;

/// Resolves tokens from a fixed token-to-user table
#[derive(Debug, Default)]
pub struct StaticIdentityResolver {
    tokens: HashMap<String, UserIdentity>,
}

impl StaticIdentityResolver {
    /// Create a resolver from a token to user ID table
    pub fn new<I, T, U>(tokens: I) -> Self
    where
        I: IntoIterator<Item = (T, U)>,
        T: Into<String>,
        U: Into<String>,
    {
        Self {
            tokens: tokens
                .into_iter()
                .map(|(token, user)| (token.into(), UserIdentity::new(user)))
                .collect(),
        }
    }
}

#[async_trait]
impl IdentityResolver for StaticIdentityResolver {
    async fn resolve(&self, token: &str) -> Result<UserIdentity, GatewayError> {
        self.tokens
            .get(token)
            .cloned()
            .ok_or_else(|| GatewayError::authentication("Unauthorized"))
    }
}

/// Usage counters held in memory
#[derive(Debug, Default)]
pub struct InMemoryQuotaLedger {
    profiles: DashMap<UserIdentity, Profile>,
}

impl InMemoryQuotaLedger {
    /// Create an empty ledger
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a profile row
    pub fn insert(&self, user: impl Into<String>, profile: Profile) {
        self.profiles.insert(UserIdentity::new(user), profile);
    }

    /// Add a profile row
    #[must_use]
    pub fn with_profile(self, user: impl Into<String>, profile: Profile) -> Self {
        self.insert(user, profile);
        self
    }

    /// Current snapshot of a profile
    pub fn profile(&self, user: &str) -> Option<Profile> {
        self.profiles
            .get(&UserIdentity::new(user))
            .map(|entry| *entry.value())
    }
}

#[async_trait]
impl QuotaLedger for InMemoryQuotaLedger {
    async fn read_profile(&self, user: &UserIdentity) -> Result<Profile, GatewayError> {
        self.profiles
            .get(user)
            .map(|entry| *entry.value())
            .ok_or(GatewayError::ProfileNotFound)
    }

    async fn increment_usage(&self, user: &UserIdentity) -> Result<(), GatewayError> {
        let mut entry = self
            .profiles
            .get_mut(user)
            .ok_or(GatewayError::ProfileNotFound)?;
        entry.usage_count = entry.usage_count.saturating_add(1);
        Ok(())
    }
}
