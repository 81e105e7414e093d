//! Quota ledger contract.

use crate::error::GatewayError;
use crate::types::UserIdentity;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Usage snapshot for one user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Requests charged so far
    pub usage_count: u64,
    /// Requests allowed
    pub usage_limit: u64,
}

impl Profile {
    /// Create a profile snapshot
    #[must_use]
    pub fn new(usage_count: u64, usage_limit: u64) -> Self {
        Self {
            usage_count,
            usage_limit,
        }
    }

    /// Whether another request may be admitted
    #[must_use]
    pub fn has_remaining(&self) -> bool {
        self.usage_count < self.usage_limit
    }
}

/// Store of per-user usage counters.
///
/// The ledger owns its own concurrency control. Increments are not assumed to
/// be idempotent, so callers invoke [`QuotaLedger::increment_usage`] at most
/// once per admitted request.
#[async_trait]
pub trait QuotaLedger: Send + Sync {
    /// Read the current usage snapshot.
    ///
    /// Returns [`GatewayError::ProfileNotFound`] when no row exists.
    async fn read_profile(&self, user: &UserIdentity) -> Result<Profile, GatewayError>;

    /// Charge one request to the user
    async fn increment_usage(&self, user: &UserIdentity) -> Result<(), GatewayError>;
}
