//! Identity resolution contract.

use crate::error::GatewayError;
use crate::types::UserIdentity;
use async_trait::async_trait;

/// Resolves a bearer credential to a user identity.
///
/// Implementations report every failure (bad token, unknown user, resolver
/// unreachable) as [`GatewayError::Authentication`].
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Resolve the bearer token (without the `Bearer ` prefix)
    async fn resolve(&self, token: &str) -> Result<UserIdentity, GatewayError>;
}

/// Extract the token from an `Authorization` header value.
///
/// # Errors
/// Returns an authentication error when the header is missing, not a bearer
/// credential, or empty
pub fn bearer_token(header: Option<&str>) -> Result<&str, GatewayError> {
    let header = header.ok_or_else(|| GatewayError::authentication("Missing Authorization header"))?;

    let token = header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .ok_or_else(|| {
            GatewayError::authentication("Invalid Authorization format. Expected: Bearer <token>")
        })?
        .trim();

    if token.is_empty() {
        return Err(GatewayError::authentication("Empty bearer token"));
    }
    Ok(token)
}
