//! Local HS256 verification of Supabase access tokens.

use async_trait::async_trait;
use gateway_core::{GatewayError, IdentityResolver, UserIdentity};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Audience Supabase puts on signed-in user tokens
pub const DEFAULT_AUDIENCE: &str = "authenticated";

#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(default)]
    sub: String,
}

/// Resolves identities by verifying the token signature with the project's
/// JWT secret; the `sub` claim is the user ID.
pub struct JwtIdentityResolver {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtIdentityResolver {
    /// Create a resolver with the default audience and a 60s leeway
    #[must_use]
    pub fn new(secret: &SecretString) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 60;
        validation.set_audience(&[DEFAULT_AUDIENCE]);
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            decoding_key: DecodingKey::from_secret(secret.expose_secret().as_bytes()),
            validation,
        }
    }

    /// Set the accepted audiences
    #[must_use]
    pub fn with_audiences(mut self, audiences: &[&str]) -> Self {
        self.validation.set_audience(audiences);
        self
    }

    /// Set clock skew leeway
    #[must_use]
    pub fn with_leeway(mut self, leeway: Duration) -> Self {
        self.validation.leeway = leeway.as_secs();
        self
    }
}

#[async_trait]
impl IdentityResolver for JwtIdentityResolver {
    async fn resolve(&self, token: &str) -> Result<UserIdentity, GatewayError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            debug!(error = %e, "JWT validation failed");
            GatewayError::authentication("Unauthorized")
        })?;

        if data.claims.sub.is_empty() {
            return Err(GatewayError::authentication("Unauthorized"));
        }
        Ok(UserIdentity::new(data.claims.sub))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, get_current_timestamp, EncodingKey, Header};
    use serde::Serialize;

    const SECRET: &str = "super-secret-jwt-token-with-at-least-32-characters";

    #[derive(Serialize)]
    struct TestClaims<'a> {
        sub: &'a str,
        aud: &'a str,
        exp: u64,
    }

    fn sign(claims: &TestClaims<'_>, secret: &str) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn resolver() -> JwtIdentityResolver {
        JwtIdentityResolver::new(&SecretString::new(SECRET.to_string()))
    }

    #[tokio::test]
    async fn test_valid_token() {
        let token = sign(
            &TestClaims {
                sub: "user-42",
                aud: DEFAULT_AUDIENCE,
                exp: get_current_timestamp() + 3600,
            },
            SECRET,
        );

        let identity = resolver().resolve(&token).await.unwrap();
        assert_eq!(identity.as_str(), "user-42");
    }

    #[tokio::test]
    async fn test_expired_token() {
        let token = sign(
            &TestClaims {
                sub: "user-42",
                aud: DEFAULT_AUDIENCE,
                exp: get_current_timestamp() - 3600,
            },
            SECRET,
        );

        let err = resolver().resolve(&token).await.unwrap_err();
        assert_eq!(err.http_status(), 401);
    }

    #[tokio::test]
    async fn test_wrong_secret() {
        let token = sign(
            &TestClaims {
                sub: "user-42",
                aud: DEFAULT_AUDIENCE,
                exp: get_current_timestamp() + 3600,
            },
            "another-secret-entirely-different-from-the-first",
        );

        assert!(resolver().resolve(&token).await.is_err());
    }

    #[tokio::test]
    async fn test_wrong_audience() {
        let token = sign(
            &TestClaims {
                sub: "user-42",
                aud: "anon",
                exp: get_current_timestamp() + 3600,
            },
            SECRET,
        );

        assert!(resolver().resolve(&token).await.is_err());
        let custom = resolver().with_audiences(&["anon"]);
        assert!(custom.resolve(&token).await.is_ok());
    }

    #[tokio::test]
    async fn test_garbage_token() {
        assert!(matches!(
            resolver().resolve("not.a.jwt").await,
            Err(GatewayError::Authentication { .. })
        ));
    }
}
