//! Custom Axum extractors for the gateway.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use std::convert::Infallible;

/// Header carrying the request ID
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request ID assigned by the request ID middleware, or taken from headers
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for RequestId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(id) = parts.extensions.get::<Self>() {
            return Ok(id.clone());
        }

        let id = parts
            .headers
            .get(REQUEST_ID_HEADER)
            .or_else(|| parts.headers.get("x-correlation-id"))
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map_or_else(|| uuid::Uuid::new_v4().to_string(), String::from);

        Ok(Self(id))
    }
}

/// Raw `Authorization` header, if present and valid UTF-8.
///
/// Interpretation is left to the orchestrator so that a missing or malformed
/// credential is reported like any other authentication failure.
#[derive(Debug, Clone)]
pub struct AuthorizationHeader(pub Option<String>);

#[async_trait]
impl<S> FromRequestParts<S> for AuthorizationHeader
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(
            parts
                .headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(String::from),
        ))
    }
}
