//! Acting user identity
//!
//! Authentication happens upstream; the caller's id arrives as an opaque
//! `x-actor-id` header and is only recorded, never interpreted.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use std::convert::Infallible;

pub const ACTOR_HEADER: &str = "x-actor-id";

/// Id recorded when no actor header is sent
pub const ANONYMOUS: &str = "anonymous";

/// Actor id from request headers, `anonymous` when absent or blank
pub fn actor_id(headers: &HeaderMap) -> String {
    headers
        .get(ACTOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(ANONYMOUS)
        .to_string()
}

/// Extractor for the acting user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Actor(actor_id(&parts.headers)))
    }
}
