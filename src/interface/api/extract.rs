//! Request context extraction: bearer API key and request deadline

use super::error::ApiError;
use super::sip_handler::SipApiState;
use crate::domain::context::RequestContext;
use crate::domain::shared::DomainError;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use std::time::Duration;

/// Header carrying the caller's remaining budget in milliseconds
pub const REQUEST_TIMEOUT_HEADER: &str = "x-request-timeout-ms";

/// Per-request context built from the request headers.
///
/// A missing `Authorization` header yields an anonymous context; the service
/// rejects it at its permission check. An unknown key is rejected here.
#[derive(Debug, Clone)]
pub struct ApiContext(pub RequestContext);

fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, DomainError> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| DomainError::InvalidInput("invalid Authorization header".to_string()))?;
    match value.strip_prefix("Bearer ") {
        Some(token) => Ok(Some(token.trim())),
        None => Err(DomainError::InvalidInput(
            "Authorization must use the Bearer scheme".to_string(),
        )),
    }
}

fn request_timeout(headers: &HeaderMap) -> Result<Option<Duration>, DomainError> {
    let Some(value) = headers.get(REQUEST_TIMEOUT_HEADER) else {
        return Ok(None);
    };
    value
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(|ms| Some(Duration::from_millis(ms)))
        .ok_or_else(|| {
            DomainError::InvalidInput(format!("invalid {} header", REQUEST_TIMEOUT_HEADER))
        })
}

#[async_trait]
impl FromRequestParts<SipApiState> for ApiContext {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SipApiState,
    ) -> Result<Self, Self::Rejection> {
        let mut ctx = RequestContext::new();
        if let Some(token) = bearer_token(&parts.headers)? {
            let auth = state
                .authenticator
                .authenticate(token)
                .map_err(DomainError::from)?;
            ctx = ctx.with_auth(auth);
        }
        if let Some(timeout) = request_timeout(&parts.headers)? {
            ctx = ctx.with_timeout(timeout);
        }
        Ok(ApiContext(ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers).unwrap(), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer sk_live"));
        assert_eq!(bearer_token(&headers).unwrap(), Some("sk_live"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert!(bearer_token(&headers).is_err());
    }

    #[test]
    fn test_request_timeout() {
        let mut headers = HeaderMap::new();
        assert_eq!(request_timeout(&headers).unwrap(), None);

        headers.insert(REQUEST_TIMEOUT_HEADER, HeaderValue::from_static("5000"));
        assert_eq!(
            request_timeout(&headers).unwrap(),
            Some(Duration::from_secs(5))
        );

        headers.insert(REQUEST_TIMEOUT_HEADER, HeaderValue::from_static("soon"));
        assert!(matches!(
            request_timeout(&headers),
            Err(DomainError::InvalidInput(_))
        ));
    }
}
