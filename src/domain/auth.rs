//! API key authentication and SIP permission checks

use crate::domain::context::RequestContext;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Grants management of trunks and dispatch rules
pub const SCOPE_SIP_ADMIN: &str = "sip:admin";
/// Grants placing outbound SIP calls
pub const SCOPE_SIP_CALL: &str = "sip:call";

/// Authentication error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Missing credentials")]
    MissingCredentials,
    #[error("Invalid API key")]
    InvalidApiKey,
    #[error("API key expired")]
    ExpiredApiKey,
    #[error("Insufficient permissions")]
    InsufficientPermissions,
}

impl AuthError {
    /// Whether the caller is known but lacks the grant
    pub fn is_forbidden(&self) -> bool {
        matches!(self, AuthError::InsufficientPermissions)
    }
}

/// API key for service-to-service authentication
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

fn default_enabled() -> bool {
    true
}

impl ApiKey {
    pub fn new(key: impl Into<String>, name: impl Into<String>, scopes: Vec<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            scopes,
            enabled: true,
            expires_at: None,
        }
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Utc::now() > at)
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }
}

/// Authentication method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    ApiKey,
    Internal,
}

/// Identity and grants of an authenticated caller
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub subject: String,
    pub scopes: Vec<String>,
    pub auth_method: AuthMethod,
}

impl AuthContext {
    pub fn new(subject: impl Into<String>, scopes: Vec<String>, auth_method: AuthMethod) -> Self {
        Self {
            subject: subject.into(),
            scopes,
            auth_method,
        }
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.scopes.iter().any(|s| s == permission)
    }
}

/// Resolves bearer API keys to an [`AuthContext`]
#[derive(Debug, Clone, Default)]
pub struct ApiKeyAuthenticator {
    keys: HashMap<String, ApiKey>,
}

impl ApiKeyAuthenticator {
    pub fn new(keys: impl IntoIterator<Item = ApiKey>) -> Self {
        Self {
            keys: keys.into_iter().map(|k| (k.key.clone(), k)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn authenticate(&self, key: &str) -> Result<AuthContext, AuthError> {
        let api_key = self.keys.get(key).ok_or(AuthError::InvalidApiKey)?;
        if !api_key.enabled {
            return Err(AuthError::InvalidApiKey);
        }
        if api_key.is_expired() {
            return Err(AuthError::ExpiredApiKey);
        }
        Ok(AuthContext::new(
            api_key.name.clone(),
            api_key.scopes.clone(),
            AuthMethod::ApiKey,
        ))
    }
}

/// Gate evaluated before every privileged SIP operation
#[cfg_attr(test, mockall::automock)]
pub trait PermissionChecker: Send + Sync {
    fn ensure_sip_admin(&self, ctx: &RequestContext) -> Result<(), AuthError>;
    fn ensure_sip_call(&self, ctx: &RequestContext) -> Result<(), AuthError>;
}

/// Checks the SIP scopes carried by the request's auth context
#[derive(Debug, Clone, Copy, Default)]
pub struct ScopePermissionChecker;

impl ScopePermissionChecker {
    fn ensure_scope(ctx: &RequestContext, scope: &str) -> Result<(), AuthError> {
        let auth = ctx.auth().ok_or(AuthError::MissingCredentials)?;
        if auth.has_permission(scope) {
            Ok(())
        } else {
            Err(AuthError::InsufficientPermissions)
        }
    }
}

impl PermissionChecker for ScopePermissionChecker {
    fn ensure_sip_admin(&self, ctx: &RequestContext) -> Result<(), AuthError> {
        Self::ensure_scope(ctx, SCOPE_SIP_ADMIN)
    }

    fn ensure_sip_call(&self, ctx: &RequestContext) -> Result<(), AuthError> {
        Self::ensure_scope(ctx, SCOPE_SIP_CALL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn authenticator() -> ApiKeyAuthenticator {
        let mut disabled = ApiKey::new("sk_disabled", "disabled", vec![]);
        disabled.enabled = false;
        ApiKeyAuthenticator::new(vec![
            ApiKey::new("sk_admin", "admin", vec![SCOPE_SIP_ADMIN.to_string()]),
            ApiKey::new("sk_old", "old", vec![SCOPE_SIP_ADMIN.to_string()])
                .with_expiry(Utc::now() - Duration::hours(1)),
            disabled,
        ])
    }

    #[test]
    fn test_authenticate_api_key() {
        let auth = authenticator().authenticate("sk_admin").unwrap();
        assert_eq!(auth.subject, "admin");
        assert_eq!(auth.auth_method, AuthMethod::ApiKey);
        assert!(auth.has_permission(SCOPE_SIP_ADMIN));
        assert!(!auth.has_permission(SCOPE_SIP_CALL));
    }

    #[test]
    fn test_authenticate_rejects_bad_keys() {
        let auth = authenticator();
        assert_eq!(auth.authenticate("nope").unwrap_err(), AuthError::InvalidApiKey);
        assert_eq!(auth.authenticate("sk_disabled").unwrap_err(), AuthError::InvalidApiKey);
        assert_eq!(auth.authenticate("sk_old").unwrap_err(), AuthError::ExpiredApiKey);
    }

    #[test]
    fn test_scope_permission_checker() {
        let checker = ScopePermissionChecker;

        let anonymous = RequestContext::new();
        assert_eq!(
            checker.ensure_sip_admin(&anonymous).unwrap_err(),
            AuthError::MissingCredentials
        );

        let admin = RequestContext::new().with_auth(AuthContext::new(
            "admin",
            vec![SCOPE_SIP_ADMIN.to_string()],
            AuthMethod::ApiKey,
        ));
        assert!(checker.ensure_sip_admin(&admin).is_ok());
        let err = checker.ensure_sip_call(&admin).unwrap_err();
        assert!(err.is_forbidden());
    }
}
