//! Authentication and authorization logic.
//!
//! Credential verification for humans and agents, refresh-token rotation,
//! the claim protocol that links agents to humans, identity resolution and
//! the ownership/family policy. Shared by every `solvr_api` handler.

pub mod api_keys;
pub mod claim;
pub mod jwt;
pub mod policy;
pub mod refresh;
pub mod registration;
pub mod resolver;
pub mod session;
pub mod tokens;
pub mod verifier;

use chrono::Duration;
use thiserror::Error;

/// Access token lifetime: 15 minutes.
pub const DEFAULT_ACCESS_TOKEN_TTL_SECS: i64 = 15 * 60;

/// Refresh token lifetime: 7 days.
pub const DEFAULT_REFRESH_TOKEN_TTL_DAYS: i64 = 7;

/// Deadline for a single credential lookup.
pub const DEFAULT_LOOKUP_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(2);

/// Authentication and authorization errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid token: {0}")]
    InvalidSignature(String),

    #[error("Expired: {0}")]
    Expired(String),

    #[error("Already used: {0}")]
    AlreadyUsed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    DbError(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Collapse "no such credential" into an authentication failure.
    ///
    /// A bearer key or refresh token that does not resolve is a bad
    /// credential from the caller's point of view, not a missing resource.
    pub fn into_credential_failure(self, message: &str) -> Self {
        match self {
            AuthError::NotFound(_) => AuthError::Unauthorized(message.to_string()),
            other => other,
        }
    }
}

/// Token lifetimes and signing material used by the verifier and issuers.
#[derive(Debug, Clone)]
pub struct TokenSettings {
    /// HS256 signing secret for access tokens.
    pub jwt_secret: String,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    /// Deadline for a credential store lookup; elapsed means deny.
    pub lookup_timeout: std::time::Duration,
}

impl TokenSettings {
    /// Settings with default lifetimes for the given secret.
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            access_token_ttl: Duration::seconds(DEFAULT_ACCESS_TOKEN_TTL_SECS),
            refresh_token_ttl: Duration::days(DEFAULT_REFRESH_TOKEN_TTL_DAYS),
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }
}
