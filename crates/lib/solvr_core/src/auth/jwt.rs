//! JWT access token generation and verification.

use std::path::PathBuf;

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use tracing::info;

use super::AuthError;
use crate::models::auth::{AccessTokenClaims, HumanPrincipal, Role};

/// Issuer stamped into and required from every access token.
pub const TOKEN_ISSUER: &str = "solvr";

/// Minimum accepted length for a configured signing secret.
pub const MIN_JWT_SECRET_LEN: usize = 32;

/// Generate a signed HS256 access token valid for `ttl`.
pub fn generate_access_token(
    user_id: &str,
    email: &str,
    role: Role,
    secret: &[u8],
    ttl: Duration,
) -> Result<String, AuthError> {
    if user_id.is_empty() {
        return Err(AuthError::ValidationError("user_id is required".into()));
    }
    if email.is_empty() {
        return Err(AuthError::ValidationError("email is required".into()));
    }

    let now = Utc::now();
    let claims = AccessTokenClaims {
        user_id: user_id.to_string(),
        email: email.to_string(),
        role,
        exp: (now + ttl).timestamp(),
        iat: now.timestamp(),
        nbf: now.timestamp(),
        iss: TOKEN_ISSUER.to_string(),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| AuthError::Internal(format!("jwt encode: {e}")))
}

/// Verify an access token: signature, algorithm, issuer and expiry.
///
/// Fails with `Expired` for a well-signed token past `exp` and with
/// `InvalidSignature` for anything else that does not verify.
pub fn verify_access_token(token: &str, secret: &[u8]) -> Result<AccessTokenClaims, AuthError> {
    if token.is_empty() {
        return Err(AuthError::InvalidSignature("token is empty".into()));
    }

    let key = DecodingKey::from_secret(secret);
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.validate_exp = true;
    validation.validate_nbf = true;
    validation.set_issuer(&[TOKEN_ISSUER]);
    validation.set_required_spec_claims(&["exp", "iss"]);

    decode::<AccessTokenClaims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::Expired("token has expired".into()),
            ErrorKind::InvalidSignature => {
                AuthError::InvalidSignature("invalid token signature".into())
            }
            _ => AuthError::InvalidSignature(format!("invalid token: {e}")),
        })
}

/// Verify an access token and lift its claims into a human principal.
pub fn verify_human(token: &str, secret: &[u8]) -> Result<HumanPrincipal, AuthError> {
    verify_access_token(token, secret).map(HumanPrincipal::from)
}

/// Resolve the JWT secret: env var `JWT_SECRET` → `AUTH_SECRET` → persisted file.
pub fn resolve_jwt_secret() -> String {
    if let Ok(secret) = std::env::var("JWT_SECRET")
        && !secret.is_empty()
    {
        return secret;
    }
    if let Ok(secret) = std::env::var("AUTH_SECRET")
        && !secret.is_empty()
    {
        return secret;
    }
    // Generate and persist
    let secret_path = jwt_secret_path();
    if let Ok(existing) = std::fs::read_to_string(&secret_path) {
        let trimmed = existing.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    let secret: String = rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect();
    if let Some(parent) = secret_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = std::fs::write(&secret_path, &secret);
    info!(path = %secret_path.display(), "generated new JWT secret");
    secret
}

/// Path to the persisted JWT secret file.
fn jwt_secret_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("solvr")
        .join("jwt-secret")
}
