//! Application error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use solvr_core::auth::AuthError;
use solvr_core::auth::policy::Denial;
use thiserror::Error;
use tracing::error;

use crate::models::ErrorResponse;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unavailable: {0}")]
    Unavailable(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token expired: {0}")]
    TokenExpired(String),

    #[error("Already used: {0}")]
    AlreadyUsed(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match &self {
            AppError::Validation(m) => (StatusCode::BAD_REQUEST, "validation_error", m.as_str()),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, "not_found", m.as_str()),
            AppError::Unavailable(m) => (StatusCode::SERVICE_UNAVAILABLE, "unavailable", m.as_str()),
            AppError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, "unauthorized", m.as_str()),
            AppError::InvalidToken(m) => (StatusCode::UNAUTHORIZED, "invalid_token", m.as_str()),
            AppError::TokenExpired(m) => (StatusCode::UNAUTHORIZED, "token_expired", m.as_str()),
            AppError::AlreadyUsed(m) => (StatusCode::UNAUTHORIZED, "already_used", m.as_str()),
            AppError::Forbidden(m) => (StatusCode::FORBIDDEN, "forbidden", m.as_str()),
            AppError::Conflict(m) => (StatusCode::CONFLICT, "conflict", m.as_str()),
            AppError::Internal(detail) => {
                error!(detail = %detail, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error",
                )
            }
        };
        let body = Json(ErrorResponse {
            error: error.to_string(),
            message: message.to_string(),
        });
        (status, body).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Internal(e.to_string())
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Unauthorized(msg) => AppError::Unauthorized(msg),
            AuthError::InvalidSignature(msg) => AppError::InvalidToken(msg),
            AuthError::Expired(msg) => AppError::TokenExpired(msg),
            AuthError::AlreadyUsed(msg) => AppError::AlreadyUsed(msg),
            AuthError::NotFound(msg) => AppError::NotFound(msg),
            AuthError::Forbidden(msg) => AppError::Forbidden(msg),
            AuthError::Conflict(msg) => AppError::Conflict(msg),
            AuthError::ValidationError(msg) => AppError::Validation(msg),
            AuthError::Unavailable(msg) => AppError::Unavailable(msg),
            AuthError::DbError(e) => AppError::from(e),
            AuthError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

impl From<Denial> for AppError {
    fn from(denial: Denial) -> Self {
        AppError::from(AuthError::from(denial))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn auth_errors_map_to_statuses() {
        let cases = [
            (AuthError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (AuthError::InvalidSignature("x".into()), StatusCode::UNAUTHORIZED),
            (AuthError::Expired("x".into()), StatusCode::UNAUTHORIZED),
            (AuthError::AlreadyUsed("x".into()), StatusCode::UNAUTHORIZED),
            (AuthError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (AuthError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (AuthError::Conflict("x".into()), StatusCode::CONFLICT),
            (AuthError::ValidationError("x".into()), StatusCode::BAD_REQUEST),
            (AuthError::Unavailable("x".into()), StatusCode::SERVICE_UNAVAILABLE),
            (AuthError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).into_response().status(), status);
        }
    }

    #[tokio::test]
    async fn internal_detail_is_not_echoed() {
        let resp = AppError::Internal("connection refused on 10.0.0.5".into()).into_response();
        let json = body_json(resp).await;
        assert_eq!(json["error"], "internal_error");
        assert_eq!(json["message"], "Internal server error");
    }

    #[tokio::test]
    async fn expired_token_has_stable_code() {
        let resp = AppError::from(AuthError::Expired("token has expired".into())).into_response();
        let json = body_json(resp).await;
        assert_eq!(json["error"], "token_expired");
        assert_eq!(json["message"], "token has expired");
    }
}
