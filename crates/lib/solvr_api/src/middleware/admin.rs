//! Admin gate for maintenance endpoints.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use solvr_core::auth::verifier::verify_admin_key;

use crate::AppState;
use crate::error::AppError;

/// Header carrying the admin shared secret.
pub const ADMIN_KEY_HEADER: &str = "x-admin-api-key";

/// Axum middleware: the `X-Admin-API-Key` header must match `ADMIN_API_KEY`.
/// With no key configured every request is refused with 503.
pub async fn require_admin_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let presented = request
        .headers()
        .get(ADMIN_KEY_HEADER)
        .and_then(|v| v.to_str().ok());
    verify_admin_key(state.config.admin_api_key.as_deref(), presented)?;
    Ok(next.run(request).await)
}
