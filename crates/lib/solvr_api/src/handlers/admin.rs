//! Maintenance handlers behind the admin key gate.

use axum::Json;
use axum::extract::State;

use crate::AppState;
use crate::error::AppResult;
use crate::models::CleanupResponse;
use crate::services::claims;

/// `POST /v1/admin/cleanup` — purge expired refresh and claim tokens.
pub async fn cleanup_handler(State(state): State<AppState>) -> AppResult<Json<CleanupResponse>> {
    Ok(Json(claims::cleanup(&state.stores).await?))
}
