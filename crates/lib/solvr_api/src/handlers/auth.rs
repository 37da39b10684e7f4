//! Session, identity and user credential handlers.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::Identity;
use crate::models::{
    ApiKeyResponse, CreateApiKeyRequest, LogoutRequest, MeResponse, RefreshRequest,
    RevokeSessionsResponse, TokenResponse,
};
use crate::services::auth;

/// `POST /v1/auth/refresh` — exchange a refresh token for a new token pair.
pub async fn refresh_handler(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> AppResult<Json<TokenResponse>> {
    let resp = auth::refresh(&state.stores, &state.config.tokens, &body.refresh_token).await?;
    Ok(Json(resp))
}

/// `POST /v1/auth/logout` — revoke one of the caller's refresh tokens.
pub async fn logout_handler(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<Identity>,
    Json(body): Json<LogoutRequest>,
) -> AppResult<StatusCode> {
    let user = identity.require_human()?;
    auth::logout(&state.stores, user, &body.refresh_token).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /v1/auth/logout-all` — revoke every refresh token of the caller.
pub async fn logout_all_handler(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<Identity>,
) -> AppResult<StatusCode> {
    let user = identity.require_human()?;
    auth::logout_all(&state.stores, &user.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /v1/me` — who the request is authenticated as.
pub async fn me_handler(
    axum::Extension(identity): axum::Extension<Identity>,
) -> AppResult<Json<MeResponse>> {
    Ok(Json(identity.require()?.summary()))
}

/// `POST /v1/users/me/api-keys` — issue a personal API key.
pub async fn create_user_api_key_handler(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<Identity>,
    Json(body): Json<CreateApiKeyRequest>,
) -> AppResult<(StatusCode, Json<ApiKeyResponse>)> {
    let user = identity.require_human()?;
    let resp = auth::create_user_api_key(&state.stores, user, body.name.as_deref()).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

/// `DELETE /v1/users/{userId}/sessions` — admin: sign a user out everywhere.
pub async fn revoke_user_sessions_handler(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<Identity>,
    Path(user_id): Path<String>,
) -> AppResult<Json<RevokeSessionsResponse>> {
    identity.require_admin()?;
    let resp = auth::logout_all(&state.stores, &user_id).await?;
    Ok(Json(resp))
}
