//! Claim flow handlers: the agent mints a link, its human confirms it.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::Identity;
use crate::models::{ApiKeyResponse, ClaimInfo, ClaimTokenResponse, ConfirmClaimResponse};
use crate::services::claims;

/// `POST /v1/agents/me/claim` — 201 with a new token, 200 with the active one.
pub async fn generate_claim_handler(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<Identity>,
) -> AppResult<(StatusCode, Json<ClaimTokenResponse>)> {
    let agent = identity.require_agent()?;
    let (resp, created) = claims::generate_claim(&state.stores, &state.config.app_url, agent).await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(resp)))
}

/// `POST /v1/agents/me/api-key` — rotate the calling agent's API key.
pub async fn rotate_agent_key_handler(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<Identity>,
) -> AppResult<(StatusCode, Json<ApiKeyResponse>)> {
    let agent = identity.require_agent()?;
    let resp = claims::rotate_key(&state.stores, agent).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

/// `GET /v1/claim/{token}` — public preview for the confirmation page.
pub async fn claim_info_handler(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> AppResult<Json<ClaimInfo>> {
    Ok(Json(claims::claim_info(&state.stores, &token).await?))
}

/// `POST /v1/claim/{token}` — a signed-in human claims the agent.
pub async fn confirm_claim_handler(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<Identity>,
    Path(token): Path<String>,
) -> AppResult<Json<ConfirmClaimResponse>> {
    let human = identity.require_human()?;
    let resp = claims::confirm_claim(&state.stores, &state.config.app_url, human, &token).await?;
    Ok(Json(resp))
}
