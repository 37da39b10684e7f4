//! Agent registration, key revocation and agent-scoped authorization.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::Identity;
use crate::models::{
    AccessQuery, AgentAccessResponse, RegisterAgentRequest, RegisterAgentResponse,
};
use crate::services::claims;

/// `POST /v1/agents/register` — self-registration; the key is shown once.
pub async fn register_agent_handler(
    State(state): State<AppState>,
    Json(req): Json<RegisterAgentRequest>,
) -> AppResult<(StatusCode, Json<RegisterAgentResponse>)> {
    let resp = claims::register(&state.stores, &req.name).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

/// `DELETE /v1/agents/{agentId}/api-key` — revoke all of the agent's keys.
pub async fn revoke_agent_key_handler(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<Identity>,
    Path(agent_id): Path<String>,
) -> AppResult<StatusCode> {
    claims::revoke_key(&state.stores, identity.0.as_ref(), &agent_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /v1/agents/{agentId}/access?mode=read|write` — report how the caller
/// relates to the agent, or why access is denied.
pub async fn agent_access_handler(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<Identity>,
    Path(agent_id): Path<String>,
    Query(query): Query<AccessQuery>,
) -> AppResult<Json<AgentAccessResponse>> {
    let resp =
        claims::check_agent_access(&state.stores, identity.0.as_ref(), &agent_id, query.mode)
            .await?;
    Ok(Json(resp))
}
