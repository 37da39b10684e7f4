//! Agent-side services: registration, the claim flow, key rotation and
//! revocation, family access checks and maintenance.

use chrono::Utc;
use solvr_core::auth::api_keys::{revoke_agent_keys, rotate_agent_key};
use solvr_core::auth::claim::{
    self, CLAIM_INSTRUCTIONS, ClaimInfo, claim_url, generate_claim_token, inspect_claim_token,
    redeem_claim_token,
};
use solvr_core::auth::policy::{AgentAccess, authorize_agent_scoped};
use solvr_core::auth::refresh;
use solvr_core::auth::registration::register_agent;
use solvr_core::auth::resolver::AuthInfo;
use solvr_core::models::auth::{AgentPrincipal, HumanPrincipal};
use solvr_core::store::AuthStores;
use tracing::info;

use crate::error::AppResult;
use crate::models::{
    AccessMode, AgentAccessResponse, ApiKeyResponse, ClaimTokenResponse, CleanupResponse,
    ConfirmClaimResponse, RegisterAgentResponse,
};

/// Create an unclaimed agent and its first API key.
pub async fn register(stores: &AuthStores, name: &str) -> AppResult<RegisterAgentResponse> {
    let (agent, api_key) = register_agent(
        stores.agents.as_ref(),
        stores.api_keys.as_ref(),
        name,
        Utc::now(),
    )
    .await?;
    Ok(RegisterAgentResponse {
        success: true,
        agent,
        api_key,
        important: "SAVE YOUR API KEY! Shown only once.".to_string(),
    })
}

/// Return the agent's active claim token or mint one. The flag is `true`
/// when a new token was created.
pub async fn generate_claim(
    stores: &AuthStores,
    app_url: &str,
    agent: &AgentPrincipal,
) -> AppResult<(ClaimTokenResponse, bool)> {
    let generated =
        generate_claim_token(stores.claim_tokens.as_ref(), &agent.agent_id, Utc::now()).await?;
    let token = generated.token;
    Ok((
        ClaimTokenResponse {
            claim_url: claim_url(app_url, &token.token),
            token: token.token,
            expires_at: token.expires_at,
            instructions: CLAIM_INSTRUCTIONS.to_string(),
        },
        generated.created,
    ))
}

/// Link the token's agent to `human`.
pub async fn confirm_claim(
    stores: &AuthStores,
    app_url: &str,
    human: &HumanPrincipal,
    token: &str,
) -> AppResult<ConfirmClaimResponse> {
    let agent = redeem_claim_token(
        stores.claim_tokens.as_ref(),
        stores.agents.as_ref(),
        token,
        &human.user_id,
        Utc::now(),
    )
    .await?;
    Ok(ConfirmClaimResponse {
        success: true,
        redirect_url: format!("{}/agents/{}", app_url.trim_end_matches('/'), agent.id),
        message: format!(
            "Successfully linked! You are now the verified human behind {}",
            agent.display_name
        ),
        agent,
    })
}

pub async fn claim_info(stores: &AuthStores, token: &str) -> AppResult<ClaimInfo> {
    let info = inspect_claim_token(
        stores.claim_tokens.as_ref(),
        stores.agents.as_ref(),
        token,
        Utc::now(),
    )
    .await?;
    Ok(info)
}

/// Revoke the agent's keys and hand back a new one.
pub async fn rotate_key(stores: &AuthStores, agent: &AgentPrincipal) -> AppResult<ApiKeyResponse> {
    let api_key = rotate_agent_key(stores.api_keys.as_ref(), &agent.agent_id, Utc::now()).await?;
    Ok(ApiKeyResponse { api_key })
}

/// Revoke every key of `agent_id`. Needs write access: the agent itself,
/// its human or an admin.
pub async fn revoke_key(
    stores: &AuthStores,
    auth: Option<&AuthInfo>,
    agent_id: &str,
) -> AppResult<u64> {
    authorize_agent_scoped(stores.agents.as_ref(), auth, agent_id, AgentAccess::Write).await?;
    let revoked = revoke_agent_keys(stores.api_keys.as_ref(), agent_id, Utc::now()).await?;
    Ok(revoked)
}

/// How (and whether) the caller may act on `agent_id`.
pub async fn check_agent_access(
    stores: &AuthStores,
    auth: Option<&AuthInfo>,
    agent_id: &str,
    mode: AccessMode,
) -> AppResult<AgentAccessResponse> {
    let access = match mode {
        AccessMode::Read => AgentAccess::Read,
        AccessMode::Write => AgentAccess::Write,
    };
    let relation = authorize_agent_scoped(stores.agents.as_ref(), auth, agent_id, access).await?;
    Ok(AgentAccessResponse {
        agent_id: agent_id.to_string(),
        relation,
    })
}

/// Delete expired refresh tokens and expired, unused claim tokens.
pub async fn cleanup(stores: &AuthStores) -> AppResult<CleanupResponse> {
    let now = Utc::now();
    let refresh_tokens = refresh::cleanup_expired(stores.refresh_tokens.as_ref(), now).await?;
    let claim_tokens = claim::cleanup_expired(stores.claim_tokens.as_ref(), now).await?;
    info!(refresh_tokens, claim_tokens, "expired credentials cleaned up");
    Ok(CleanupResponse {
        refresh_tokens,
        claim_tokens,
    })
}
