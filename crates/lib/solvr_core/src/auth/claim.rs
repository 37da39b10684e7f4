//! Agent claim protocol.
//!
//! An agent mints a single-use token and hands the resulting URL to its
//! human; the human redeems it while signed in, which links the agent to
//! that human. At most one unused token exists per agent, and consuming a
//! token links its agent in the same atomic write, so concurrent
//! redemptions cannot both succeed.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{info, warn};

use super::AuthError;
use super::tokens::random_hex;
use crate::models::auth::{Agent, ClaimToken};
use crate::store::{AgentStore, ClaimOutcome, ClaimTokenStore};
use crate::uuid::new_id;

/// Random bytes per claim token; rendered as 64 lowercase hex chars.
pub const CLAIM_TOKEN_BYTES: usize = 32;

pub const CLAIM_TOKEN_TTL_HOURS: i64 = 24;

/// Karma granted to an agent once a human claims it.
pub const KARMA_BONUS_ON_CLAIM: i64 = 50;

pub const CLAIM_INSTRUCTIONS: &str = "Send this URL to your human to link your account. \
When they click it and confirm, you'll receive the 'Human-Backed' badge and a +50 karma bonus. \
The link expires in 24 hours.";

/// Outcome of [`generate_claim_token`].
#[derive(Debug, Clone)]
pub struct GeneratedClaim {
    pub token: ClaimToken,
    /// `false` when an existing active token was returned.
    pub created: bool,
}

/// Preview of a claim token for the confirmation page.
#[derive(Debug, Clone, Serialize)]
pub struct ClaimInfo {
    pub token_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<Agent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ClaimInfo {
    fn invalid(reason: &str) -> Self {
        Self {
            token_valid: false,
            agent: None,
            expires_at: None,
            error: Some(reason.to_string()),
        }
    }
}

/// Claim URL handed to the human.
pub fn claim_url(app_url: &str, token: &str) -> String {
    format!("{}/claim/{token}", app_url.trim_end_matches('/'))
}

/// Return the agent's active claim token, minting one if there is none.
pub async fn generate_claim_token(
    store: &dyn ClaimTokenStore,
    agent_id: &str,
    now: DateTime<Utc>,
) -> Result<GeneratedClaim, AuthError> {
    if agent_id.is_empty() {
        return Err(AuthError::ValidationError("agent_id is required".into()));
    }

    if let Some(token) = store.find_active_by_agent(agent_id, now).await? {
        return Ok(GeneratedClaim {
            token,
            created: false,
        });
    }

    let token = ClaimToken {
        id: new_id(),
        token: random_hex(CLAIM_TOKEN_BYTES),
        agent_id: agent_id.to_string(),
        expires_at: now + Duration::hours(CLAIM_TOKEN_TTL_HOURS),
        created_at: now,
        used_at: None,
        used_by_human_id: None,
    };

    match store.create(&token).await {
        Ok(()) => {
            info!(agent_id, token_id = %token.id, "created claim token");
            Ok(GeneratedClaim {
                token,
                created: true,
            })
        }
        Err(AuthError::Conflict(_)) => store
            .find_active_by_agent(agent_id, now)
            .await?
            .map(|token| GeneratedClaim {
                token,
                created: false,
            })
            .ok_or_else(|| AuthError::Internal("claim token collision".into())),
        Err(e) => Err(e),
    }
}

/// Redeem a claim token on behalf of `human_id`, returning the linked agent.
pub async fn redeem_claim_token(
    claims: &dyn ClaimTokenStore,
    agents: &dyn AgentStore,
    raw: &str,
    human_id: &str,
    now: DateTime<Utc>,
) -> Result<Agent, AuthError> {
    let token = claims
        .find_by_token(raw)
        .await?
        .ok_or_else(|| AuthError::NotFound("claim token not found or invalid".into()))?;

    if token.is_expired_at(now) {
        return Err(AuthError::Expired("claim token has expired".into()));
    }
    if token.is_used() {
        return Err(AuthError::AlreadyUsed("claim token has already been used".into()));
    }

    let agent = agents
        .find_agent_by_id(&token.agent_id)
        .await?
        .ok_or_else(|| AuthError::NotFound("agent not found".into()))?;
    if agent.is_claimed() {
        // A concurrent redemption of this same token consumes it as it links.
        let consumed = claims
            .find_by_token(raw)
            .await?
            .is_some_and(|t| t.is_used());
        return Err(if consumed {
            AuthError::AlreadyUsed("claim token has already been used".into())
        } else {
            AuthError::Conflict("agent is already linked to a human".into())
        });
    }

    match claims.redeem(&token, human_id, now).await? {
        ClaimOutcome::Linked => {}
        ClaimOutcome::TokenUsed => {
            return Err(AuthError::AlreadyUsed("claim token has already been used".into()));
        }
        ClaimOutcome::AgentTaken => {
            return Err(AuthError::Conflict("agent is already linked to a human".into()));
        }
    }
    info!(agent_id = %agent.id, human_id, "agent claimed");

    if let Err(e) = agents.add_karma(&agent.id, KARMA_BONUS_ON_CLAIM).await {
        warn!(agent_id = %agent.id, error = %e, "failed to grant claim karma bonus");
    }
    if let Err(e) = agents.grant_human_backed_badge(&agent.id).await {
        warn!(agent_id = %agent.id, error = %e, "failed to grant human-backed badge");
    }

    match agents.find_agent_by_id(&agent.id).await {
        Ok(Some(updated)) => Ok(updated),
        Ok(None) | Err(_) => Ok(Agent {
            human_id: Some(human_id.to_string()),
            ..agent
        }),
    }
}

/// Describe a token without consuming it. Never fails on an invalid token.
pub async fn inspect_claim_token(
    claims: &dyn ClaimTokenStore,
    agents: &dyn AgentStore,
    raw: &str,
    now: DateTime<Utc>,
) -> Result<ClaimInfo, AuthError> {
    let Some(token) = claims.find_by_token(raw).await? else {
        return Ok(ClaimInfo::invalid("claim token not found or invalid"));
    };
    if token.is_expired_at(now) {
        return Ok(ClaimInfo::invalid("claim token has expired"));
    }
    if token.is_used() {
        return Ok(ClaimInfo::invalid("claim token has already been used"));
    }

    let Some(agent) = agents.find_agent_by_id(&token.agent_id).await? else {
        return Ok(ClaimInfo::invalid("agent not found"));
    };
    if agent.is_claimed() {
        return Ok(ClaimInfo::invalid("agent is already linked to a human"));
    }

    Ok(ClaimInfo {
        token_valid: true,
        agent: Some(agent),
        expires_at: Some(token.expires_at),
        error: None,
    })
}

pub async fn cleanup_expired(
    store: &dyn ClaimTokenStore,
    now: DateTime<Utc>,
) -> Result<u64, AuthError> {
    store.delete_expired(now).await
}
