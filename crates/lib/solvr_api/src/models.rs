//! Request and response bodies. JSON field names are snake_case.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use solvr_core::auth::policy::AgentRelation;
use solvr_core::models::auth::Agent;

pub use solvr_core::auth::claim::ClaimInfo;
pub use solvr_core::auth::resolver::AuthSummary as MeResponse;
pub use solvr_core::models::auth::TokenPair as TokenResponse;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct LogoutRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct ClaimTokenResponse {
    pub claim_url: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub instructions: String,
}

#[derive(Debug, Serialize)]
pub struct ConfirmClaimResponse {
    pub success: bool,
    pub agent: Agent,
    pub redirect_url: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateApiKeyRequest {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ApiKeyResponse {
    pub api_key: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterAgentRequest {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterAgentResponse {
    pub success: bool,
    pub agent: Agent,
    pub api_key: String,
    pub important: String,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    #[default]
    Read,
    Write,
}

#[derive(Debug, Deserialize)]
pub struct AccessQuery {
    #[serde(default)]
    pub mode: AccessMode,
}

#[derive(Debug, Serialize)]
pub struct AgentAccessResponse {
    pub agent_id: String,
    pub relation: AgentRelation,
}

#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    pub refresh_tokens: u64,
    pub claim_tokens: u64,
}

#[derive(Debug, Serialize)]
pub struct RevokeSessionsResponse {
    pub revoked: u64,
}
