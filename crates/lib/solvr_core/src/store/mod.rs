//! Repository traits for the identity subsystem.
//!
//! Every operation that must be single-use (refresh rotation, claim
//! redemption, agent linking) is a conditional write reporting whether it
//! took effect. Callers never read-then-write to decide a race.

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::auth::AuthError;
use crate::models::auth::{Agent, ApiKeyRecord, ClaimToken, KeyOwner, RefreshTokenRecord, User};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Read access to human accounts.
#[async_trait]
pub trait HumanStore: Send + Sync {
    async fn find_human_by_id(&self, id: &str) -> Result<Option<User>, AuthError>;
}

/// Agent lookups, registration and the rewards granted on claim.
#[async_trait]
pub trait AgentStore: Send + Sync {
    async fn find_agent_by_id(&self, id: &str) -> Result<Option<Agent>, AuthError>;

    /// Insert a new agent. A taken id fails with `Conflict`.
    async fn create_agent(&self, agent: &Agent) -> Result<(), AuthError>;

    async fn add_karma(&self, agent_id: &str, amount: i64) -> Result<(), AuthError>;

    async fn grant_human_backed_badge(&self, agent_id: &str) -> Result<(), AuthError>;
}

#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn get_by_hash(&self, token_hash: &str)
    -> Result<Option<RefreshTokenRecord>, AuthError>;

    async fn create(&self, record: &RefreshTokenRecord) -> Result<(), AuthError>;

    /// Delete one record. `true` iff this call removed it.
    async fn delete(&self, id: &str) -> Result<bool, AuthError>;

    async fn delete_by_user(&self, user_id: &str) -> Result<u64, AuthError>;

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, AuthError>;
}

/// Result of an atomic claim redemption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// Token consumed and agent linked, together.
    Linked,
    /// The token was already consumed (or is gone). Nothing changed.
    TokenUsed,
    /// The agent is missing or already linked. Nothing changed.
    AgentTaken,
}

#[async_trait]
pub trait ClaimTokenStore: Send + Sync {
    /// Persist a new token.
    ///
    /// An agent holds at most one unused token: its expired unused token is
    /// deleted in the same write, and an unexpired one fails with `Conflict`.
    /// A duplicate token value also fails with `Conflict`.
    async fn create(&self, token: &ClaimToken) -> Result<(), AuthError>;

    async fn find_by_token(&self, token: &str) -> Result<Option<ClaimToken>, AuthError>;

    /// The newest unused, unexpired token for an agent.
    async fn find_active_by_agent(
        &self,
        agent_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ClaimToken>, AuthError>;

    /// Mark `token` used and link its agent to `human_id` as one unit.
    ///
    /// Either both writes land or neither does: the token must still be
    /// unused and the agent still unclaimed.
    async fn redeem(
        &self,
        token: &ClaimToken,
        human_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ClaimOutcome, AuthError>;

    /// Remove unused tokens past their expiry.
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, AuthError>;
}

#[async_trait]
pub trait ApiKeyStore: Send + Sync {
    async fn create(&self, record: &ApiKeyRecord) -> Result<(), AuthError>;

    /// Only non-revoked keys are returned.
    async fn find_by_hash(&self, key_hash: &str) -> Result<Option<ApiKeyRecord>, AuthError>;

    async fn update_last_used(&self, id: &str, now: DateTime<Utc>) -> Result<(), AuthError>;

    /// Revoke every live key of `owner`, returning how many were revoked.
    async fn revoke_for_owner(&self, owner: &KeyOwner, now: DateTime<Utc>)
    -> Result<u64, AuthError>;
}

/// The repositories the identity subsystem needs, bundled for handler state.
#[derive(Clone)]
pub struct AuthStores {
    pub humans: Arc<dyn HumanStore>,
    pub agents: Arc<dyn AgentStore>,
    pub refresh_tokens: Arc<dyn RefreshTokenStore>,
    pub claim_tokens: Arc<dyn ClaimTokenStore>,
    pub api_keys: Arc<dyn ApiKeyStore>,
}

impl AuthStores {
    /// All repositories backed by one PostgreSQL pool.
    pub fn postgres(pool: PgPool) -> Self {
        Self::from_shared(Arc::new(PgStore::new(pool)))
    }

    /// All repositories served by a single shared implementation.
    pub fn from_shared<T>(store: Arc<T>) -> Self
    where
        T: HumanStore + AgentStore + RefreshTokenStore + ClaimTokenStore + ApiKeyStore + 'static,
    {
        Self {
            humans: store.clone(),
            agents: store.clone(),
            refresh_tokens: store.clone(),
            claim_tokens: store.clone(),
            api_keys: store,
        }
    }
}
