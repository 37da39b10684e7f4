//! In-memory repositories for tests and `--in-memory` runs.
//!
//! Built on `DashMap`: `remove` and a guarded `get_mut` hold the shard lock,
//! so they give the same single-winner guarantee as the conditional SQL in
//! [`super::PgStore`].
//!
//! Paths that hold two maps at once take them in a fixed order: `agents`
//! before `claim_tokens`, and `unused_claims` before `claim_tokens`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::{
    AgentStore, ApiKeyStore, ClaimOutcome, ClaimTokenStore, HumanStore, RefreshTokenStore,
};
use crate::auth::AuthError;
use crate::models::auth::{Agent, ApiKeyRecord, ClaimToken, KeyOwner, RefreshTokenRecord, User};

#[derive(Default)]
pub struct MemoryStore {
    users: DashMap<String, User>,
    agents: DashMap<String, Agent>,
    /// Keyed by id.
    refresh_tokens: DashMap<String, RefreshTokenRecord>,
    /// Keyed by token value.
    claim_tokens: DashMap<String, ClaimToken>,
    /// Agent id to the value of its latest unused token.
    unused_claims: DashMap<String, String>,
    /// Keyed by key hash.
    api_keys: DashMap<String, ApiKeyRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_user(&self, user: User) {
        self.users.insert(user.id.clone(), user);
    }

    pub fn insert_agent(&self, agent: Agent) {
        self.agents.insert(agent.id.clone(), agent);
    }

    /// Store a claim token as-is, bypassing generation rules.
    pub fn insert_claim_token(&self, token: ClaimToken) {
        if !token.is_used() {
            self.unused_claims
                .insert(token.agent_id.clone(), token.token.clone());
        }
        self.claim_tokens.insert(token.token.clone(), token);
    }

    pub fn refresh_token_count(&self) -> usize {
        self.refresh_tokens.len()
    }

    fn insert_new_claim(&self, token: &ClaimToken) -> Result<(), AuthError> {
        match self.claim_tokens.entry(token.token.clone()) {
            Entry::Occupied(_) => Err(AuthError::Conflict("claim token already exists".into())),
            Entry::Vacant(slot) => {
                slot.insert(token.clone());
                Ok(())
            }
        }
    }
}

#[async_trait]
impl HumanStore for MemoryStore {
    async fn find_human_by_id(&self, id: &str) -> Result<Option<User>, AuthError> {
        Ok(self.users.get(id).map(|u| u.clone()))
    }
}

#[async_trait]
impl AgentStore for MemoryStore {
    async fn find_agent_by_id(&self, id: &str) -> Result<Option<Agent>, AuthError> {
        Ok(self.agents.get(id).map(|a| a.clone()))
    }

    async fn create_agent(&self, agent: &Agent) -> Result<(), AuthError> {
        match self.agents.entry(agent.id.clone()) {
            Entry::Occupied(_) => Err(AuthError::Conflict(format!(
                "agent {} already exists",
                agent.id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(agent.clone());
                Ok(())
            }
        }
    }

    async fn add_karma(&self, agent_id: &str, amount: i64) -> Result<(), AuthError> {
        let mut agent = self
            .agents
            .get_mut(agent_id)
            .ok_or_else(|| AuthError::NotFound(format!("agent {agent_id}")))?;
        agent.karma += amount;
        Ok(())
    }

    async fn grant_human_backed_badge(&self, agent_id: &str) -> Result<(), AuthError> {
        let mut agent = self
            .agents
            .get_mut(agent_id)
            .ok_or_else(|| AuthError::NotFound(format!("agent {agent_id}")))?;
        agent.has_human_backed_badge = true;
        Ok(())
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryStore {
    async fn get_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, AuthError> {
        Ok(self
            .refresh_tokens
            .iter()
            .find(|r| r.token_hash == token_hash)
            .map(|r| r.value().clone()))
    }

    async fn create(&self, record: &RefreshTokenRecord) -> Result<(), AuthError> {
        if self
            .refresh_tokens
            .iter()
            .any(|r| r.token_hash == record.token_hash)
        {
            return Err(AuthError::Conflict("refresh token hash already exists".into()));
        }
        self.refresh_tokens.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool, AuthError> {
        Ok(self.refresh_tokens.remove(id).is_some())
    }

    async fn delete_by_user(&self, user_id: &str) -> Result<u64, AuthError> {
        let mut removed = 0;
        self.refresh_tokens.retain(|_, r| {
            let keep = r.user_id != user_id;
            removed += u64::from(!keep);
            keep
        });
        Ok(removed)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, AuthError> {
        let mut removed = 0;
        self.refresh_tokens.retain(|_, r| {
            let keep = !r.is_expired_at(now);
            removed += u64::from(!keep);
            keep
        });
        Ok(removed)
    }
}

#[async_trait]
impl ClaimTokenStore for MemoryStore {
    async fn create(&self, token: &ClaimToken) -> Result<(), AuthError> {
        // The index entry stays locked until the new token is in place.
        match self.unused_claims.entry(token.agent_id.clone()) {
            Entry::Occupied(mut slot) => {
                let current = slot.get().clone();
                let live = self
                    .claim_tokens
                    .get(&current)
                    .is_some_and(|t| t.is_active_at(token.created_at));
                if live {
                    return Err(AuthError::Conflict(
                        "agent already has an active claim token".into(),
                    ));
                }
                self.insert_new_claim(token)?;
                self.claim_tokens.remove_if(&current, |_, t| !t.is_used());
                slot.insert(token.token.clone());
            }
            Entry::Vacant(slot) => {
                self.insert_new_claim(token)?;
                slot.insert(token.token.clone());
            }
        }
        Ok(())
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<ClaimToken>, AuthError> {
        Ok(self.claim_tokens.get(token).map(|t| t.clone()))
    }

    async fn find_active_by_agent(
        &self,
        agent_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ClaimToken>, AuthError> {
        Ok(self
            .claim_tokens
            .iter()
            .filter(|t| t.agent_id == agent_id && t.is_active_at(now))
            .max_by_key(|t| t.created_at)
            .map(|t| t.value().clone()))
    }

    async fn redeem(
        &self,
        token: &ClaimToken,
        human_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ClaimOutcome, AuthError> {
        let agent = self.agents.get_mut(&token.agent_id);
        let Some(mut stored) = self.claim_tokens.get_mut(&token.token) else {
            return Ok(ClaimOutcome::TokenUsed);
        };
        if stored.id != token.id || stored.is_used() {
            return Ok(ClaimOutcome::TokenUsed);
        }
        let Some(mut agent) = agent.filter(|a| !a.is_claimed()) else {
            return Ok(ClaimOutcome::AgentTaken);
        };
        stored.used_at = Some(now);
        stored.used_by_human_id = Some(human_id.to_string());
        agent.human_id = Some(human_id.to_string());
        Ok(ClaimOutcome::Linked)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, AuthError> {
        let mut removed = 0;
        self.claim_tokens.retain(|_, t| {
            let keep = t.is_used() || !t.is_expired_at(now);
            removed += u64::from(!keep);
            keep
        });
        Ok(removed)
    }
}

#[async_trait]
impl ApiKeyStore for MemoryStore {
    async fn create(&self, record: &ApiKeyRecord) -> Result<(), AuthError> {
        match self.api_keys.entry(record.key_hash.clone()) {
            Entry::Occupied(_) => Err(AuthError::Conflict("api key already exists".into())),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(())
            }
        }
    }

    async fn find_by_hash(&self, key_hash: &str) -> Result<Option<ApiKeyRecord>, AuthError> {
        Ok(self
            .api_keys
            .get(key_hash)
            .filter(|k| k.revoked_at.is_none())
            .map(|k| k.clone()))
    }

    async fn update_last_used(&self, id: &str, now: DateTime<Utc>) -> Result<(), AuthError> {
        for mut key in self.api_keys.iter_mut() {
            if key.id == id {
                key.last_used_at = Some(now);
            }
        }
        Ok(())
    }

    async fn revoke_for_owner(
        &self,
        owner: &KeyOwner,
        now: DateTime<Utc>,
    ) -> Result<u64, AuthError> {
        let mut revoked = 0;
        for mut key in self.api_keys.iter_mut() {
            if &key.owner == owner && key.revoked_at.is_none() {
                key.revoked_at = Some(now);
                revoked += 1;
            }
        }
        Ok(revoked)
    }
}
