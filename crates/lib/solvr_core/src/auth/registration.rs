//! Agent self-registration.
//!
//! An agent picks a name, gets the id `agent_<name>` and one API key, shown
//! only in the registration response. It starts unclaimed.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::AuthError;
use super::api_keys::issue_api_key;
use crate::models::auth::{Agent, KeyOwner};
use crate::store::{AgentStore, ApiKeyStore};

pub const AGENT_ID_PREFIX: &str = "agent_";

pub const AGENT_NAME_MIN_LEN: usize = 3;
pub const AGENT_NAME_MAX_LEN: usize = 30;

/// 3 to 30 ASCII letters, digits or underscores.
pub fn validate_agent_name(name: &str) -> Result<(), AuthError> {
    if name.is_empty() {
        return Err(AuthError::ValidationError("name is required".into()));
    }
    if name.len() < AGENT_NAME_MIN_LEN {
        return Err(AuthError::ValidationError(format!(
            "name must be at least {AGENT_NAME_MIN_LEN} characters"
        )));
    }
    if name.len() > AGENT_NAME_MAX_LEN {
        return Err(AuthError::ValidationError(format!(
            "name must not exceed {AGENT_NAME_MAX_LEN} characters"
        )));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(AuthError::ValidationError(
            "name must contain only alphanumeric characters and underscores".into(),
        ));
    }
    Ok(())
}

/// Create an unclaimed agent and its first API key.
/// Returns the stored agent and the raw key.
pub async fn register_agent(
    agents: &dyn AgentStore,
    keys: &dyn ApiKeyStore,
    name: &str,
    now: DateTime<Utc>,
) -> Result<(Agent, String), AuthError> {
    validate_agent_name(name)?;

    let agent = Agent {
        created_at: now,
        ..Agent::new(format!("{AGENT_ID_PREFIX}{name}"), name)
    };
    agents.create_agent(&agent).await.map_err(|e| match e {
        AuthError::Conflict(_) => AuthError::Conflict(format!("agent name {name} is taken")),
        other => other,
    })?;

    let (raw, _) = issue_api_key(keys, KeyOwner::Agent(agent.id.clone()), "default", now)
        .await
        .inspect_err(|e| warn!(agent_id = %agent.id, error = %e, "agent created without a key"))?;
    info!(agent_id = %agent.id, "registered agent");
    Ok((agent, raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::api_keys::is_agent_key;
    use crate::auth::tokens::hash_token;
    use crate::store::MemoryStore;

    #[test]
    fn names_are_validated() {
        assert!(validate_agent_name("bot_42").is_ok());
        assert!(validate_agent_name(&"a".repeat(30)).is_ok());

        let long = "a".repeat(31);
        for bad in ["", "ab", long.as_str(), "has space", "dash-name", "émoji"] {
            assert!(
                matches!(validate_agent_name(bad), Err(AuthError::ValidationError(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn registration_creates_unclaimed_agent_with_working_key() {
        let store = MemoryStore::new();
        let now = Utc::now();

        let (agent, raw) = register_agent(&store, &store, "helper_bot", now).await.unwrap();
        assert_eq!(agent.id, "agent_helper_bot");
        assert_eq!(agent.display_name, "helper_bot");
        assert!(!agent.is_claimed());
        assert!(is_agent_key(&raw));

        let stored = store.find_agent_by_id("agent_helper_bot").await.unwrap().unwrap();
        assert_eq!(stored.created_at, now);
        let key = store.find_by_hash(&hash_token(&raw)).await.unwrap().unwrap();
        assert_eq!(key.owner, KeyOwner::Agent("agent_helper_bot".into()));
    }

    #[tokio::test]
    async fn taken_name_conflicts() {
        let store = MemoryStore::new();
        register_agent(&store, &store, "helper_bot", Utc::now()).await.unwrap();

        let err = register_agent(&store, &store, "helper_bot", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Conflict(_)));
    }
}
