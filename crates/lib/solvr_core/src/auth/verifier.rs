//! Credential verification.
//!
//! Turns raw credential material into a typed principal:
//!
//! | Bearer prefix | Path | Principal |
//! |---|---|---|
//! | `solvr_sk_` | human API key, hashed lookup | [`HumanPrincipal`] |
//! | `solvr_` | agent API key, hashed lookup | [`AgentPrincipal`] |
//! | anything else | HS256 access token, no I/O | [`HumanPrincipal`] |
//!
//! A prefixed key that fails never falls through to the JWT path. Every
//! store lookup runs under [`TokenSettings::lookup_timeout`]; an elapsed
//! deadline denies with `Unavailable`.

use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use super::api_keys::{is_agent_key, is_user_key};
use super::jwt::verify_human;
use super::tokens::hash_token;
use super::{AuthError, TokenSettings};
use crate::models::auth::{AgentPrincipal, HumanPrincipal, KeyOwner, Role};
use crate::store::{AgentStore, ApiKeyStore, AuthStores, HumanStore};

/// A verified bearer credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BearerPrincipal {
    Human(HumanPrincipal),
    Agent(AgentPrincipal),
}

/// Run a store lookup under a deadline.
pub(crate) async fn with_deadline<T, F>(deadline: Duration, lookup: F) -> Result<T, AuthError>
where
    F: Future<Output = Result<T, AuthError>>,
{
    tokio::time::timeout(deadline, lookup)
        .await
        .map_err(|_| AuthError::Unavailable("credential lookup timed out".into()))?
}

/// Verify an agent API key against its stored hash.
pub async fn verify_agent_key(
    keys: &dyn ApiKeyStore,
    agents: &dyn AgentStore,
    raw: &str,
) -> Result<AgentPrincipal, AuthError> {
    if !is_agent_key(raw) {
        return Err(AuthError::InvalidSignature("not an agent api key".into()));
    }

    let record = keys
        .find_by_hash(&hash_token(raw))
        .await?
        .ok_or_else(|| AuthError::NotFound("api key not found".into()))?;

    let KeyOwner::Agent(agent_id) = &record.owner else {
        return Err(AuthError::NotFound("api key not found".into()));
    };

    if let Err(e) = keys.update_last_used(&record.id, Utc::now()).await {
        warn!(key_id = %record.id, error = %e, "failed to update api key last_used_at");
    }

    let agent = agents
        .find_agent_by_id(agent_id)
        .await?
        .ok_or_else(|| AuthError::NotFound(format!("agent {agent_id} not found")))?;
    Ok(AgentPrincipal::from(&agent))
}

/// Verify a human (`solvr_sk_`) API key. The resulting principal has role `user`.
pub async fn verify_user_key(
    keys: &dyn ApiKeyStore,
    humans: &dyn HumanStore,
    raw: &str,
) -> Result<HumanPrincipal, AuthError> {
    if !is_user_key(raw) {
        return Err(AuthError::InvalidSignature("not a user api key".into()));
    }

    let record = keys
        .find_by_hash(&hash_token(raw))
        .await?
        .ok_or_else(|| AuthError::NotFound("api key not found".into()))?;

    let KeyOwner::Human(user_id) = &record.owner else {
        return Err(AuthError::NotFound("api key not found".into()));
    };

    if let Err(e) = keys.update_last_used(&record.id, Utc::now()).await {
        warn!(key_id = %record.id, error = %e, "failed to update api key last_used_at");
    }

    let user = humans
        .find_human_by_id(user_id)
        .await?
        .ok_or_else(|| AuthError::NotFound(format!("user {user_id} not found")))?;
    Ok(HumanPrincipal {
        user_id: user.id,
        email: user.email,
        role: Role::User,
    })
}

/// Verify any bearer credential, dispatching on its prefix.
pub async fn verify_bearer(
    stores: &AuthStores,
    settings: &TokenSettings,
    raw: &str,
) -> Result<BearerPrincipal, AuthError> {
    let result = if is_user_key(raw) {
        with_deadline(
            settings.lookup_timeout,
            verify_user_key(stores.api_keys.as_ref(), stores.humans.as_ref(), raw),
        )
        .await
        .map(BearerPrincipal::Human)
    } else if is_agent_key(raw) {
        with_deadline(
            settings.lookup_timeout,
            verify_agent_key(stores.api_keys.as_ref(), stores.agents.as_ref(), raw),
        )
        .await
        .map(BearerPrincipal::Agent)
    } else {
        verify_human(raw, settings.jwt_secret.as_bytes()).map(BearerPrincipal::Human)
    };

    if let Err(e) = &result {
        debug!(error = %e, "bearer verification failed");
    }
    result
}

/// Check the admin shared secret in constant time.
///
/// Not an identity: passing the gate says nothing about who the caller is.
pub fn verify_admin_key(configured: Option<&str>, presented: Option<&str>) -> Result<(), AuthError> {
    let configured = configured
        .filter(|k| !k.is_empty())
        .ok_or_else(|| AuthError::Unavailable("admin API key is not configured".into()))?;
    let presented =
        presented.ok_or_else(|| AuthError::Unauthorized("missing admin API key".into()))?;

    if bool::from(configured.as_bytes().ct_eq(presented.as_bytes())) {
        Ok(())
    } else {
        Err(AuthError::Unauthorized("invalid admin API key".into()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::auth::api_keys::{generate_agent_key, issue_api_key, rotate_agent_key};
    use crate::auth::jwt::generate_access_token;
    use crate::models::auth::{Agent, ApiKeyRecord, User};
    use crate::store::MemoryStore;

    const SECRET: &str = "verifier-test-secret-0123456789abcdef";

    fn seeded() -> (Arc<MemoryStore>, AuthStores, TokenSettings) {
        let store = Arc::new(MemoryStore::new());
        store.insert_user(User {
            id: "user-1".into(),
            email: "h@example.com".into(),
            display_name: None,
            role: Role::Admin,
        });
        let mut agent = Agent::new("agent_a", "Agent A");
        agent.human_id = Some("user-1".into());
        store.insert_agent(agent);
        let stores = AuthStores::from_shared(store.clone());
        (store, stores, TokenSettings::new(SECRET))
    }

    #[tokio::test]
    async fn agent_key_resolves_agent_and_touches_last_used() {
        let (store, stores, settings) = seeded();
        let (raw, record) = issue_api_key(
            &*store,
            KeyOwner::Agent("agent_a".into()),
            "default",
            Utc::now(),
        )
        .await
        .unwrap();

        let principal = verify_bearer(&stores, &settings, &raw).await.unwrap();
        assert_eq!(
            principal,
            BearerPrincipal::Agent(AgentPrincipal {
                agent_id: "agent_a".into(),
                display_name: "Agent A".into(),
                human_id: Some("user-1".into()),
            })
        );

        let stored = store.find_by_hash(&record.key_hash).await.unwrap().unwrap();
        assert!(stored.last_used_at.is_some());
    }

    #[tokio::test]
    async fn unknown_and_rotated_agent_keys_are_not_found() {
        let (store, stores, settings) = seeded();
        let err = verify_bearer(&stores, &settings, &generate_agent_key())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::NotFound(_)));

        let (old, _) = issue_api_key(
            &*store,
            KeyOwner::Agent("agent_a".into()),
            "default",
            Utc::now(),
        )
        .await
        .unwrap();
        rotate_agent_key(&*store, "agent_a", Utc::now())
            .await
            .unwrap();

        let err = verify_bearer(&stores, &settings, &old).await.unwrap_err();
        assert!(matches!(err, AuthError::NotFound(_)));
    }

    #[tokio::test]
    async fn user_key_resolves_human_with_user_role() {
        let (store, stores, settings) = seeded();
        let (raw, _) = issue_api_key(
            &*store,
            KeyOwner::Human("user-1".into()),
            "cli",
            Utc::now(),
        )
        .await
        .unwrap();

        let principal = verify_bearer(&stores, &settings, &raw).await.unwrap();
        assert_eq!(
            principal,
            BearerPrincipal::Human(HumanPrincipal {
                user_id: "user-1".into(),
                email: "h@example.com".into(),
                role: Role::User,
            })
        );
    }

    #[tokio::test]
    async fn jwt_bearer_resolves_human_without_lookup() {
        let (_store, stores, settings) = seeded();
        let token = generate_access_token(
            "user-9",
            "nine@example.com",
            Role::SuperAdmin,
            SECRET.as_bytes(),
            chrono::Duration::minutes(5),
        )
        .unwrap();

        let BearerPrincipal::Human(human) = verify_bearer(&stores, &settings, &token).await.unwrap()
        else {
            panic!("expected a human principal");
        };
        assert_eq!(human.user_id, "user-9");
        assert_eq!(human.role, Role::SuperAdmin);
    }

    #[tokio::test]
    async fn malformed_agent_prefix_is_invalid_before_lookup() {
        let (store, _, _) = seeded();
        let err = verify_agent_key(&*store, &*store, "sk_live_abc")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidSignature(_)));
    }

    struct SlowKeys;

    #[async_trait]
    impl ApiKeyStore for SlowKeys {
        async fn create(&self, _record: &ApiKeyRecord) -> Result<(), AuthError> {
            Ok(())
        }

        async fn find_by_hash(&self, _key_hash: &str) -> Result<Option<ApiKeyRecord>, AuthError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(None)
        }

        async fn update_last_used(
            &self,
            _id: &str,
            _now: chrono::DateTime<Utc>,
        ) -> Result<(), AuthError> {
            Ok(())
        }

        async fn revoke_for_owner(
            &self,
            _owner: &KeyOwner,
            _now: chrono::DateTime<Utc>,
        ) -> Result<u64, AuthError> {
            Ok(0)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_lookup_denies_with_unavailable() {
        let (_store, mut stores, mut settings) = seeded();
        stores.api_keys = Arc::new(SlowKeys);
        settings.lookup_timeout = Duration::from_millis(50);

        let err = verify_bearer(&stores, &settings, &generate_agent_key())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Unavailable(_)));
    }

    #[test]
    fn admin_gate() {
        assert!(verify_admin_key(Some("s3cret"), Some("s3cret")).is_ok());
        assert!(matches!(
            verify_admin_key(Some("s3cret"), Some("s3cret2")),
            Err(AuthError::Unauthorized(_))
        ));
        assert!(matches!(
            verify_admin_key(Some("s3cret"), None),
            Err(AuthError::Unauthorized(_))
        ));
        assert!(matches!(
            verify_admin_key(None, Some("anything")),
            Err(AuthError::Unavailable(_))
        ));
        assert!(matches!(
            verify_admin_key(Some(""), Some("")),
            Err(AuthError::Unavailable(_))
        ));
    }
}
