//! API key generation, issuance and rotation.
//!
//! Keys are shown to their owner exactly once. Only the SHA-256 hash is
//! persisted, and verification goes through [`super::verifier`].

use chrono::{DateTime, Utc};
use tracing::info;

use super::AuthError;
use super::tokens::{hash_token, random_url_safe};
use crate::models::auth::{ApiKeyRecord, KeyOwner};
use crate::store::ApiKeyStore;
use crate::uuid::new_id;

/// Prefix carried by every agent API key.
pub const AGENT_KEY_PREFIX: &str = "solvr_";

/// Prefix carried by every human (user) API key.
pub const USER_KEY_PREFIX: &str = "solvr_sk_";

/// Random bytes behind each key, before encoding.
const KEY_BYTES: usize = 32;

/// Base64url can start with `sk_`, which would read as a user key.
pub fn generate_agent_key() -> String {
    agent_key_from(|| random_url_safe(KEY_BYTES))
}

fn agent_key_from(mut body: impl FnMut() -> String) -> String {
    loop {
        let key = format!("{AGENT_KEY_PREFIX}{}", body());
        if is_agent_key(&key) {
            return key;
        }
    }
}

pub fn generate_user_key() -> String {
    format!("{USER_KEY_PREFIX}{}", random_url_safe(KEY_BYTES))
}

pub fn is_user_key(key: &str) -> bool {
    key.starts_with(USER_KEY_PREFIX)
}

/// `solvr_` but not `solvr_sk_`.
pub fn is_agent_key(key: &str) -> bool {
    key.starts_with(AGENT_KEY_PREFIX) && !is_user_key(key)
}

/// Issue a new key for `owner`, returning the raw key and its stored record.
pub async fn issue_api_key(
    store: &dyn ApiKeyStore,
    owner: KeyOwner,
    name: &str,
    now: DateTime<Utc>,
) -> Result<(String, ApiKeyRecord), AuthError> {
    if owner.owner_id().is_empty() {
        return Err(AuthError::ValidationError("key owner id is required".into()));
    }

    let raw = match owner {
        KeyOwner::Agent(_) => generate_agent_key(),
        KeyOwner::Human(_) => generate_user_key(),
    };
    let record = ApiKeyRecord {
        id: new_id(),
        owner,
        key_hash: hash_token(&raw),
        name: name.to_string(),
        created_at: now,
        last_used_at: None,
        revoked_at: None,
    };
    store.create(&record).await?;
    info!(
        key_id = %record.id,
        owner_type = %record.owner.owner_type(),
        owner_id = record.owner.owner_id(),
        "issued api key"
    );
    Ok((raw, record))
}

/// Revoke every live key of an agent and issue a replacement.
pub async fn rotate_agent_key(
    store: &dyn ApiKeyStore,
    agent_id: &str,
    now: DateTime<Utc>,
) -> Result<String, AuthError> {
    let owner = KeyOwner::Agent(agent_id.to_string());
    let revoked = store.revoke_for_owner(&owner, now).await?;
    let (raw, _) = issue_api_key(store, owner, "default", now).await?;
    info!(agent_id, revoked, "rotated agent api key");
    Ok(raw)
}

/// Revoke every live key of an agent without issuing a replacement.
pub async fn revoke_agent_keys(
    store: &dyn ApiKeyStore,
    agent_id: &str,
    now: DateTime<Utc>,
) -> Result<u64, AuthError> {
    let revoked = store
        .revoke_for_owner(&KeyOwner::Agent(agent_id.to_string()), now)
        .await?;
    info!(agent_id, revoked, "revoked agent api keys");
    Ok(revoked)
}
