//! Refresh token issuance and single-use rotation.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use super::AuthError;
use super::tokens::{hash_token, random_url_safe};
use crate::models::auth::RefreshTokenRecord;
use crate::store::RefreshTokenStore;
use crate::uuid::new_id;

/// Random bytes behind each refresh token, before encoding.
pub const REFRESH_TOKEN_BYTES: usize = 64;

/// Result of a successful redemption.
#[derive(Debug, Clone)]
pub struct Rotation {
    pub user_id: String,
    /// The replacement raw token; shown to the client once.
    pub refresh_token: String,
    pub record: RefreshTokenRecord,
}

/// Issue a refresh token for `user_id`. Only its hash is persisted.
pub async fn issue_refresh_token(
    store: &dyn RefreshTokenStore,
    user_id: &str,
    ttl: Duration,
    now: DateTime<Utc>,
) -> Result<(String, RefreshTokenRecord), AuthError> {
    if user_id.is_empty() {
        return Err(AuthError::ValidationError("user_id is required".into()));
    }

    let raw = random_url_safe(REFRESH_TOKEN_BYTES);
    let record = RefreshTokenRecord {
        id: new_id(),
        user_id: user_id.to_string(),
        token_hash: hash_token(&raw),
        expires_at: now + ttl,
        created_at: now,
    };
    store.create(&record).await?;
    Ok((raw, record))
}

/// Consume a refresh token and issue its replacement.
///
/// The old record is deleted before the new one exists; of two concurrent
/// redemptions only the one whose delete removed the row proceeds, the other
/// sees `NotFound`, same as a token that was never issued.
pub async fn redeem_refresh_token(
    store: &dyn RefreshTokenStore,
    raw: &str,
    ttl: Duration,
    now: DateTime<Utc>,
) -> Result<Rotation, AuthError> {
    let record = store
        .get_by_hash(&hash_token(raw))
        .await?
        .ok_or_else(|| AuthError::NotFound("refresh token not found".into()))?;

    if record.is_expired_at(now) {
        store.delete(&record.id).await?;
        debug!(token_id = %record.id, "expired refresh token presented");
        return Err(AuthError::Expired("refresh token has expired".into()));
    }

    if !store.delete(&record.id).await? {
        return Err(AuthError::NotFound("refresh token not found".into()));
    }

    let (refresh_token, new_record) = issue_refresh_token(store, &record.user_id, ttl, now).await?;
    info!(user_id = %record.user_id, old = %record.id, new = %new_record.id, "rotated refresh token");
    Ok(Rotation {
        user_id: record.user_id,
        refresh_token,
        record: new_record,
    })
}

pub async fn revoke_refresh_token(store: &dyn RefreshTokenStore, id: &str) -> Result<(), AuthError> {
    store.delete(id).await?;
    Ok(())
}

/// Revoke by raw value. Unknown tokens are not an error.
///
/// With `owner` set, a token belonging to someone else is left alone.
pub async fn revoke_by_raw(
    store: &dyn RefreshTokenStore,
    raw: &str,
    owner: Option<&str>,
) -> Result<bool, AuthError> {
    let Some(record) = store.get_by_hash(&hash_token(raw)).await? else {
        return Ok(false);
    };
    if owner.is_some_and(|user_id| user_id != record.user_id) {
        return Ok(false);
    }
    store.delete(&record.id).await
}

pub async fn revoke_all_for_user(
    store: &dyn RefreshTokenStore,
    user_id: &str,
) -> Result<u64, AuthError> {
    let removed = store.delete_by_user(user_id).await?;
    info!(user_id, removed, "revoked all refresh tokens");
    Ok(removed)
}

pub async fn cleanup_expired(
    store: &dyn RefreshTokenStore,
    now: DateTime<Utc>,
) -> Result<u64, AuthError> {
    store.delete_expired(now).await
}
