//! Human sessions: an access token plus a rotating refresh token.

use chrono::{DateTime, Utc};
use tracing::warn;

use super::jwt::generate_access_token;
use super::refresh::{issue_refresh_token, redeem_refresh_token};
use super::verifier::with_deadline;
use super::{AuthError, TokenSettings};
use crate::models::auth::{TokenPair, User};
use crate::store::AuthStores;

fn token_pair(
    user: &User,
    settings: &TokenSettings,
    refresh_token: String,
) -> Result<TokenPair, AuthError> {
    let access_token = generate_access_token(
        &user.id,
        &user.email,
        user.role,
        settings.jwt_secret.as_bytes(),
        settings.access_token_ttl,
    )?;
    Ok(TokenPair {
        access_token,
        refresh_token,
        token_type: "Bearer".to_string(),
        expires_in: settings.access_token_ttl.num_seconds(),
    })
}

/// Start a session for an authenticated user (login / OAuth completion).
pub async fn issue_session(
    stores: &AuthStores,
    settings: &TokenSettings,
    user: &User,
    now: DateTime<Utc>,
) -> Result<TokenPair, AuthError> {
    let (refresh_token, _) = issue_refresh_token(
        stores.refresh_tokens.as_ref(),
        &user.id,
        settings.refresh_token_ttl,
        now,
    )
    .await?;
    token_pair(user, settings, refresh_token)
}

/// Rotate a refresh token and mint a fresh pair for its user.
///
/// Store calls run under `settings.lookup_timeout`; elapsed is `Unavailable`.
pub async fn refresh_session(
    stores: &AuthStores,
    settings: &TokenSettings,
    raw_refresh_token: &str,
    now: DateTime<Utc>,
) -> Result<(User, TokenPair), AuthError> {
    let rotation = with_deadline(
        settings.lookup_timeout,
        redeem_refresh_token(
            stores.refresh_tokens.as_ref(),
            raw_refresh_token,
            settings.refresh_token_ttl,
            now,
        ),
    )
    .await?;

    let user = with_deadline(
        settings.lookup_timeout,
        stores.humans.find_human_by_id(&rotation.user_id),
    )
    .await?;
    let Some(user) = user else {
        if let Err(e) = stores.refresh_tokens.delete(&rotation.record.id).await {
            warn!(error = %e, "failed to drop refresh token of deleted user");
        }
        return Err(AuthError::Unauthorized("user no longer exists".into()));
    };

    let pair = token_pair(&user, settings, rotation.refresh_token)?;
    Ok((user, pair))
}
