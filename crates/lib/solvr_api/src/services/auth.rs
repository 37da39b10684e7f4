//! Session and credential service, delegating to `solvr_core::auth`.

use chrono::Utc;
use solvr_core::auth::api_keys::issue_api_key;
use solvr_core::auth::refresh::{revoke_all_for_user, revoke_by_raw};
use solvr_core::auth::session::refresh_session;
use solvr_core::auth::TokenSettings;
use solvr_core::models::auth::{HumanPrincipal, KeyOwner};
use solvr_core::store::AuthStores;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::models::{ApiKeyResponse, RevokeSessionsResponse, TokenResponse};

// ---------------------------------------------------------------------------
// Refresh & logout
// ---------------------------------------------------------------------------

/// Rotate a refresh token into a fresh token pair.
pub async fn refresh(
    stores: &AuthStores,
    settings: &TokenSettings,
    refresh_token: &str,
) -> AppResult<TokenResponse> {
    if refresh_token.is_empty() {
        return Err(AppError::Validation("refresh_token is required".into()));
    }
    let (user, pair) = refresh_session(stores, settings, refresh_token, Utc::now())
        .await
        .map_err(|e| e.into_credential_failure("invalid refresh token"))?;
    info!(user_id = %user.id, "refreshed session");
    Ok(pair)
}

/// Revoke one of the caller's refresh tokens. Unknown tokens are ignored.
pub async fn logout(
    stores: &AuthStores,
    user: &HumanPrincipal,
    refresh_token: &str,
) -> AppResult<()> {
    if refresh_token.is_empty() {
        return Err(AppError::Validation("refresh_token is required".into()));
    }
    let revoked = revoke_by_raw(
        stores.refresh_tokens.as_ref(),
        refresh_token,
        Some(&user.user_id),
    )
    .await?;
    info!(user_id = %user.user_id, revoked, "logout");
    Ok(())
}

/// Revoke every refresh token of `user_id`.
pub async fn logout_all(stores: &AuthStores, user_id: &str) -> AppResult<RevokeSessionsResponse> {
    let revoked = revoke_all_for_user(stores.refresh_tokens.as_ref(), user_id).await?;
    Ok(RevokeSessionsResponse { revoked })
}

// ---------------------------------------------------------------------------
// User API keys
// ---------------------------------------------------------------------------

/// Issue a `solvr_sk_` key for a human. The raw key is returned once.
pub async fn create_user_api_key(
    stores: &AuthStores,
    user: &HumanPrincipal,
    name: Option<&str>,
) -> AppResult<ApiKeyResponse> {
    let name = name.map(str::trim).filter(|n| !n.is_empty()).unwrap_or("default");
    if name.len() > 100 {
        return Err(AppError::Validation("name must be at most 100 characters".into()));
    }
    let (api_key, _) = issue_api_key(
        stores.api_keys.as_ref(),
        KeyOwner::Human(user.user_id.clone()),
        name,
        Utc::now(),
    )
    .await?;
    Ok(ApiKeyResponse { api_key })
}
