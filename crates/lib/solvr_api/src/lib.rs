//! # solvr_api
//!
//! HTTP API library for Solvr identity and authorization.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use axum::Router;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{delete, get, post};
use solvr_core::store::AuthStores;
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};

use crate::config::ApiConfig;
use crate::handlers::{admin, agents, auth, claims};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Identity repositories (PostgreSQL or in-memory).
    pub stores: AuthStores,
    /// API configuration.
    pub config: ApiConfig,
}

/// Run embedded database migrations.
///
/// Delegates to `solvr_core::migrate::migrate()` which owns the migration files.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    solvr_core::migrate::migrate(pool).await
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let authenticate = from_fn_with_state(state.clone(), middleware::auth::authenticate);

    // Human-only auth endpoints. API keys are turned away before any
    // credential is verified; refresh carries no access token at all.
    let human_auth = Router::new()
        .route("/v1/auth/refresh", post(auth::refresh_handler))
        .merge(
            Router::new()
                .route("/v1/auth/logout", post(auth::logout_handler))
                .route("/v1/auth/logout-all", post(auth::logout_all_handler))
                .route_layer(authenticate.clone()),
        )
        .route_layer(from_fn(middleware::auth::block_agent_keys));

    // Identity is resolved for every request; handlers decide what they need.
    let identified = Router::new()
        .route("/v1/me", get(auth::me_handler))
        .route("/v1/users/me/api-keys", post(auth::create_user_api_key_handler))
        .route(
            "/v1/users/{userId}/sessions",
            delete(auth::revoke_user_sessions_handler),
        )
        .route("/v1/agents/me/claim", post(claims::generate_claim_handler))
        .route("/v1/agents/me/api-key", post(claims::rotate_agent_key_handler))
        .route(
            "/v1/agents/{agentId}/api-key",
            delete(agents::revoke_agent_key_handler),
        )
        .route("/v1/agents/{agentId}/access", get(agents::agent_access_handler))
        .route(
            "/v1/claim/{token}",
            get(claims::claim_info_handler).post(claims::confirm_claim_handler),
        )
        .route_layer(authenticate);

    let public = Router::new().route("/v1/agents/register", post(agents::register_agent_handler));

    let maintenance = Router::new()
        .route("/v1/admin/cleanup", post(admin::cleanup_handler))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware::admin::require_admin_key,
        ));

    Router::new()
        .merge(public)
        .merge(human_auth)
        .merge(identified)
        .merge(maintenance)
        .layer(cors)
        .with_state(state)
}
