//! Shared fixtures: an in-memory backed router plus seeded principals.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use solvr_api::{AppState, config::ApiConfig};
use solvr_core::auth::api_keys::issue_api_key;
use solvr_core::auth::jwt::generate_access_token;
use solvr_core::models::auth::{Agent, KeyOwner, Role, User};
use solvr_core::store::{AuthStores, MemoryStore};
use tower::ServiceExt;

pub const SECRET: &str = "integration-test-secret-0123456789abcdef";
pub const ADMIN_KEY: &str = "admin-shared-secret";

pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub stores: AuthStores,
    pub config: ApiConfig,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(ApiConfig::for_secret(SECRET))
    }

    pub fn with_admin_key() -> Self {
        let mut config = ApiConfig::for_secret(SECRET);
        config.admin_api_key = Some(ADMIN_KEY.into());
        Self::with_config(config)
    }

    fn with_config(config: ApiConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            stores: AuthStores::from_shared(store.clone()),
            store,
            config,
        }
    }

    pub fn router(&self) -> Router {
        solvr_api::router(AppState {
            stores: self.stores.clone(),
            config: self.config.clone(),
        })
    }

    pub fn add_user(&self, id: &str, role: Role) -> User {
        let user = User {
            id: id.into(),
            email: format!("{id}@example.com"),
            display_name: None,
            role,
        };
        self.store.insert_user(user.clone());
        user
    }

    pub fn add_agent(&self, id: &str, human_id: Option<&str>) -> Agent {
        let mut agent = Agent::new(id, format!("Agent {id}"));
        agent.human_id = human_id.map(str::to_string);
        self.store.insert_agent(agent.clone());
        agent
    }

    /// Access token for `user`, signed with the app secret.
    pub fn jwt_for(&self, user: &User) -> String {
        generate_access_token(
            &user.id,
            &user.email,
            user.role,
            SECRET.as_bytes(),
            chrono::Duration::minutes(15),
        )
        .expect("sign access token")
    }

    /// Fresh agent API key.
    pub async fn key_for(&self, agent: &Agent) -> String {
        let (raw, _) = issue_api_key(
            &*self.store,
            KeyOwner::Agent(agent.id.clone()),
            "default",
            Utc::now(),
        )
        .await
        .expect("issue agent key");
        raw
    }

    /// Send a request and return the status and parsed JSON body
    /// (`Null` for an empty body).
    pub async fn send(&self, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let resp = self.router().oneshot(req).await.expect("request");
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .expect("read body");
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("parse JSON")
        };
        (status, json)
    }
}

pub fn request(method: &str, uri: &str, bearer: Option<&str>, body: Option<serde_json::Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .expect("build request"),
        None => builder.body(Body::empty()).expect("build request"),
    }
}
