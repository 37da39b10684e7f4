//! Agent self-registration and key revocation over HTTP.

mod common;

use axum::http::StatusCode;
use common::{TestApp, request};
use serde_json::json;
use solvr_core::models::auth::Role;

#[tokio::test]
async fn registered_agent_can_use_its_key() {
    let app = TestApp::new();

    let (status, body) = app
        .send(request(
            "POST",
            "/v1/agents/register",
            None,
            Some(json!({ "name": "helper_bot" })),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["agent"]["id"], "agent_helper_bot");
    assert_eq!(body["agent"]["display_name"], "helper_bot");
    assert!(body["agent"]["human_id"].is_null());
    assert!(body["important"].as_str().is_some_and(|s| !s.is_empty()));
    let key = body["api_key"].as_str().expect("api_key").to_string();
    assert!(key.starts_with("solvr_") && !key.starts_with("solvr_sk_"));

    let (status, me) = app.send(request("GET", "/v1/me", Some(&key), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["author_type"], "agent");
    assert_eq!(me["author_id"], "agent_helper_bot");

    let (status, _) = app
        .send(request("POST", "/v1/agents/me/claim", Some(&key), None))
        .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn registration_rejects_bad_and_taken_names() {
    let app = TestApp::new();

    let (status, body) = app
        .send(request(
            "POST",
            "/v1/agents/register",
            None,
            Some(json!({ "name": "no spaces" })),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let register = || {
        request(
            "POST",
            "/v1/agents/register",
            None,
            Some(json!({ "name": "helper_bot" })),
        )
    };
    let (status, _) = app.send(register()).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = app.send(register()).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");
}

#[tokio::test]
async fn owner_revokes_agent_key() {
    let app = TestApp::new();
    let owner = app.add_user("h1", Role::User);
    let agent = app.add_agent("a1", Some("h1"));
    let key = app.key_for(&agent).await;

    let (status, body) = app
        .send(request(
            "DELETE",
            "/v1/agents/a1/api-key",
            Some(&app.jwt_for(&owner)),
            None,
        ))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_null());

    let (status, _) = app.send(request("GET", "/v1/me", Some(&key), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn agent_may_revoke_its_own_key() {
    let app = TestApp::new();
    let agent = app.add_agent("a1", None);
    let key = app.key_for(&agent).await;

    let (status, _) = app
        .send(request("DELETE", "/v1/agents/a1/api-key", Some(&key), None))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.send(request("GET", "/v1/me", Some(&key), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn revocation_needs_write_access() {
    let app = TestApp::new();
    let stranger = app.add_user("h2", Role::User);
    app.add_user("h1", Role::User);
    let agent = app.add_agent("a1", Some("h1"));
    let sibling = app.add_agent("a2", Some("h1"));
    let key = app.key_for(&agent).await;
    let sibling_key = app.key_for(&sibling).await;

    let (status, _) = app
        .send(request("DELETE", "/v1/agents/a1/api-key", None, None))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .send(request(
            "DELETE",
            "/v1/agents/a1/api-key",
            Some(&app.jwt_for(&stranger)),
            None,
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(request("DELETE", "/v1/agents/a1/api-key", Some(&sibling_key), None))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(request(
            "DELETE",
            "/v1/agents/missing/api-key",
            Some(&app.jwt_for(&stranger)),
            None,
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Still valid after every refused attempt.
    let (status, _) = app.send(request("GET", "/v1/me", Some(&key), None)).await;
    assert_eq!(status, StatusCode::OK);
}
