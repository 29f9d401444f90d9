// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use coral_core::application::SessionManager;
use coral_core::domain::connection::ConnectionSettings;
use coral_core::infrastructure::AppConfigLoader;
use coral_server::server::build_app;

const CONFIG: &str = r#"
applications:
  - id: app
    name: Test App
    privacyKeys: [secret]
registry: {}
"#;

fn test_app(dev_mode: bool) -> (Router, Arc<SessionManager>) {
    let config = AppConfigLoader::parse_yaml(CONFIG, "test").unwrap();
    build_app(config, ConnectionSettings::new("127.0.0.1", 5555), dev_mode)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(match body {
            Some(body) => Body::from(body.to_string()),
            None => Body::empty(),
        })
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn call_tool(app: &Router, session: &str, agent: &str, tool: &str, args: Value) -> Value {
    let uri = format!("/app/secret/{}/tools/{}?agentId={}", session, tool, agent);
    let (status, body) = send(app, "POST", &uri, Some(args)).await;
    assert_eq!(status, StatusCode::OK, "{} failed: {}", tool, body);
    body
}

#[tokio::test]
async fn test_health() {
    let (app, _) = test_app(false);
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_create_session_requires_known_credentials() {
    let (app, manager) = test_app(false);
    let (status, body) = send(
        &app,
        "POST",
        "/sessions",
        Some(json!({ "applicationId": "app", "privacyKey": "wrong" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Invalid"));
    assert!(manager.sessions().is_empty());
}

#[tokio::test]
async fn test_create_session_returns_ids() {
    let (app, manager) = test_app(false);
    let (status, body) = send(
        &app,
        "POST",
        "/sessions",
        Some(json!({ "applicationId": "app", "privacyKey": "secret", "sessionId": "s1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sessionId"], "s1");
    assert_eq!(body["applicationId"], "app");
    assert!(manager.get_session("s1").is_some());

    let (status, _) = send(
        &app,
        "POST",
        "/sessions",
        Some(json!({ "applicationId": "app", "privacyKey": "secret", "sessionId": "s1" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_agent_type_in_graph_is_bad_request() {
    let (app, _) = test_app(false);
    let (status, _) = send(
        &app,
        "POST",
        "/sessions",
        Some(json!({
            "applicationId": "app",
            "privacyKey": "secret",
            "agentGraph": { "agents": { "a": { "type": "local", "agentType": "nope" } }, "links": [] }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_tool_routes_check_session_credentials() {
    let (app, manager) = test_app(false);
    manager.create_session("app", "secret", Some("s1".to_string()), None).await.unwrap();

    let (status, _) = send(&app, "GET", "/app/wrong/s1/tools", None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, "GET", "/app/secret/missing/tools", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, "GET", "/app/secret/s1/tools", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tools"].as_array().unwrap().len(), 8);

    let (status, _) = send(&app, "POST", "/app/secret/s1/tools/list_agents", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_tool_conversation_over_http() {
    let (app, manager) = test_app(false);
    manager.create_session("app", "secret", Some("s1".to_string()), None).await.unwrap();

    call_tool(&app, "s1", "creator", "register_agent", json!({})).await;
    call_tool(&app, "s1", "p1", "register_agent", json!({ "description": "helper" })).await;

    let created = call_tool(
        &app,
        "s1",
        "creator",
        "create_thread",
        json!({ "threadName": "T", "participantIds": ["p1"] }),
    )
    .await;
    assert_eq!(created["isError"], false);
    let text = created["text"].as_str().unwrap();
    let thread_id = text.lines().find_map(|l| l.strip_prefix("ID: ")).unwrap().to_string();

    let sent = call_tool(
        &app,
        "s1",
        "creator",
        "send_message",
        json!({ "threadId": thread_id, "content": "hello", "mentions": ["p1"] }),
    )
    .await;
    assert_eq!(sent["isError"], false);

    let waited = call_tool(&app, "s1", "p1", "wait_for_mentions", json!({ "timeoutMs": 1000 })).await;
    let text = waited["text"].as_str().unwrap();
    assert!(text.contains("<content>hello</content>"));
    assert!(text.contains("<sender id=\"creator\" />"));

    let unknown = call_tool(&app, "s1", "p1", "fly_away", json!({})).await;
    assert_eq!(unknown["isError"], true);
}

#[tokio::test]
async fn test_devmode_routes_are_forbidden_outside_dev_mode() {
    let (app, manager) = test_app(false);
    let (status, _) = send(&app, "GET", "/devmode/app/secret/dev1/tools", None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(manager.get_session("dev1").is_none());
}

#[tokio::test]
async fn test_devmode_creates_session_and_sets_barrier() {
    let (app, manager) = test_app(true);
    let (status, _) = send(&app, "GET", "/devmode/any/key/dev1/tools?waitForAgents=2", None).await;
    assert_eq!(status, StatusCode::OK);

    let session = manager.get_session("dev1").unwrap();
    assert_eq!(session.application_id, "any");
    assert_eq!(session.dev_required_agent_start_count(), 2);

    // Dev mode also skips the credential check on session creation.
    let (status, _) = send(
        &app,
        "POST",
        "/sessions",
        Some(json!({ "applicationId": "other", "privacyKey": "whatever" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_debug_events_waits_for_missing_session() {
    let (app, _) = test_app(false);
    let (status, _) = send(&app, "GET", "/debug/app/secret/ghost/events?timeout=50", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_connection_requires_agent_id() {
    let (app, manager) = test_app(false);
    manager.create_session("app", "secret", Some("s1".to_string()), None).await.unwrap();
    let (status, _) = send(&app, "GET", "/app/secret/s1/sse", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
