// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use coral_core::application::{SessionManager, SessionManagerError};
use coral_core::domain::agent::AgentName;
use coral_core::domain::connection::ConnectionSettings;
use coral_core::domain::events::SessionEvent;
use coral_core::domain::graph::{AgentGraphRequest, GraphError};
use coral_core::infrastructure::AppConfigLoader;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

const CONFIG: &str = r#"
applications:
  - id: app
    name: App
    privacyKeys: [key]
registry:
  sleeper:
    runtime:
      type: executable
      command: ["/bin/sh", "-c", "/bin/sleep 30"]
      environment:
        - option: MODEL
    options:
      - type: string
        name: MODEL
        default: small
      - type: number
        name: temperature
        default: 0.3
  docker-agent:
    runtime:
      type: docker
      container: some/image
"#;

fn manager(dev_mode: bool) -> SessionManager {
    let config = AppConfigLoader::parse_yaml(CONFIG, "test").unwrap();
    SessionManager::new(
        Arc::new(config.registry),
        ConnectionSettings::new("127.0.0.1", 5555),
        dev_mode,
    )
}

fn graph(value: serde_json::Value) -> AgentGraphRequest {
    serde_json::from_value(value).unwrap()
}

fn group(names: &[&str]) -> BTreeSet<AgentName> {
    names.iter().map(|n| AgentName::from(*n)).collect()
}

#[tokio::test]
async fn test_blocking_groups_follow_links() {
    let manager = manager(false);
    let request = graph(serde_json::json!({
        "agents": {
            "a": { "type": "remote", "remote": { "host": "h", "agentType": "x", "appId": "app", "privacyKey": "key" }, "blocking": true },
            "b": { "type": "remote", "remote": { "host": "h", "agentType": "x", "appId": "app", "privacyKey": "key" } },
            "c": { "type": "remote", "remote": { "host": "h", "agentType": "x", "appId": "app", "privacyKey": "key" } },
            "d": { "type": "remote", "remote": { "host": "h", "agentType": "x", "appId": "app", "privacyKey": "key" } }
        },
        "links": [["a", "b"], ["b", "c"]]
    }));
    let graph = request.into_graph(manager.registry()).unwrap();

    let groups = graph.blocking_groups();
    assert_eq!(groups, vec![group(&["a", "b", "c"]), group(&["d"])]);
}

#[tokio::test]
async fn test_unknown_agent_type_is_rejected() {
    let manager = manager(false);
    let request = graph(serde_json::json!({
        "agents": { "a": { "type": "local", "agentType": "missing" } },
        "links": []
    }));

    let err = manager
        .create_session_from_request("app", "key", None, Some(request))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionManagerError::Graph(GraphError::UnknownAgentType(_))));
    assert!(manager.sessions().is_empty());
}

#[tokio::test]
async fn test_option_type_mismatch_is_rejected() {
    let manager = manager(false);
    let request = graph(serde_json::json!({
        "agents": { "a": { "type": "local", "agentType": "sleeper", "options": { "temperature": "hot" } } },
        "links": []
    }));

    let err = manager
        .create_session_from_request("app", "key", None, Some(request))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionManagerError::Graph(GraphError::OptionTypeMismatch { .. })));
}

#[tokio::test]
async fn test_failed_spawn_removes_session() {
    let manager = manager(false);
    let request = graph(serde_json::json!({
        "agents": { "boxed": { "type": "local", "agentType": "docker-agent" } },
        "links": []
    }));

    let err = manager
        .create_session_from_request("app", "key", Some("s1".to_string()), Some(request))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionManagerError::Spawn { .. }));
    assert!(manager.get_session("s1").is_none());
}

#[cfg(unix)]
#[tokio::test]
async fn test_local_agents_spawn_and_shutdown() {
    let manager = manager(false);
    let request = graph(serde_json::json!({
        "agents": {
            "first": { "type": "local", "agentType": "sleeper", "options": { "MODEL": "large" } },
            "second": { "type": "local", "agentType": "sleeper", "blocking": false }
        },
        "links": [["first", "second"]]
    }));

    let session = manager
        .create_session_from_request("app", "key", Some("live".to_string()), Some(request))
        .await
        .unwrap();
    assert_eq!(session.blocking_groups(), [group(&["first"])]);

    let found = manager.wait_for_session("live", Duration::from_millis(10)).await;
    assert!(found.is_some());

    tokio::time::timeout(Duration::from_secs(10), manager.shutdown())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_wait_for_session_sees_late_creation() {
    let manager = Arc::new(manager(true));
    let waiter = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.wait_for_session("late", Duration::from_secs(2)).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    let created = manager.get_or_create_session("late", "app", "key");

    let found = waiter.await.unwrap().unwrap();
    assert!(Arc::ptr_eq(&found, &created));
}

#[tokio::test]
async fn test_session_events_are_broadcast() {
    let manager = manager(true);
    let session = manager.get_or_create_session("events", "app", "key");
    let mut events = session.events();

    session.register_agent(coral_core::domain::agent::Agent::new("alice"));
    let thread = session.create_thread("plan", "alice", &[]).unwrap();
    session.send_message(&thread.id, "alice", "note", &[]).unwrap();

    assert!(matches!(events.recv().await.unwrap(), SessionEvent::AgentRegistered { .. }));
    assert!(matches!(events.recv().await.unwrap(), SessionEvent::ThreadCreated { .. }));
    match events.recv().await.unwrap() {
        SessionEvent::MessageSent { message, .. } => assert_eq!(message.content, "note"),
        other => panic!("unexpected event {:?}", other),
    }
}
