// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Session Manager
//!
//! Owns every live [`CoralAgentGraphSession`] together with the
//! [`Orchestrator`] holding that session's spawned agents. Insertion goes
//! through the dashmap entry API so two callers can never create two sessions
//! under one id.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Notify, Semaphore};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::application::orchestrator::Orchestrator;
use crate::domain::connection::ConnectionSettings;
use crate::domain::events::SessionEvent;
use crate::domain::graph::{AgentGraph, AgentGraphRequest, GraphError};
use crate::domain::registry::AgentRegistry;
use crate::domain::runtime::RuntimeError;
use crate::domain::session::CoralAgentGraphSession;
use crate::infrastructure::runtime::DESTROY_CONCURRENCY;

#[derive(Debug, Error)]
pub enum SessionManagerError {
    #[error("Session '{0}' already exists")]
    SessionExists(String),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("Failed to start agent '{agent}': {source}")]
    Spawn {
        agent: String,
        #[source]
        source: RuntimeError,
    },
}

pub struct SessionManager {
    sessions: DashMap<String, Arc<CoralAgentGraphSession>>,
    orchestrators: DashMap<String, Arc<Orchestrator>>,
    registry: Arc<AgentRegistry>,
    connection: ConnectionSettings,
    dev_mode: bool,
    destroy_permits: Arc<Semaphore>,
    session_added: Notify,
}

impl SessionManager {
    pub fn new(registry: Arc<AgentRegistry>, connection: ConnectionSettings, dev_mode: bool) -> Self {
        Self {
            sessions: DashMap::new(),
            orchestrators: DashMap::new(),
            registry,
            connection,
            dev_mode,
            destroy_permits: Arc::new(Semaphore::new(DESTROY_CONCURRENCY)),
            session_added: Notify::new(),
        }
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub fn dev_mode(&self) -> bool {
        self.dev_mode
    }

    pub fn connection_url(&self, session: &CoralAgentGraphSession, agent_name: &str) -> String {
        self.connection.connection_url(
            &session.application_id,
            &session.privacy_key,
            &session.id,
            agent_name,
            self.dev_mode,
        )
    }

    fn new_orchestrator(&self) -> Arc<Orchestrator> {
        Arc::new(Orchestrator::new(self.registry.clone(), self.destroy_permits.clone()))
    }

    /// Validate a wire graph against the registry, then [`Self::create_session`].
    pub async fn create_session_from_request(
        &self,
        application_id: &str,
        privacy_key: &str,
        session_id: Option<String>,
        graph: Option<AgentGraphRequest>,
    ) -> Result<Arc<CoralAgentGraphSession>, SessionManagerError> {
        let graph = graph.map(|g| g.into_graph(&self.registry)).transpose()?;
        self.create_session(application_id, privacy_key, session_id, graph).await
    }

    /// Store a new session and start every agent of `graph`. If any agent
    /// fails to start, the ones already started are destroyed and the session
    /// is removed again.
    pub async fn create_session(
        &self,
        application_id: &str,
        privacy_key: &str,
        session_id: Option<String>,
        graph: Option<AgentGraph>,
    ) -> Result<Arc<CoralAgentGraphSession>, SessionManagerError> {
        let session_id = session_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let blocking_groups = graph.as_ref().map(AgentGraph::blocking_groups).unwrap_or_default();
        let session = Arc::new(CoralAgentGraphSession::new(
            session_id.clone(),
            application_id,
            privacy_key,
            blocking_groups,
        ));

        match self.sessions.entry(session_id.clone()) {
            Entry::Occupied(_) => return Err(SessionManagerError::SessionExists(session_id)),
            Entry::Vacant(entry) => {
                entry.insert(session.clone());
            }
        }
        let orchestrator = self.new_orchestrator();
        self.orchestrators.insert(session_id.clone(), orchestrator.clone());

        if let Some(graph) = &graph {
            let mut names: Vec<_> = graph.agents.keys().collect();
            names.sort();
            for name in names {
                let url = self.connection_url(&session, name.as_str());
                if let Err(source) = orchestrator.spawn(name, &graph.agents[name], &url) {
                    error!(session_id = %session_id, agent = %name, "Agent failed to start: {}", source);
                    orchestrator.destroy().await;
                    self.orchestrators.remove(&session_id);
                    self.sessions.remove(&session_id);
                    return Err(SessionManagerError::Spawn {
                        agent: name.to_string(),
                        source,
                    });
                }
                session.publish(SessionEvent::AgentReady { agent: name.to_string() });
            }
        }

        info!(
            session_id = %session_id,
            application_id,
            blocking_groups = session.blocking_groups().len(),
            "Session created"
        );
        metrics::counter!("coral_sessions_created_total").increment(1);
        self.session_added.notify_waiters();
        Ok(session)
    }

    /// Return the session, creating an empty one if the id is unknown.
    pub fn get_or_create_session(
        &self,
        session_id: &str,
        application_id: &str,
        privacy_key: &str,
    ) -> Arc<CoralAgentGraphSession> {
        let session = match self.sessions.entry(session_id.to_string()) {
            Entry::Occupied(entry) => return entry.get().clone(),
            Entry::Vacant(entry) => {
                let session = Arc::new(CoralAgentGraphSession::new(session_id, application_id, privacy_key, vec![]));
                entry.insert(session.clone());
                session
            }
        };

        self.orchestrators.insert(session_id.to_string(), self.new_orchestrator());
        info!(session_id, application_id, "Session created on demand");
        metrics::counter!("coral_sessions_created_total").increment(1);
        self.session_added.notify_waiters();
        session
    }

    pub fn get_session(&self, session_id: &str) -> Option<Arc<CoralAgentGraphSession>> {
        self.sessions.get(session_id).map(|s| s.value().clone())
    }

    pub fn sessions(&self) -> Vec<Arc<CoralAgentGraphSession>> {
        self.sessions.iter().map(|s| s.value().clone()).collect()
    }

    /// Wait up to `timeout` for a session with this id to appear.
    pub async fn wait_for_session(&self, session_id: &str, timeout: Duration) -> Option<Arc<CoralAgentGraphSession>> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.session_added.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(session) = self.get_session(session_id) {
                return Some(session);
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.get_session(session_id);
            }
        }
    }

    /// Destroy the agents of every session.
    pub async fn shutdown(&self) {
        let orchestrators: Vec<Arc<Orchestrator>> = self.orchestrators.iter().map(|o| o.value().clone()).collect();
        if orchestrators.is_empty() {
            return;
        }
        warn!(sessions = orchestrators.len(), "Shutting down session agents");
        join_all(orchestrators.iter().map(|o| o.destroy())).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::agent::{AgentName, AgentType};
    use crate::domain::graph::GraphAgent;
    use crate::domain::options::OptionValues;
    use crate::domain::registry::RegistryAgent;
    use crate::domain::runtime::AgentRuntime;
    use std::collections::{BTreeSet, HashMap};

    fn manager(runtime: AgentRuntime) -> SessionManager {
        let registry = AgentRegistry::new(HashMap::from([(
            AgentType::from("worker"),
            RegistryAgent { runtime, options: vec![] },
        )]));
        SessionManager::new(Arc::new(registry), ConnectionSettings::default(), false)
    }

    fn graph(names: &[&str]) -> AgentGraph {
        let agents = names
            .iter()
            .map(|n| {
                (
                    AgentName::from(*n),
                    GraphAgent::Local {
                        agent_type: AgentType::from("worker"),
                        options: OptionValues::new(),
                        blocking: true,
                    },
                )
            })
            .collect();
        let links = vec![names.iter().map(|n| AgentName::from(*n)).collect::<BTreeSet<_>>()];
        AgentGraph::new(agents, links)
    }

    #[tokio::test]
    async fn test_create_session_rejects_duplicate_id() {
        let manager = manager(AgentRuntime::Docker { container: "x".into() });
        let session = manager
            .create_session("app", "key", Some("s1".into()), None)
            .await
            .unwrap();
        assert_eq!(session.id, "s1");

        let err = manager
            .create_session("app", "key", Some("s1".into()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionManagerError::SessionExists(_)));
        assert_eq!(manager.sessions().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_spawn_removes_session() {
        let manager = manager(AgentRuntime::Docker { container: "x".into() });
        let err = manager
            .create_session("app", "key", Some("s1".into()), Some(graph(&["a"])))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionManagerError::Spawn { .. }));
        assert!(manager.get_session("s1").is_none());
    }

    #[tokio::test]
    async fn test_get_or_create_returns_same_session() {
        let manager = Arc::new(manager(AgentRuntime::Docker { container: "x".into() }));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let manager = manager.clone();
                tokio::spawn(async move { manager.get_or_create_session("dev", "app", "key") })
            })
            .collect();

        let mut sessions = Vec::new();
        for handle in handles {
            sessions.push(handle.await.unwrap());
        }
        assert!(sessions.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(manager.sessions().len(), 1);
    }

    #[tokio::test]
    async fn test_wait_for_session() {
        let manager = Arc::new(manager(AgentRuntime::Docker { container: "x".into() }));
        assert!(manager.wait_for_session("late", Duration::from_millis(50)).await.is_none());

        let waiter = tokio::spawn({
            let manager = manager.clone();
            async move { manager.wait_for_session("late", Duration::from_secs(5)).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        manager.get_or_create_session("late", "app", "key");

        assert_eq!(waiter.await.unwrap().unwrap().id, "late");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_create_session_spawns_graph_and_computes_groups() {
        let manager = manager(AgentRuntime::Executable {
            command: vec!["/bin/sh".into(), "-c".into(), "/bin/sleep 30".into()],
            environment: vec![],
        });
        let session = manager
            .create_session("app", "key", None, Some(graph(&["a", "b"])))
            .await
            .unwrap();

        assert_eq!(session.blocking_groups().len(), 1);
        assert_eq!(session.blocking_groups()[0].len(), 2);
        assert!(Uuid::parse_str(&session.id).is_ok());

        manager.shutdown().await;
    }
}
