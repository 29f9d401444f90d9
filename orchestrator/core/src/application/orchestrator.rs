// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Orchestrator
//!
//! Spawns the agents of one session's graph and tears them all down when the
//! session ends. Dispatches on the graph agent and registry runtime variants;
//! only local executable agents can be started today.

use futures::future::join_all;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info};

use crate::domain::agent::AgentName;
use crate::domain::graph::GraphAgent;
use crate::domain::registry::AgentRegistry;
use crate::domain::runtime::{AgentRuntime, OrchestratorHandle, RuntimeError};
use crate::infrastructure::runtime::ExecutableRuntime;

pub struct Orchestrator {
    registry: Arc<AgentRegistry>,
    executable: ExecutableRuntime,
    handles: Mutex<Vec<Box<dyn OrchestratorHandle>>>,
}

impl Orchestrator {
    /// `destroy_permits` is shared by every orchestrator of the process so the
    /// total number of concurrent teardowns stays bounded.
    pub fn new(registry: Arc<AgentRegistry>, destroy_permits: Arc<Semaphore>) -> Self {
        Self {
            registry,
            executable: ExecutableRuntime::new(destroy_permits),
            handles: Mutex::new(Vec::new()),
        }
    }

    pub fn with_executable_runtime(mut self, executable: ExecutableRuntime) -> Self {
        self.executable = executable;
        self
    }

    /// Spawn one graph agent and keep its handle for [`Self::destroy`].
    pub fn spawn(&self, name: &AgentName, agent: &GraphAgent, connection_url: &str) -> Result<(), RuntimeError> {
        let handle: Box<dyn OrchestratorHandle> = match agent {
            GraphAgent::Local { agent_type, options, .. } => {
                let registry_agent = self.registry.get(agent_type).ok_or_else(|| {
                    RuntimeError::InvalidConfig(format!("Agent type '{}' is not in the registry", agent_type))
                })?;

                match &registry_agent.runtime {
                    AgentRuntime::Executable { command, environment } => {
                        let options = registry_agent.resolve_options(options);
                        Box::new(
                            self.executable
                                .spawn(name, command, environment, &options, connection_url)?,
                        )
                    }
                    AgentRuntime::Docker { container } => {
                        return Err(RuntimeError::Unsupported(format!(
                            "docker runtime (container '{}') for agent '{}'",
                            container, name
                        )));
                    }
                    AgentRuntime::Remote(remote) => {
                        return Err(RuntimeError::Unsupported(format!(
                            "remote runtime ({}) for agent '{}'",
                            remote.host, name
                        )));
                    }
                }
            }
            GraphAgent::Remote { remote, .. } => {
                return Err(RuntimeError::Unsupported(format!(
                    "remote agent '{}' on {}",
                    name, remote.host
                )));
            }
        };

        info!(agent = %name, "Agent spawned");
        metrics::counter!("coral_agents_spawned_total").increment(1);
        self.handles.lock().push(handle);
        Ok(())
    }

    pub fn handle_count(&self) -> usize {
        self.handles.lock().len()
    }

    /// Destroy every recorded handle concurrently and wait for all of them.
    /// A failed destroy is logged and does not stop the others.
    pub async fn destroy(&self) {
        let handles = std::mem::take(&mut *self.handles.lock());
        if handles.is_empty() {
            return;
        }

        info!(count = handles.len(), "Destroying agents");
        let results = join_all(handles.iter().map(|h| h.destroy())).await;
        for (handle, result) in handles.iter().zip(results) {
            if let Err(e) = result {
                error!(agent = %handle.agent_name(), "Failed to destroy agent: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::agent::AgentType;
    use crate::domain::options::OptionValues;
    use crate::domain::registry::RegistryAgent;
    use crate::domain::runtime::RemoteRuntime;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeHandle {
        name: AgentName,
        fail: bool,
        destroyed: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl OrchestratorHandle for FakeHandle {
        fn agent_name(&self) -> &AgentName {
            &self.name
        }

        async fn destroy(&self) -> Result<(), RuntimeError> {
            if self.fail {
                return Err(RuntimeError::TerminationFailed(format!("{} refused to stop", self.name)));
            }
            self.destroyed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn orchestrator(runtime: AgentRuntime) -> Orchestrator {
        let registry = AgentRegistry::new(HashMap::from([(
            AgentType::from("worker"),
            RegistryAgent { runtime, options: vec![] },
        )]));
        Orchestrator::new(Arc::new(registry), Arc::new(Semaphore::new(10)))
    }

    fn local() -> GraphAgent {
        GraphAgent::Local {
            agent_type: AgentType::from("worker"),
            options: OptionValues::new(),
            blocking: true,
        }
    }

    #[tokio::test]
    async fn test_docker_and_remote_are_unsupported() {
        let docker = orchestrator(AgentRuntime::Docker { container: "img".into() });
        assert!(matches!(
            docker.spawn(&AgentName::from("a"), &local(), "u"),
            Err(RuntimeError::Unsupported(_))
        ));

        let remote_agent = GraphAgent::Remote {
            remote: RemoteRuntime {
                host: "example.org".into(),
                agent_type: "worker".into(),
                app_id: "app".into(),
                privacy_key: "key".into(),
            },
            options: OptionValues::new(),
            blocking: true,
        };
        assert!(matches!(
            docker.spawn(&AgentName::from("b"), &remote_agent, "u"),
            Err(RuntimeError::Unsupported(_))
        ));
        assert_eq!(docker.handle_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_agent_type_is_invalid_config() {
        let orch = orchestrator(AgentRuntime::Docker { container: "img".into() });
        let agent = GraphAgent::Local {
            agent_type: AgentType::from("ghost"),
            options: OptionValues::new(),
            blocking: true,
        };
        assert!(matches!(
            orch.spawn(&AgentName::from("a"), &agent, "u"),
            Err(RuntimeError::InvalidConfig(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_spawn_then_destroy_all() {
        let orch = orchestrator(AgentRuntime::Executable {
            command: vec!["/bin/sh".into(), "-c".into(), "/bin/sleep 30".into()],
            environment: vec![],
        });
        orch.spawn(&AgentName::from("a"), &local(), "u").unwrap();
        orch.spawn(&AgentName::from("b"), &local(), "u").unwrap();
        assert_eq!(orch.handle_count(), 2);

        orch.destroy().await;
        assert_eq!(orch.handle_count(), 0);
    }

    #[tokio::test]
    async fn test_destroy_continues_past_failed_handle() {
        let orch = orchestrator(AgentRuntime::Docker { container: "img".into() });
        let destroyed = Arc::new(AtomicUsize::new(0));
        {
            let mut handles = orch.handles.lock();
            for (name, fail) in [("broken", true), ("healthy", false), ("also-healthy", false)] {
                handles.push(Box::new(FakeHandle {
                    name: AgentName::from(name),
                    fail,
                    destroyed: destroyed.clone(),
                }));
            }
        }
        assert_eq!(orch.handle_count(), 3);

        orch.destroy().await;
        assert_eq!(destroyed.load(Ordering::SeqCst), 2);
        assert_eq!(orch.handle_count(), 0);
    }
}
