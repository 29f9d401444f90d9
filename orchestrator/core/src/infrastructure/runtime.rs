// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Executable Runtime
//!
//! Starts a registry agent as a local OS process. The child gets a cleared
//! environment holding only the resolved declared variables plus
//! `CORAL_CONNECTION_URL`. Its stdout and stderr are drained line by line into
//! the server log, tagged `[STDOUT]` / `[STDERR]`.
//!
//! The two pipes are read by separate tasks. Lines keep their order within a
//! stream, but stdout and stderr lines may interleave differently from how the
//! process wrote them.

use crate::domain::agent::AgentName;
use crate::domain::options::OptionValues;
use crate::domain::runtime::{EnvVar, OrchestratorHandle, RuntimeError, CONNECTION_URL_ENV};
use async_trait::async_trait;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, Semaphore};
use tracing::{info, warn};

/// Time a child gets to exit after the terminate signal before it is killed.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(30);

/// Upper bound on teardowns running at the same time.
pub const DESTROY_CONCURRENCY: usize = 10;

pub struct ExecutableRuntime {
    destroy_permits: Arc<Semaphore>,
    grace_period: Duration,
}

impl ExecutableRuntime {
    pub fn new(destroy_permits: Arc<Semaphore>) -> Self {
        Self {
            destroy_permits,
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Resolve the declared environment against `options`. The connection URL
    /// is added last and cannot be shadowed.
    pub fn resolve_environment(
        environment: &[EnvVar],
        options: &OptionValues,
        connection_url: &str,
    ) -> Result<HashMap<String, String>, RuntimeError> {
        let mut resolved = HashMap::with_capacity(environment.len() + 1);
        for env in environment {
            if env.target_name() == CONNECTION_URL_ENV {
                return Err(RuntimeError::InvalidConfig(format!(
                    "'{}' is reserved and set by the server",
                    CONNECTION_URL_ENV
                )));
            }
            let (name, value) = env.resolve(options)?;
            resolved.insert(name, value);
        }
        resolved.insert(CONNECTION_URL_ENV.to_string(), connection_url.to_string());
        Ok(resolved)
    }

    /// Must be called from within a tokio runtime.
    pub fn spawn(
        &self,
        agent_name: &AgentName,
        command: &[String],
        environment: &[EnvVar],
        options: &OptionValues,
        connection_url: &str,
    ) -> Result<ExecutableHandle, RuntimeError> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| RuntimeError::InvalidConfig("executable runtime needs a non-empty command".to_string()))?;
        let env = Self::resolve_environment(environment, options, connection_url)?;

        let mut child = Command::new(program)
            .args(args)
            .env_clear()
            .envs(&env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| RuntimeError::SpawnFailed(format!("{}: {}", program, e)))?;

        let pid = child.id();
        info!(agent = %agent_name, pid = ?pid, command = %command.join(" "), "Spawned executable agent");

        if let Some(stdout) = child.stdout.take() {
            drain_output(agent_name.clone(), "STDOUT", stdout);
        }
        if let Some(stderr) = child.stderr.take() {
            drain_output(agent_name.clone(), "STDERR", stderr);
        }

        Ok(ExecutableHandle {
            agent_name: agent_name.clone(),
            pid,
            child: Arc::new(Mutex::new(child)),
            destroy_permits: self.destroy_permits.clone(),
            grace_period: self.grace_period,
        })
    }
}

fn drain_output<R>(agent_name: AgentName, stream: &'static str, reader: R)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => info!(agent = %agent_name, "[{}] {}: {}", stream, agent_name, line),
                Ok(None) => break,
                Err(e) => {
                    warn!(agent = %agent_name, "Failed to read agent {}: {}", stream, e);
                    break;
                }
            }
        }
    });
}

pub struct ExecutableHandle {
    agent_name: AgentName,
    pid: Option<u32>,
    child: Arc<Mutex<Child>>,
    destroy_permits: Arc<Semaphore>,
    grace_period: Duration,
}

impl ExecutableHandle {
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }
}

#[async_trait]
impl OrchestratorHandle for ExecutableHandle {
    fn agent_name(&self) -> &AgentName {
        &self.agent_name
    }

    /// Terminate, wait out the grace period, then kill. Runs on its own task
    /// and holds one of the shared destroy permits while it does.
    async fn destroy(&self) -> Result<(), RuntimeError> {
        let child = self.child.clone();
        let permits = self.destroy_permits.clone();
        let grace_period = self.grace_period;
        let agent_name = self.agent_name.clone();

        let task = tokio::spawn(async move {
            let _permit = permits
                .acquire_owned()
                .await
                .map_err(|_| RuntimeError::TerminationFailed("destroy pool closed".to_string()))?;
            let mut child = child.lock().await;

            if let Ok(Some(status)) = child.try_wait() {
                info!(agent = %agent_name, %status, "Agent process already exited");
                return Ok(());
            }

            #[cfg(unix)]
            {
                if let Some(pid) = child.id() {
                    // SAFETY: plain kill(2) on a pid we spawned and have not reaped.
                    if unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) } != 0 {
                        warn!(agent = %agent_name, pid, "Failed to send SIGTERM");
                    }
                }
            }
            #[cfg(not(unix))]
            {
                let _ = child.start_kill();
            }

            match tokio::time::timeout(grace_period, child.wait()).await {
                Ok(Ok(status)) => {
                    info!(agent = %agent_name, %status, "Agent process exited");
                    Ok(())
                }
                Ok(Err(e)) => Err(RuntimeError::TerminationFailed(format!("{}: {}", agent_name, e))),
                Err(_) => {
                    warn!(agent = %agent_name, "Agent did not exit within {:?}, killing", grace_period);
                    child
                        .kill()
                        .await
                        .map_err(|e| RuntimeError::TerminationFailed(format!("{}: {}", agent_name, e)))
                }
            }
        });

        task.await
            .map_err(|e| RuntimeError::TerminationFailed(format!("destroy task failed: {}", e)))?
    }
}
