// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Agent Registry
//!
//! Static catalog, loaded once with the application config, mapping an
//! [`AgentType`] to the runtime that spawns it and the options it accepts.
//! Read-only for the life of the process.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::domain::agent::AgentType;
use crate::domain::options::{AgentOption, OptionValues};
use crate::domain::runtime::{AgentRuntime, RuntimeError};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentRegistry {
    agents: HashMap<AgentType, RegistryAgent>,
}

impl AgentRegistry {
    pub fn new(agents: HashMap<AgentType, RegistryAgent>) -> Self {
        Self { agents }
    }

    pub fn get(&self, agent_type: &AgentType) -> Option<&RegistryAgent> {
        self.agents.get(agent_type)
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn agent_types(&self) -> impl Iterator<Item = &AgentType> {
        self.agents.keys()
    }

    pub fn validate(&self) -> Result<(), RuntimeError> {
        for (agent_type, agent) in &self.agents {
            agent.validate().map_err(|e| match e {
                RuntimeError::InvalidConfig(msg) => {
                    RuntimeError::InvalidConfig(format!("registry agent '{}': {}", agent_type, msg))
                }
                other => other,
            })?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryAgent {
    pub runtime: AgentRuntime,
    #[serde(default)]
    pub options: Vec<AgentOption>,
}

impl RegistryAgent {
    pub fn option(&self, name: &str) -> Option<&AgentOption> {
        self.options.iter().find(|o| o.name() == name)
    }

    /// Rejects duplicate option names, environment variables that reference an
    /// undeclared option, and malformed runtimes.
    pub fn validate(&self) -> Result<(), RuntimeError> {
        self.runtime.validate()?;

        let mut seen = HashSet::new();
        let duplicates: Vec<&str> = self
            .options
            .iter()
            .map(|o| o.name())
            .filter(|name| !seen.insert(*name))
            .collect();
        if !duplicates.is_empty() {
            return Err(RuntimeError::InvalidConfig(format!(
                "Duplicate options {}",
                duplicates.join(",")
            )));
        }

        if let AgentRuntime::Executable { environment, .. } = &self.runtime {
            for env in environment {
                if let Some(option) = env.referenced_option() {
                    if self.option(option).is_none() {
                        return Err(RuntimeError::InvalidConfig(format!(
                            "environment variable '{}' references undefined option '{}'",
                            env.target_name(),
                            option
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Supplied values layered over the declared defaults.
    pub fn resolve_options(&self, supplied: &OptionValues) -> OptionValues {
        let mut resolved: OptionValues = self
            .options
            .iter()
            .filter_map(|o| o.default_value().map(|v| (o.name().to_string(), v)))
            .collect();
        resolved.extend(supplied.iter().map(|(k, v)| (k.clone(), v.clone())));
        resolved
    }
}
