// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Agent Graph
//!
//! Request-time description of the agents a session should start and the
//! links between them. Links are cliques: every pair of names inside one link
//! is connected. The graph is discarded after spawning; only the computed
//! blocking groups survive in the session.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, VecDeque};
use thiserror::Error;

use crate::domain::agent::{AgentName, AgentType};
use crate::domain::options::{ConfigValue, OptionValues};
use crate::domain::registry::AgentRegistry;
use crate::domain::runtime::RemoteRuntime;

#[derive(Debug, Error, PartialEq)]
pub enum GraphError {
    #[error("Agent type '{0}' is not in the registry")]
    UnknownAgentType(AgentType),
    #[error("Agent '{agent}' has no option named '{option}'")]
    UnknownOption { agent: AgentName, option: String },
    #[error("Option '{option}' of agent '{agent}' expects a {expected} value")]
    OptionTypeMismatch {
        agent: AgentName,
        option: String,
        expected: String,
    },
    #[error("Link references undeclared agent '{0}'")]
    UnknownLinkedAgent(AgentName),
}

fn default_blocking() -> bool {
    true
}

/// One agent in the graph, already validated against the registry.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphAgent {
    Local {
        agent_type: AgentType,
        options: OptionValues,
        blocking: bool,
    },
    Remote {
        remote: RemoteRuntime,
        options: OptionValues,
        blocking: bool,
    },
}

impl GraphAgent {
    pub fn blocking(&self) -> bool {
        match self {
            GraphAgent::Local { blocking, .. } | GraphAgent::Remote { blocking, .. } => *blocking,
        }
    }

    pub fn options(&self) -> &OptionValues {
        match self {
            GraphAgent::Local { options, .. } | GraphAgent::Remote { options, .. } => options,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentGraph {
    pub agents: HashMap<AgentName, GraphAgent>,
    pub links: Vec<BTreeSet<AgentName>>,
}

impl AgentGraph {
    pub fn new(agents: HashMap<AgentName, GraphAgent>, links: Vec<BTreeSet<AgentName>>) -> Self {
        Self { agents, links }
    }

    /// Undirected adjacency: an edge between every pair of distinct names
    /// sharing a link.
    pub fn adjacency(&self) -> HashMap<&AgentName, BTreeSet<&AgentName>> {
        let mut adjacency: HashMap<&AgentName, BTreeSet<&AgentName>> = HashMap::new();
        for link in &self.links {
            for a in link {
                for b in link {
                    if a != b {
                        adjacency.entry(a).or_default().insert(b);
                    }
                }
            }
        }
        adjacency
    }

    fn is_blocking(&self, name: &AgentName) -> bool {
        self.agents.get(name).map(GraphAgent::blocking).unwrap_or(false)
    }

    /// Partition blocking agents into connected components over the link
    /// adjacency. Non-blocking agents neither join a group nor bridge two
    /// groups. A blocking agent without links is a group of one.
    pub fn blocking_groups(&self) -> Vec<BTreeSet<AgentName>> {
        let adjacency = self.adjacency();

        let mut names: Vec<&AgentName> = self.agents.keys().collect();
        names.sort();

        let mut visited: BTreeSet<&AgentName> = BTreeSet::new();
        let mut groups = Vec::new();

        for start in names {
            if visited.contains(start) || !self.is_blocking(start) {
                continue;
            }

            let mut group = BTreeSet::new();
            let mut queue = VecDeque::from([start]);
            visited.insert(start);

            while let Some(node) = queue.pop_front() {
                group.insert(node.clone());
                let Some(neighbours) = adjacency.get(node) else {
                    continue;
                };
                for &next in neighbours {
                    if !visited.contains(next) && self.is_blocking(next) {
                        visited.insert(next);
                        queue.push_back(next);
                    }
                }
            }
            groups.push(group);
        }
        groups
    }
}

/// Wire shape of a graph agent in a session-creation request. Option values
/// are untyped JSON until checked against the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GraphAgentRequest {
    #[serde(rename_all = "camelCase")]
    Local {
        agent_type: AgentType,
        #[serde(default)]
        options: HashMap<String, serde_json::Value>,
        #[serde(default = "default_blocking")]
        blocking: bool,
    },
    #[serde(rename_all = "camelCase")]
    Remote {
        remote: RemoteRuntime,
        #[serde(default)]
        options: HashMap<String, serde_json::Value>,
        #[serde(default = "default_blocking")]
        blocking: bool,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentGraphRequest {
    #[serde(default)]
    pub agents: HashMap<AgentName, GraphAgentRequest>,
    #[serde(default)]
    pub links: Vec<BTreeSet<AgentName>>,
}

impl AgentGraphRequest {
    /// Check every local agent against the registry schema and every link
    /// against the declared agents.
    pub fn into_graph(self, registry: &AgentRegistry) -> Result<AgentGraph, GraphError> {
        for link in &self.links {
            if let Some(unknown) = link.iter().find(|name| !self.agents.contains_key(*name)) {
                return Err(GraphError::UnknownLinkedAgent(unknown.clone()));
            }
        }

        let mut agents = HashMap::with_capacity(self.agents.len());
        for (name, request) in self.agents {
            let agent = match request {
                GraphAgentRequest::Local { agent_type, options, blocking } => {
                    let registry_agent = registry
                        .get(&agent_type)
                        .ok_or_else(|| GraphError::UnknownAgentType(agent_type.clone()))?;

                    let mut typed = OptionValues::with_capacity(options.len());
                    for (option, raw) in options {
                        let declared = registry_agent.option(&option).ok_or_else(|| GraphError::UnknownOption {
                            agent: name.clone(),
                            option: option.clone(),
                        })?;
                        let value = ConfigValue::from_json(&raw)
                            .filter(|v| v.kind() == declared.kind())
                            .ok_or_else(|| GraphError::OptionTypeMismatch {
                                agent: name.clone(),
                                option: option.clone(),
                                expected: declared.kind().to_string(),
                            })?;
                        typed.insert(option, value);
                    }
                    GraphAgent::Local { agent_type, options: typed, blocking }
                }
                GraphAgentRequest::Remote { remote, options, blocking } => {
                    let mut typed = OptionValues::with_capacity(options.len());
                    for (option, raw) in options {
                        let value = ConfigValue::from_json(&raw).ok_or_else(|| GraphError::OptionTypeMismatch {
                            agent: name.clone(),
                            option: option.clone(),
                            expected: "string or number".to_string(),
                        })?;
                        typed.insert(option, value);
                    }
                    GraphAgent::Remote { remote, options: typed, blocking }
                }
            };
            agents.insert(name, agent);
        }

        Ok(AgentGraph { agents, links: self.links })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::options::AgentOption;
    use crate::domain::registry::RegistryAgent;
    use crate::domain::runtime::AgentRuntime;
    use serde_json::json;

    fn local(blocking: bool) -> GraphAgent {
        GraphAgent::Local {
            agent_type: AgentType::from("worker"),
            options: OptionValues::new(),
            blocking,
        }
    }

    fn link(names: &[&str]) -> BTreeSet<AgentName> {
        names.iter().map(|n| AgentName::from(*n)).collect()
    }

    fn graph(agents: &[(&str, bool)], links: Vec<BTreeSet<AgentName>>) -> AgentGraph {
        AgentGraph::new(
            agents.iter().map(|(n, b)| (AgentName::from(*n), local(*b))).collect(),
            links,
        )
    }

    #[test]
    fn test_chain_forms_single_group() {
        let g = graph(
            &[("a", true), ("b", true), ("c", true)],
            vec![link(&["a", "b"]), link(&["b", "c"])],
        );
        assert_eq!(g.blocking_groups(), vec![link(&["a", "b", "c"])]);
    }

    #[test]
    fn test_isolated_blocking_agent_is_singleton() {
        let g = graph(&[("a", true), ("b", true), ("d", true)], vec![link(&["a", "b"])]);
        assert_eq!(g.blocking_groups(), vec![link(&["a", "b"]), link(&["d"])]);
    }

    #[test]
    fn test_non_blocking_agent_does_not_bridge() {
        let g = graph(
            &[("a", true), ("hub", false), ("c", true)],
            vec![link(&["a", "hub"]), link(&["hub", "c"])],
        );
        assert_eq!(g.blocking_groups(), vec![link(&["a"]), link(&["c"])]);
    }

    #[test]
    fn test_clique_link_connects_all_members() {
        let g = graph(&[("x", true), ("y", true), ("z", true)], vec![link(&["x", "y", "z"])]);
        let adjacency = g.adjacency();
        assert_eq!(adjacency[&AgentName::from("x")].len(), 2);
        assert_eq!(g.blocking_groups().len(), 1);
    }

    fn registry() -> AgentRegistry {
        let agent = RegistryAgent {
            runtime: AgentRuntime::Executable { command: vec!["agent".into()], environment: vec![] },
            options: vec![
                AgentOption::String { name: "API_KEY".into(), description: None, default: None },
                AgentOption::Number { name: "temperature".into(), description: None, default: Some(0.2) },
            ],
        };
        AgentRegistry::new(HashMap::from([(AgentType::from("worker"), agent)]))
    }

    #[test]
    fn test_request_defaults_blocking_and_types_options() {
        let request: AgentGraphRequest = serde_json::from_value(json!({
            "agents": {
                "w": { "type": "local", "agentType": "worker", "options": { "API_KEY": "k", "temperature": 1 } }
            },
            "links": [["w"]]
        }))
        .unwrap();

        let graph = request.into_graph(&registry()).unwrap();
        let agent = &graph.agents[&AgentName::from("w")];
        assert!(agent.blocking());
        assert_eq!(agent.options().get("temperature"), Some(&ConfigValue::Num(1.0)));
    }

    #[test]
    fn test_request_rejects_bad_options_and_links() {
        let bad_type: AgentGraphRequest = serde_json::from_value(json!({
            "agents": { "w": { "type": "local", "agentType": "worker", "options": { "temperature": "hot" } } }
        }))
        .unwrap();
        assert!(matches!(
            bad_type.into_graph(&registry()),
            Err(GraphError::OptionTypeMismatch { .. })
        ));

        let unknown: AgentGraphRequest = serde_json::from_value(json!({
            "agents": { "w": { "type": "local", "agentType": "worker", "options": { "nope": 1 } } }
        }))
        .unwrap();
        assert!(matches!(unknown.into_graph(&registry()), Err(GraphError::UnknownOption { .. })));

        let missing_type: AgentGraphRequest = serde_json::from_value(json!({
            "agents": { "w": { "type": "local", "agentType": "ghost" } }
        }))
        .unwrap();
        assert!(matches!(missing_type.into_graph(&registry()), Err(GraphError::UnknownAgentType(_))));

        let bad_link: AgentGraphRequest = serde_json::from_value(json!({
            "agents": { "w": { "type": "local", "agentType": "worker" } },
            "links": [["w", "ghost"]]
        }))
        .unwrap();
        assert_eq!(
            bad_link.into_graph(&registry()),
            Err(GraphError::UnknownLinkedAgent(AgentName::from("ghost")))
        );
    }
}
