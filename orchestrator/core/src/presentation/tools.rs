// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Tool Bridge
//!
//! Translates tool calls from one connected agent into operations on its
//! session. Every outcome, including bad arguments and failed operations, comes
//! back as a [`ToolResult`] the agent can read; nothing here tears down the
//! connection.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::agent::Agent;
use crate::domain::session::CoralAgentGraphSession;
use crate::domain::thread::ThreadId;
use crate::presentation::format::format_messages;

pub const DEFAULT_WAIT_TIMEOUT_MS: i64 = 30_000;
pub const DEV_BARRIER_TIMEOUT_MS: u64 = 60_000;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDeclaration {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    pub text: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn ok(text: impl Into<String>) -> Self {
        Self { text: text.into(), is_error: false }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self { text: text.into(), is_error: true }
    }
}

fn schema(properties: Value, required: &[&str]) -> Value {
    json!({ "type": "object", "properties": properties, "required": required })
}

pub fn tool_declarations() -> Vec<ToolDeclaration> {
    vec![
        ToolDeclaration {
            name: "register_agent",
            description: "Register yourself in the session so other agents can find you.",
            input_schema: schema(
                json!({ "description": { "type": "string", "description": "What this agent does" } }),
                &[],
            ),
        },
        ToolDeclaration {
            name: "list_agents",
            description: "List all registered agents in your contact.",
            input_schema: schema(
                json!({ "includeDetails": { "type": "boolean", "description": "Include agent descriptions" } }),
                &["includeDetails"],
            ),
        },
        ToolDeclaration {
            name: "create_thread",
            description: "Create a new thread with a list of participants",
            input_schema: schema(
                json!({
                    "threadName": { "type": "string", "description": "Name of the thread" },
                    "participantIds": {
                        "type": "array",
                        "description": "IDs of the agents to include",
                        "items": { "type": "string" }
                    }
                }),
                &["threadName", "participantIds"],
            ),
        },
        ToolDeclaration {
            name: "add_participant",
            description: "Add a participant to a thread",
            input_schema: schema(
                json!({
                    "threadId": { "type": "string", "description": "ID of the thread" },
                    "participantId": { "type": "string", "description": "ID of the agent to add" }
                }),
                &["threadId", "participantId"],
            ),
        },
        ToolDeclaration {
            name: "remove_participant",
            description: "Remove a participant from a thread",
            input_schema: schema(
                json!({
                    "threadId": { "type": "string", "description": "ID of the thread" },
                    "participantId": { "type": "string", "description": "ID of the agent to remove" }
                }),
                &["threadId", "participantId"],
            ),
        },
        ToolDeclaration {
            name: "close_thread",
            description: "Close a thread with a summary",
            input_schema: schema(
                json!({
                    "threadId": { "type": "string", "description": "ID of the thread" },
                    "summary": { "type": "string", "description": "Summary of the thread's outcome" }
                }),
                &["threadId", "summary"],
            ),
        },
        ToolDeclaration {
            name: "send_message",
            description: "Send a message to a thread",
            input_schema: schema(
                json!({
                    "threadId": { "type": "string", "description": "ID of the thread" },
                    "content": { "type": "string", "description": "Message content" },
                    "mentions": {
                        "type": "array",
                        "description": "IDs of the agents to notify",
                        "items": { "type": "string" }
                    }
                }),
                &["threadId", "content", "mentions"],
            ),
        },
        ToolDeclaration {
            name: "wait_for_mentions",
            description: "Wait until mentioned. Call this tool when you're done or want to wait for another agent to respond. You will see all unread messages.",
            input_schema: schema(
                json!({ "timeoutMs": { "type": "number", "description": "Timeout in milliseconds (default: 30000)" } }),
                &["timeoutMs"],
            ),
        },
    ]
}

#[derive(Debug, Default, Deserialize)]
struct RegisterAgentInput {
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListAgentsInput {
    #[serde(default)]
    include_details: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateThreadInput {
    thread_name: String,
    #[serde(default)]
    participant_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParticipantInput {
    thread_id: String,
    participant_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CloseThreadInput {
    thread_id: String,
    summary: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageInput {
    thread_id: String,
    content: String,
    #[serde(default)]
    mentions: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WaitForMentionsInput {
    /// Declared as a JSON number, so fractional values are accepted and truncated.
    #[serde(default = "default_wait_timeout")]
    timeout_ms: f64,
}

fn default_wait_timeout() -> f64 {
    DEFAULT_WAIT_TIMEOUT_MS as f64
}

/// Tool calls of one agent against one session.
pub struct ToolBridge {
    session: Arc<CoralAgentGraphSession>,
    agent_id: String,
}

impl ToolBridge {
    pub fn new(session: Arc<CoralAgentGraphSession>, agent_id: impl Into<String>) -> Self {
        Self {
            session,
            agent_id: agent_id.into(),
        }
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub async fn invoke(&self, tool: &str, arguments: Value) -> ToolResult {
        debug!(session_id = %self.session.id, agent_id = %self.agent_id, tool, "Tool invoked");
        let result = match tool {
            "register_agent" => match parse::<RegisterAgentInput>(tool, arguments) {
                Ok(input) => self.register_agent(input).await,
                Err(e) => e,
            },
            "list_agents" => parse(tool, arguments).map_or_else(|e| e, |input| self.list_agents(input)),
            "create_thread" => parse(tool, arguments).map_or_else(|e| e, |input| self.create_thread(input)),
            "add_participant" => parse(tool, arguments).map_or_else(|e| e, |input| self.add_participant(input)),
            "remove_participant" => {
                parse(tool, arguments).map_or_else(|e| e, |input| self.remove_participant(input))
            }
            "close_thread" => parse(tool, arguments).map_or_else(|e| e, |input| self.close_thread(input)),
            "send_message" => parse(tool, arguments).map_or_else(|e| e, |input| self.send_message(input)),
            "wait_for_mentions" => match parse::<WaitForMentionsInput>(tool, arguments) {
                Ok(input) => self.wait_for_mentions(input).await,
                Err(e) => e,
            },
            other => ToolResult::error(format!("Unknown tool '{}'", other)),
        };

        if result.is_error {
            warn!(session_id = %self.session.id, agent_id = %self.agent_id, tool, "{}", result.text);
        }
        result
    }

    async fn register_agent(&self, input: RegisterAgentInput) -> ToolResult {
        let agent = Agent::new(self.agent_id.clone()).with_description(input.description.unwrap_or_default());
        if !self.session.register_agent(agent) {
            return ToolResult::error(format!("Agent '{}' is already registered", self.agent_id));
        }

        let required = self.session.dev_required_agent_start_count();
        if required > 0 {
            info!(session_id = %self.session.id, agent_id = %self.agent_id, required, "Waiting for agents to start");
            if !self.session.wait_for_agent_count(required, DEV_BARRIER_TIMEOUT_MS).await {
                return ToolResult::ok(format!(
                    "Agent '{}' registered. Timed out waiting for {} agents ({} registered)",
                    self.agent_id,
                    required,
                    self.session.registered_agents_count()
                ));
            }
        }
        ToolResult::ok(format!("Agent '{}' registered successfully", self.agent_id))
    }

    fn list_agents(&self, input: ListAgentsInput) -> ToolResult {
        let agents = self.session.agents();
        if agents.is_empty() {
            return ToolResult::ok("No agents are currently registered in the system");
        }

        let list = if input.include_details {
            agents
                .iter()
                .map(|a| {
                    if a.description.is_empty() {
                        format!("ID: {}", a.id)
                    } else {
                        format!("ID: {}, Description: {}", a.id, a.description)
                    }
                })
                .collect::<Vec<_>>()
                .join("\n")
        } else {
            agents.iter().map(|a| a.id.as_str()).collect::<Vec<_>>().join(", ")
        };
        ToolResult::ok(format!("Registered Agents ({}):\n{}", agents.len(), list))
    }

    fn create_thread(&self, input: CreateThreadInput) -> ToolResult {
        match self
            .session
            .create_thread(input.thread_name, &self.agent_id, &input.participant_ids)
        {
            Ok(thread) => ToolResult::ok(format!(
                "Thread created successfully:\nID: {}\nName: {}\nCreator: {}\nParticipants: {}",
                thread.id,
                thread.name,
                thread.creator_id,
                thread.participants().join(", ")
            )),
            Err(e) => ToolResult::error(format!("Failed to create thread: {}", e)),
        }
    }

    fn add_participant(&self, input: ParticipantInput) -> ToolResult {
        let thread_id = match parse_thread_id(&input.thread_id) {
            Ok(id) => id,
            Err(e) => return e,
        };
        if self.session.add_participant(&thread_id, &input.participant_id) {
            ToolResult::ok(format!("Participant added successfully to thread {}", thread_id))
        } else {
            ToolResult::error(format!(
                "Failed to add participant: thread {} not found or closed, or agent '{}' not registered",
                thread_id, input.participant_id
            ))
        }
    }

    fn remove_participant(&self, input: ParticipantInput) -> ToolResult {
        let thread_id = match parse_thread_id(&input.thread_id) {
            Ok(id) => id,
            Err(e) => return e,
        };
        if self.session.remove_participant(&thread_id, &input.participant_id) {
            ToolResult::ok(format!("Participant removed successfully from thread {}", thread_id))
        } else {
            ToolResult::error(format!(
                "Failed to remove participant: thread {} not found or closed, or '{}' cannot be removed",
                thread_id, input.participant_id
            ))
        }
    }

    fn close_thread(&self, input: CloseThreadInput) -> ToolResult {
        let thread_id = match parse_thread_id(&input.thread_id) {
            Ok(id) => id,
            Err(e) => return e,
        };
        if self.session.close_thread(&thread_id, &input.summary) {
            ToolResult::ok(format!("Thread closed successfully with summary: {}", input.summary))
        } else {
            ToolResult::error(format!("Failed to close thread: thread {} not found", thread_id))
        }
    }

    fn send_message(&self, input: SendMessageInput) -> ToolResult {
        let thread_id = match parse_thread_id(&input.thread_id) {
            Ok(id) => id,
            Err(e) => return e,
        };
        match self
            .session
            .send_message(&thread_id, &self.agent_id, input.content, &input.mentions)
        {
            Ok(message) => ToolResult::ok(format!(
                "Message sent successfully:\nID: {}\nThread: {}\nSender: {}\nContent: {}\nMentions: {}",
                message.id,
                message.thread_id,
                message.sender_id,
                message.content,
                message.mentions.join(", ")
            )),
            Err(e) => ToolResult::error(format!("Failed to send message: {}", e)),
        }
    }

    async fn wait_for_mentions(&self, input: WaitForMentionsInput) -> ToolResult {
        let timeout_ms = input.timeout_ms as i64;
        info!(
            session_id = %self.session.id,
            agent_id = %self.agent_id,
            timeout_ms,
            "Waiting for mentions"
        );
        match self.session.wait_for_mentions(&self.agent_id, timeout_ms).await {
            Ok(messages) if messages.is_empty() => {
                ToolResult::ok("No new messages received within the timeout period")
            }
            Ok(messages) => ToolResult::ok(format_messages(&messages, &self.session)),
            Err(e) => ToolResult::error(format!("Error waiting for mentions: {}", e)),
        }
    }
}

fn parse<T: DeserializeOwned>(tool: &str, arguments: Value) -> Result<T, ToolResult> {
    let arguments = if arguments.is_null() { json!({}) } else { arguments };
    serde_json::from_value(arguments)
        .map_err(|e| ToolResult::error(format!("Invalid arguments for {}: {}", tool, e)))
}

fn parse_thread_id(raw: &str) -> Result<ThreadId, ToolResult> {
    ThreadId::parse(raw).map_err(|_| ToolResult::error(format!("Invalid thread id '{}'", raw)))
}
