// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use serde::{Deserialize, Serialize};

use crate::domain::agent::Agent;
use crate::domain::thread::{Message, Thread, ThreadId};

/// Session-level events broadcast to observers. Observability only: nothing in
/// the session depends on anyone receiving them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    AgentRegistered {
        agent: Agent,
    },
    /// A graph agent's process has been started.
    AgentReady {
        agent: String,
    },
    #[serde(rename_all = "camelCase")]
    ThreadCreated {
        id: ThreadId,
        name: String,
        creator_id: String,
        participants: Vec<String>,
        summary: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    MessageSent {
        thread_id: ThreadId,
        message: Message,
    },
}

impl SessionEvent {
    pub fn thread_created(thread: &Thread) -> Self {
        SessionEvent::ThreadCreated {
            id: thread.id,
            name: thread.name.clone(),
            creator_id: thread.creator_id.clone(),
            participants: thread.participants().to_vec(),
            summary: thread.summary.clone(),
        }
    }

    pub fn message_sent(message: &Message) -> Self {
        SessionEvent::MessageSent {
            thread_id: message.thread_id,
            message: message.clone(),
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            SessionEvent::AgentRegistered { .. } => "agent_registered",
            SessionEvent::AgentReady { .. } => "agent_ready",
            SessionEvent::ThreadCreated { .. } => "thread_created",
            SessionEvent::MessageSent { .. } => "message_sent",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_type_tag() {
        let thread = Thread::new("planning", "alice", vec!["bob".into()]);
        let json = serde_json::to_value(SessionEvent::thread_created(&thread)).unwrap();
        assert_eq!(json["type"], "thread_created");
        assert_eq!(json["creatorId"], "alice");
        assert_eq!(json["participants"], serde_json::json!(["alice", "bob"]));
    }
}
