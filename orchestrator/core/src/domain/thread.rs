// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Threads and Messages
//!
//! A [`Thread`] is a topic-scoped conversation with an ordered participant list
//! and an append-only message log. A [`Message`] is immutable once created and is
//! only reachable through the thread that owns it.
//!
//! ## Invariants
//!
//! - The creator is always a participant.
//! - Participants are unique and keep insertion order.
//! - Once `is_closed` is set no participant or message mutation is permitted.
//!   Closing is terminal.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Sender id used for messages generated by the session itself.
pub const SYSTEM_SENDER_ID: &str = "system";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(pub Uuid);

impl ThreadId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for ThreadId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ThreadId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub thread_id: ThreadId,
    pub sender_id: String,
    pub content: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub mentions: Vec<String>,
}

impl Message {
    /// Build a message for `thread`, enforcing the creation rules: the thread is
    /// open, the sender participates, and mentions are narrowed to participants.
    ///
    /// Returns `None` when the thread is closed or the sender is not a participant.
    /// The `system` sender bypasses the participation rule.
    pub fn create(
        thread: &Thread,
        sender_id: impl Into<String>,
        content: impl Into<String>,
        mentions: &[String],
    ) -> Option<Self> {
        let sender_id = sender_id.into();
        if thread.is_closed {
            return None;
        }
        if sender_id != SYSTEM_SENDER_ID && !thread.has_participant(&sender_id) {
            return None;
        }

        let mut valid_mentions: Vec<String> = Vec::with_capacity(mentions.len());
        for mention in mentions {
            if thread.has_participant(mention) && !valid_mentions.contains(mention) {
                valid_mentions.push(mention.clone());
            }
        }

        Some(Self {
            id: MessageId::new(),
            thread_id: thread.id,
            sender_id,
            content: content.into(),
            timestamp: Utc::now().timestamp_millis(),
            mentions: valid_mentions,
        })
    }

    pub fn is_system(&self) -> bool {
        self.sender_id == SYSTEM_SENDER_ID
    }

    pub fn mentions_agent(&self, agent_id: &str) -> bool {
        self.mentions.iter().any(|m| m == agent_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    pub id: ThreadId,
    pub name: String,
    pub creator_id: String,
    participants: Vec<String>,
    messages: Vec<Message>,
    pub is_closed: bool,
    pub summary: Option<String>,
}

impl Thread {
    /// Create an open thread. The creator leads the participant list; duplicate
    /// ids are collapsed keeping first occurrence.
    pub fn new(name: impl Into<String>, creator_id: impl Into<String>, participant_ids: Vec<String>) -> Self {
        let creator_id = creator_id.into();
        let mut participants: Vec<String> = Vec::with_capacity(participant_ids.len() + 1);
        participants.push(creator_id.clone());
        for id in participant_ids {
            if !participants.contains(&id) {
                participants.push(id);
            }
        }

        Self {
            id: ThreadId::new(),
            name: name.into(),
            creator_id,
            participants,
            messages: Vec::new(),
            is_closed: false,
            summary: None,
        }
    }

    pub fn participants(&self) -> &[String] {
        &self.participants
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn has_participant(&self, agent_id: &str) -> bool {
        self.participants.iter().any(|p| p == agent_id)
    }

    /// Returns `false` when the thread is closed. Adding an existing participant
    /// is a successful no-op.
    pub(crate) fn add_participant(&mut self, agent_id: &str) -> bool {
        if self.is_closed {
            return false;
        }
        if !self.has_participant(agent_id) {
            self.participants.push(agent_id.to_string());
        }
        true
    }

    /// Returns whether the participant was present and removed. The creator
    /// cannot be removed.
    pub(crate) fn remove_participant(&mut self, agent_id: &str) -> bool {
        if self.is_closed || agent_id == self.creator_id {
            return false;
        }
        match self.participants.iter().position(|p| p == agent_id) {
            Some(index) => {
                self.participants.remove(index);
                true
            }
            None => false,
        }
    }

    /// Append a message built by [`Message::create`] and return its index.
    pub(crate) fn push_message(&mut self, message: Message) -> usize {
        self.messages.push(message);
        self.messages.len() - 1
    }

    /// Close the thread. Returns `true` only on the open → closed transition.
    pub(crate) fn close(&mut self, summary: impl Into<String>) -> bool {
        self.summary = Some(summary.into());
        if self.is_closed {
            return false;
        }
        self.is_closed = true;
        true
    }

    /// Position of a message in the log, searched from the newest end.
    pub fn message_index(&self, message_id: MessageId) -> Option<usize> {
        self.messages.iter().rposition(|m| m.id == message_id)
    }
}
