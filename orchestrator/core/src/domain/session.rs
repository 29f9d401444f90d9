// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Coral Agent Graph Session
//!
//! Aggregate root for one coordination session: registered agents, threads with
//! their message logs, per-(agent, thread) read cursors, and the two kinds of
//! suspended callers.
//!
//! ## Waiting
//!
//! - [`CoralAgentGraphSession::wait_for_mentions`] parks a oneshot sender in a
//!   per-agent list. Any number of callers may wait for the same agent; a
//!   matching notification completes all of them.
//! - [`CoralAgentGraphSession::wait_for_agent_count`] parks a oneshot sender
//!   under its threshold. Every registration releases all thresholds that are
//!   now met.
//!
//! Each waiter is removed exactly once: either by the notifier, which takes it
//! out of the map before completing it, or by the timed-out caller, which
//! removes its own entry and then drains a completion that may have raced in.
//!
//! All mutable state sits behind one mutex per session, so sessions never
//! contend with each other. No lock is held across an `.await`.

use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::domain::agent::{Agent, AgentName};
use crate::domain::events::SessionEvent;
use crate::domain::thread::{Message, Thread, ThreadId, SYSTEM_SENDER_ID};
use crate::infrastructure::event_bus::{EventBus, EventReceiver};

const SENDER_COLORS: [&str; 10] = [
    "#FF5733", "#33FF57", "#3357FF", "#F3FF33", "#FF33F3", "#33FFF3", "#FF8033", "#8033FF", "#33FF80",
    "#FF3380",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

struct Waiter<T> {
    id: u64,
    tx: oneshot::Sender<T>,
}

#[derive(Default)]
struct SessionState {
    agents: HashMap<String, Agent>,
    registration_order: Vec<String>,
    threads: HashMap<ThreadId, Thread>,
    thread_order: Vec<ThreadId>,
    /// Next unread message index per (agent, thread).
    read_cursors: HashMap<(String, ThreadId), usize>,
    mention_waiters: HashMap<String, Vec<Waiter<Vec<Message>>>>,
    count_waiters: BTreeMap<usize, Vec<Waiter<bool>>>,
    registered_count: usize,
    next_waiter_id: u64,
}

impl SessionState {
    fn next_waiter_id(&mut self) -> u64 {
        self.next_waiter_id += 1;
        self.next_waiter_id
    }

    fn threads_for_agent<'a>(&'a self, agent_id: &'a str) -> impl Iterator<Item = &'a Thread> + 'a {
        self.thread_order
            .iter()
            .filter_map(|id| self.threads.get(id))
            .filter(move |t| t.has_participant(agent_id))
    }

    /// Messages at or after the agent's cursor that mention it or come from
    /// the system sender, across every thread it participates in.
    fn unread_messages(&self, agent_id: &str) -> Vec<Message> {
        let mut unread = Vec::new();
        for thread in self.threads_for_agent(agent_id) {
            let cursor = self
                .read_cursors
                .get(&(agent_id.to_string(), thread.id))
                .copied()
                .unwrap_or(0);
            unread.extend(
                thread
                    .messages()
                    .iter()
                    .skip(cursor)
                    .filter(|m| m.is_system() || m.mentions_agent(agent_id))
                    .cloned(),
            );
        }
        unread
    }

    /// Move cursors past the given messages. Cursors only ever move forward.
    fn mark_read(&mut self, agent_id: &str, messages: &[Message]) {
        for message in messages {
            let Some(index) = self.threads.get(&message.thread_id).and_then(|t| t.message_index(message.id)) else {
                continue;
            };
            let cursor = self
                .read_cursors
                .entry((agent_id.to_string(), message.thread_id))
                .or_insert(0);
            *cursor = (*cursor).max(index + 1);
        }
    }

    /// Complete every waiter of every target with `message`.
    fn notify(&mut self, message: &Message) {
        let targets: Vec<String> = if message.is_system() {
            self.threads
                .get(&message.thread_id)
                .map(|t| t.participants().to_vec())
                .unwrap_or_default()
        } else {
            message.mentions.clone()
        };

        for target in targets {
            if let Some(waiters) = self.mention_waiters.remove(&target) {
                debug!(agent_id = %target, waiters = waiters.len(), "Waking mention waiters");
                for waiter in waiters {
                    let _ = waiter.tx.send(vec![message.clone()]);
                }
            }
        }
    }

    fn remove_mention_waiter(&mut self, agent_id: &str, waiter_id: u64) {
        if let Some(waiters) = self.mention_waiters.get_mut(agent_id) {
            waiters.retain(|w| w.id != waiter_id);
            if waiters.is_empty() {
                self.mention_waiters.remove(agent_id);
            }
        }
    }

    fn remove_count_waiter(&mut self, target: usize, waiter_id: u64) {
        if let Some(waiters) = self.count_waiters.get_mut(&target) {
            waiters.retain(|w| w.id != waiter_id);
            if waiters.is_empty() {
                self.count_waiters.remove(&target);
            }
        }
    }

    /// Release every count waiter whose threshold is now met.
    fn release_count_waiters(&mut self) {
        let pending = self.count_waiters.split_off(&(self.registered_count + 1));
        let released = std::mem::replace(&mut self.count_waiters, pending);
        for (_, waiters) in released {
            for waiter in waiters {
                let _ = waiter.tx.send(true);
            }
        }
    }
}

pub struct CoralAgentGraphSession {
    pub id: String,
    pub application_id: String,
    pub privacy_key: String,
    blocking_groups: Vec<BTreeSet<AgentName>>,
    dev_required_agent_start_count: AtomicUsize,
    state: Mutex<SessionState>,
    events: EventBus,
}

impl CoralAgentGraphSession {
    pub fn new(
        id: impl Into<String>,
        application_id: impl Into<String>,
        privacy_key: impl Into<String>,
        blocking_groups: Vec<BTreeSet<AgentName>>,
    ) -> Self {
        Self {
            id: id.into(),
            application_id: application_id.into(),
            privacy_key: privacy_key.into(),
            blocking_groups,
            dev_required_agent_start_count: AtomicUsize::new(0),
            state: Mutex::new(SessionState::default()),
            events: EventBus::with_default_capacity(),
        }
    }

    pub fn blocking_groups(&self) -> &[BTreeSet<AgentName>] {
        &self.blocking_groups
    }

    pub fn dev_required_agent_start_count(&self) -> usize {
        self.dev_required_agent_start_count.load(Ordering::Acquire)
    }

    pub fn set_dev_required_agent_start_count(&self, count: usize) {
        self.dev_required_agent_start_count.store(count, Ordering::Release);
    }

    pub fn events(&self) -> EventReceiver {
        self.events.subscribe()
    }

    pub(crate) fn publish(&self, event: SessionEvent) {
        self.events.publish(event);
    }

    /// Drop every agent, thread and cursor. Pending waiters resolve empty / `false`.
    pub fn clear_all(&self) {
        let mut state = self.state.lock();
        *state = SessionState::default();
        info!(session_id = %self.id, "Cleared session state");
    }

    // ---- agents -----------------------------------------------------------

    /// Returns `false` if an agent with the same id is already registered, or
    /// if the id is the reserved system sender.
    pub fn register_agent(&self, agent: Agent) -> bool {
        if agent.id == SYSTEM_SENDER_ID {
            warn!(session_id = %self.id, "Rejected registration under the reserved system sender id");
            return false;
        }
        let registered_count = {
            let mut state = self.state.lock();
            if state.agents.contains_key(&agent.id) {
                return false;
            }
            state.registration_order.push(agent.id.clone());
            state.agents.insert(agent.id.clone(), agent.clone());
            state.registered_count += 1;
            state.release_count_waiters();
            state.registered_count
        };

        info!(session_id = %self.id, agent_id = %agent.id, registered_count, "Agent registered");
        metrics::counter!("coral_agents_registered_total").increment(1);
        self.publish(SessionEvent::AgentRegistered { agent });
        true
    }

    pub fn get_agent(&self, agent_id: &str) -> Option<Agent> {
        self.state.lock().agents.get(agent_id).cloned()
    }

    /// All agents in registration order.
    pub fn agents(&self) -> Vec<Agent> {
        let state = self.state.lock();
        state
            .registration_order
            .iter()
            .filter_map(|id| state.agents.get(id).cloned())
            .collect()
    }

    pub fn registered_agents_count(&self) -> usize {
        self.state.lock().registered_count
    }

    /// Wait until at least `target` agents are registered. Returns `false` on
    /// timeout.
    pub async fn wait_for_agent_count(&self, target: usize, timeout_ms: u64) -> bool {
        let (waiter_id, mut rx) = {
            let mut state = self.state.lock();
            if state.registered_count >= target {
                return true;
            }
            let (tx, rx) = oneshot::channel();
            let id = state.next_waiter_id();
            state.count_waiters.entry(target).or_default().push(Waiter { id, tx });
            (id, rx)
        };

        debug!(session_id = %self.id, target, timeout_ms, "Waiting for agent count");
        match tokio::time::timeout(Duration::from_millis(timeout_ms), &mut rx).await {
            Ok(result) => result.unwrap_or(false),
            Err(_) => {
                self.state.lock().remove_count_waiter(target, waiter_id);
                rx.try_recv().unwrap_or(false)
            }
        }
    }

    // ---- threads ----------------------------------------------------------

    /// Unknown participant ids are dropped. The creator is always included.
    pub fn create_thread(
        &self,
        name: impl Into<String>,
        creator_id: &str,
        participant_ids: &[String],
    ) -> Result<Thread, SessionError> {
        let thread = {
            let mut state = self.state.lock();
            if !state.agents.contains_key(creator_id) {
                return Err(SessionError::NotFound(format!("Agent '{}'", creator_id)));
            }
            let participants: Vec<String> = participant_ids
                .iter()
                .filter(|id| state.agents.contains_key(id.as_str()))
                .cloned()
                .collect();

            let thread = Thread::new(name, creator_id, participants);
            state.thread_order.push(thread.id);
            state.threads.insert(thread.id, thread.clone());
            thread
        };

        info!(
            session_id = %self.id,
            thread_id = %thread.id,
            creator_id,
            participants = thread.participants().len(),
            "Thread created"
        );
        self.publish(SessionEvent::thread_created(&thread));
        Ok(thread)
    }

    pub fn get_thread(&self, thread_id: &ThreadId) -> Option<Thread> {
        self.state.lock().threads.get(thread_id).cloned()
    }

    /// Threads the agent currently participates in, in creation order.
    pub fn threads_for_agent(&self, agent_id: &str) -> Vec<Thread> {
        self.state.lock().threads_for_agent(agent_id).cloned().collect()
    }

    /// A newly added participant only sees messages sent after joining.
    pub fn add_participant(&self, thread_id: &ThreadId, participant_id: &str) -> bool {
        let mut state = self.state.lock();
        if !state.agents.contains_key(participant_id) {
            return false;
        }
        let Some(thread) = state.threads.get_mut(thread_id) else {
            return false;
        };
        if thread.is_closed {
            return false;
        }
        if thread.has_participant(participant_id) {
            return true;
        }

        thread.add_participant(participant_id);
        let message_count = thread.messages().len();
        state
            .read_cursors
            .insert((participant_id.to_string(), *thread_id), message_count);
        debug!(session_id = %self.id, thread_id = %thread_id, agent_id = participant_id, "Participant added");
        true
    }

    pub fn remove_participant(&self, thread_id: &ThreadId, participant_id: &str) -> bool {
        let mut state = self.state.lock();
        match state.threads.get_mut(thread_id) {
            Some(thread) => thread.remove_participant(participant_id),
            None => false,
        }
    }

    /// Close the thread. The first close announces `Thread closed: <summary>`
    /// to every participant as a system message; later closes only replace
    /// the summary.
    pub fn close_thread(&self, thread_id: &ThreadId, summary: &str) -> bool {
        let announcement = {
            let mut state = self.state.lock();
            let Some(thread) = state.threads.get_mut(thread_id) else {
                return false;
            };

            if thread.is_closed {
                thread.close(summary);
                None
            } else {
                let announcement =
                    Message::create(thread, SYSTEM_SENDER_ID, format!("Thread closed: {}", summary), &[]);
                if let Some(message) = &announcement {
                    thread.push_message(message.clone());
                }
                thread.close(summary);
                if let Some(message) = &announcement {
                    state.notify(message);
                }
                announcement
            }
        };

        info!(session_id = %self.id, thread_id = %thread_id, "Thread closed");
        if let Some(message) = announcement {
            self.publish(SessionEvent::message_sent(&message));
        }
        true
    }

    // ---- messages ---------------------------------------------------------

    /// Mentions of non-participants are dropped from the stored message.
    pub fn send_message(
        &self,
        thread_id: &ThreadId,
        sender_id: &str,
        content: impl Into<String>,
        mentions: &[String],
    ) -> Result<Message, SessionError> {
        let message = {
            let mut state = self.state.lock();
            if !state.agents.contains_key(sender_id) {
                return Err(SessionError::NotFound(format!("Agent '{}'", sender_id)));
            }
            let thread = state
                .threads
                .get_mut(thread_id)
                .ok_or_else(|| SessionError::NotFound(format!("Thread '{}'", thread_id)))?;
            if thread.is_closed {
                return Err(SessionError::InvalidState(format!("Thread '{}' is closed", thread_id)));
            }
            if !thread.has_participant(sender_id) {
                return Err(SessionError::PermissionDenied(format!(
                    "Agent '{}' is not a participant of thread '{}'",
                    sender_id, thread_id
                )));
            }

            let message = Message::create(thread, sender_id, content, mentions).ok_or_else(|| {
                SessionError::InvalidState(format!("Thread '{}' rejected the message", thread_id))
            })?;
            thread.push_message(message.clone());
            state.notify(&message);
            message
        };

        debug!(
            session_id = %self.id,
            thread_id = %thread_id,
            agent_id = sender_id,
            mentions = message.mentions.len(),
            "Message sent"
        );
        metrics::counter!("coral_messages_sent_total").increment(1);
        self.publish(SessionEvent::message_sent(&message));
        Ok(message)
    }

    /// Unread messages relevant to the agent, without advancing any cursor.
    pub fn unread_messages_for_agent(&self, agent_id: &str) -> Vec<Message> {
        self.state.lock().unread_messages(agent_id)
    }

    /// Return unread mentions immediately if there are any; otherwise wait up
    /// to `timeout_ms` for the next one. An unknown agent gets an empty list.
    pub async fn wait_for_mentions(&self, agent_id: &str, timeout_ms: i64) -> Result<Vec<Message>, SessionError> {
        if timeout_ms <= 0 {
            return Err(SessionError::InvalidArgument(format!(
                "timeoutMs must be positive, got {}",
                timeout_ms
            )));
        }

        let (waiter_id, mut rx) = {
            let mut state = self.state.lock();
            if !state.agents.contains_key(agent_id) {
                return Ok(Vec::new());
            }
            let unread = state.unread_messages(agent_id);
            if !unread.is_empty() {
                state.mark_read(agent_id, &unread);
                return Ok(unread);
            }
            let (tx, rx) = oneshot::channel();
            let id = state.next_waiter_id();
            state
                .mention_waiters
                .entry(agent_id.to_string())
                .or_default()
                .push(Waiter { id, tx });
            (id, rx)
        };

        debug!(session_id = %self.id, agent_id, timeout_ms, "Waiting for mentions");
        let messages = match tokio::time::timeout(Duration::from_millis(timeout_ms as u64), &mut rx).await {
            Ok(result) => result.unwrap_or_default(),
            Err(_) => {
                self.state.lock().remove_mention_waiter(agent_id, waiter_id);
                rx.try_recv().unwrap_or_default()
            }
        };

        if !messages.is_empty() {
            self.state.lock().mark_read(agent_id, &messages);
        }
        Ok(messages)
    }

    /// Stable display color for a sender id.
    pub fn color_for_sender_id(sender_id: &str) -> &'static str {
        let hash = sender_id
            .encode_utf16()
            .fold(0i32, |h, c| h.wrapping_mul(31).wrapping_add(c as i32));
        SENDER_COLORS[hash.unsigned_abs() as usize % SENDER_COLORS.len()]
    }
}

impl std::fmt::Debug for CoralAgentGraphSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoralAgentGraphSession")
            .field("id", &self.id)
            .field("application_id", &self.application_id)
            .field("blocking_groups", &self.blocking_groups)
            .finish_non_exhaustive()
    }
}
