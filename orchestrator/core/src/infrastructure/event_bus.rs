// Event Bus Implementation - Pub/Sub for Session Events
//
// In-memory event streaming using tokio broadcast channels. Feeds the debug
// event stream and any other observer of a session. Events are lost on restart.

use crate::domain::events::SessionEvent;
use futures::{Stream, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

/// Event bus for publishing and subscribing to session events
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<SessionEvent>>,
}

impl EventBus {
    /// Create a new event bus with specified channel capacity
    /// Capacity determines how many events can be buffered before dropping old ones
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Create event bus with default capacity (1000)
    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    /// Publish an event to all subscribers. Never blocks; a bus with no
    /// subscribers drops the event.
    pub fn publish(&self, event: SessionEvent) {
        debug!(event_type = event.event_type(), "Publishing session event");

        let receiver_count = self.sender.send(event).unwrap_or(0);
        if receiver_count == 0 {
            debug!("No subscribers listening to event");
        }
    }

    /// Subscribe to all events published after this call
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Receiver for session events
pub struct EventReceiver {
    receiver: broadcast::Receiver<SessionEvent>,
}

impl EventReceiver {
    /// Receive the next event (waits until one is available)
    pub async fn recv(&mut self) -> Result<SessionEvent, EventBusError> {
        self.receiver.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Closed => EventBusError::Closed,
            broadcast::error::RecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }

    /// Try to receive an event without waiting
    pub fn try_recv(&mut self) -> Result<SessionEvent, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }

    /// Turn the receiver into a stream. Lagged gaps are logged and skipped.
    pub fn into_stream(self) -> impl Stream<Item = SessionEvent> + Send + 'static {
        BroadcastStream::new(self.receiver).filter_map(|item| async move {
            match item {
                Ok(event) => Some(event),
                Err(tokio_stream::wrappers::errors::BroadcastStreamRecvError::Lagged(n)) => {
                    warn!("Event stream lagged by {} events", n);
                    None
                }
            }
        })
    }
}

/// Errors that can occur when receiving events
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::agent::Agent;

    #[tokio::test]
    async fn test_event_bus_publish_subscribe() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();

        event_bus.publish(SessionEvent::AgentRegistered {
            agent: Agent::new("alice"),
        });

        match receiver.recv().await.unwrap() {
            SessionEvent::AgentRegistered { agent } => assert_eq!(agent.id, "alice"),
            other => panic!("Wrong event type received: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let event_bus = EventBus::new(10);
        let mut receiver1 = event_bus.subscribe();
        let mut receiver2 = event_bus.subscribe();

        assert_eq!(event_bus.subscriber_count(), 2);

        event_bus.publish(SessionEvent::AgentReady { agent: "search".into() });

        // Both receivers should get the event
        let _ = receiver1.recv().await.unwrap();
        let _ = receiver2.recv().await.unwrap();
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_dropped() {
        let event_bus = EventBus::new(10);
        event_bus.publish(SessionEvent::AgentReady { agent: "nobody".into() });

        let mut receiver = event_bus.subscribe();
        assert!(matches!(receiver.try_recv(), Err(EventBusError::Empty)));
    }

    #[tokio::test]
    async fn test_into_stream_yields_events() {
        let event_bus = EventBus::new(10);
        let stream = event_bus.subscribe().into_stream();
        event_bus.publish(SessionEvent::AgentReady { agent: "a".into() });
        drop(event_bus);

        let events: Vec<SessionEvent> = stream.collect().await;
        assert_eq!(events, vec![SessionEvent::AgentReady { agent: "a".into() }]);
    }
}
