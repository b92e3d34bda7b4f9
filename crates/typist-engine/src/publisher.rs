//! Event fan-out.
//!
//! Every subscriber owns an unbounded channel, so a slow observer never causes
//! another to miss events and nothing is dropped. Publishing is serialised by
//! the caller, which keeps per-session order intact.

use std::sync::Mutex;

use tokio::sync::mpsc;
use tracing::{debug, trace};
use uuid::Uuid;

use typist_core::events::{EventEnvelope, ReadySnapshot};

struct Subscriber {
    filter: Option<Uuid>,
    tx: mpsc::UnboundedSender<EventEnvelope>,
}

/// Broadcasts session events to any number of observers.
#[derive(Default)]
pub struct EventPublisher {
    subscribers: Mutex<Vec<Subscriber>>,
}

impl EventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer. `filter` restricts it to one session.
    pub fn subscribe(&self, filter: Option<Uuid>) -> mpsc::UnboundedReceiver<EventEnvelope> {
        let (tx, rx) = mpsc::unbounded_channel();
        match self.subscribers.lock() {
            Ok(mut subscribers) => {
                subscribers.push(Subscriber { filter, tx });
                debug!(subscribers = subscribers.len(), "Event subscriber added");
            }
            Err(e) => debug!("Publisher lock poisoned, subscriber not registered: {}", e),
        }
        rx
    }

    /// Deliver `envelope` to every matching subscriber, pruning closed ones.
    pub fn publish(&self, envelope: EventEnvelope) {
        let Ok(mut subscribers) = self.subscribers.lock() else {
            return;
        };
        trace!(
            session_id = %envelope.session_id,
            seq = envelope.seq,
            event = envelope.event.event_name(),
            "Publishing event"
        );
        subscribers.retain(|sub| {
            if sub.filter.is_some_and(|id| id != envelope.session_id) {
                return !sub.tx.is_closed();
            }
            sub.tx.send(envelope.clone()).is_ok()
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map(|s| s.len()).unwrap_or(0)
    }
}

impl std::fmt::Debug for EventPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventPublisher")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// An observer's view: the state at subscription time, then live events.
#[derive(Debug)]
pub struct Subscription {
    pub ready: ReadySnapshot,
    pub events: mpsc::UnboundedReceiver<EventEnvelope>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<EventEnvelope> {
        self.events.recv().await
    }
}
