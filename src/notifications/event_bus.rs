//! Broadcast of ledger changes to display clients

use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

use super::events::{Event, EventMessage};

/// Messages a slow subscriber may fall behind by before it starts missing them.
pub const DEFAULT_CAPACITY: usize = 1024;

pub type SharedEventBus = Arc<EventBus>;

/// Bus with the default capacity, ready to hand to a `LedgerService`.
pub fn create_event_bus() -> SharedEventBus {
    Arc::new(EventBus::default())
}

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventMessage>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Fire-and-forget: with nobody listening the message is dropped.
    pub fn publish(&self, event: Event) {
        let message = EventMessage::new(event);
        let event_type = message.event.event_type();
        let household_id = message.event.household_id().clone();
        let subscribers = self.sender.send(message).unwrap_or(0);
        debug!(event_type, %household_id, subscribers, "Event published");
    }

    pub fn subscribe(&self) -> EventSubscriber {
        EventSubscriber(self.sender.subscribe())
    }
}

/// Receiving end handed out by `EventBus::subscribe`.
pub struct EventSubscriber(broadcast::Receiver<EventMessage>);

impl EventSubscriber {
    /// Next message, or `None` once every bus handle is gone. Messages lost
    /// to lag are skipped.
    pub async fn recv(&mut self) -> Option<EventMessage> {
        loop {
            match self.0.recv().await {
                Ok(message) => return Some(message),
                Err(RecvError::Lagged(missed)) => warn!(missed, "Event subscriber lagged"),
                Err(RecvError::Closed) => return None,
            }
        }
    }
}
