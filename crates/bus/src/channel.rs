//! Broadcast-backed event bus

use tokio::sync::broadcast;

use crate::event::EngineEvent;

pub const DEFAULT_CAPACITY: usize = 1024;

/// Event bus for distributing engine events
///
/// Cloning is cheap; all clones publish into the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    /// Create a bus retaining at most `capacity` undelivered events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event. Returns the number of subscribers that will see it.
    ///
    /// Having no subscribers is not an error.
    pub fn publish(&self, event: EngineEvent) -> usize {
        let kind = event.kind();
        match self.sender.send(event) {
            Ok(n) => {
                tracing::trace!(event = kind, subscribers = n, "Event published");
                n
            }
            Err(_) => 0,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
