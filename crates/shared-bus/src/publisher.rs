//! # Event Publisher
//!
//! `publish` never fails. An event nobody listens to is dropped and the drop
//! is logged, so a committed transition cannot be undone by its notification.

use crate::events::{DsocEvent, EventFilter};
use crate::subscriber::{EventStream, Subscription};
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Sink for lifecycle and reconciliation events.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Broadcast `event`. Returns how many subscribers it reached.
    async fn publish(&self, event: DsocEvent) -> usize;
}

/// Process-local bus over a `tokio::sync::broadcast` channel.
///
/// Each subscriber buffers up to `capacity` events; a subscriber that falls
/// further behind skips the oldest ones.
pub struct InMemoryEventBus {
    sender: broadcast::Sender<DsocEvent>,
    capacity: usize,
}

impl InMemoryEventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender, capacity }
    }

    /// Subscribe to events matching `filter`, starting with the next publish.
    #[must_use]
    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        debug!(topics = ?filter.topics, "[bus] new subscription");
        Subscription::new(self.sender.subscribe(), filter)
    }

    /// Like [`subscribe`](Self::subscribe), as a `Stream`.
    #[must_use]
    pub fn event_stream(&self, filter: EventFilter) -> EventStream {
        self.subscribe(filter).into_stream()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, event: DsocEvent) -> usize {
        let topic = event.topic();
        match self.sender.send(event) {
            Ok(receivers) => {
                trace!(?topic, receivers, "[bus] event delivered");
                receivers
            }
            Err(broadcast::error::SendError(dropped)) => {
                debug!(
                    ?topic,
                    source = dropped.source_component(),
                    "[bus] no subscribers, event dropped"
                );
                0
            }
        }
    }
}
