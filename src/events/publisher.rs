use super::{EventSink, ValidationEvent};
use crate::constants::DEFAULT_EVENT_BUFFER_SIZE;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::trace;

/// High-throughput event publisher for lifecycle events
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<PublishedEvent>,
    published: Arc<AtomicU64>,
}

/// Event that has been published
#[derive(Debug, Clone)]
pub struct PublishedEvent {
    pub name: &'static str,
    pub event: ValidationEvent,
    pub published_at: chrono::DateTime<chrono::Utc>,
}

impl EventPublisher {
    /// Create a new event publisher with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            published: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Publish an event, returning how many subscribers received it
    pub fn publish(&self, event: ValidationEvent) -> usize {
        let published = PublishedEvent {
            name: event.name(),
            event,
            published_at: chrono::Utc::now(),
        };
        self.published.fetch_add(1, Ordering::Relaxed);

        // send() only fails when nobody is subscribed, which is fine for events
        match self.sender.send(published) {
            Ok(receivers) => receivers,
            Err(broadcast::error::SendError(event)) => {
                trace!(event = event.name, "Event published with no subscribers");
                0
            }
        }
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Total events published since creation
    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

impl EventSink for EventPublisher {
    fn emit(&self, event: ValidationEvent) {
        self.publish(event);
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::BatchStartEvent;

    fn batch_start(id: &str) -> ValidationEvent {
        ValidationEvent::BatchStart(BatchStartEvent {
            item_count: 3,
            max_concurrency: 2,
            batch_id: id.to_string(),
        })
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let publisher = EventPublisher::default();
        assert_eq!(publisher.publish(batch_start("a")), 0);
        assert_eq!(publisher.published_count(), 1);
    }

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let publisher = EventPublisher::new(16);
        let mut rx = publisher.subscribe();
        assert_eq!(publisher.subscriber_count(), 1);

        publisher.emit(batch_start("b"));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.name, "batch:start");
        assert_eq!(received.event, batch_start("b"));
    }
}
