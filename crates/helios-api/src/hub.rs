//! In-memory tick event fan-out.
//!
//! One broadcaster per process. The scheduler publishes each committed
//! tick's event batch; every connected observer holds a receiver and
//! partitions the batch for its own player scope at the socket. Delivery is
//! at-most-once and best-effort; disconnected observers fall back on the
//! durable notifications table.

use contracts::TickBatch;
use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct EventHub {
    tx: broadcast::Sender<TickBatch>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Deliver a batch to every current subscriber. Returns how many
    /// subscribers received it; zero subscribers is not an error.
    pub fn publish(&self, batch: TickBatch) -> usize {
        self.tx.send(batch).unwrap_or(0)
    }

    /// Register an observer. Dropping the receiver deregisters it.
    pub fn subscribe(&self) -> broadcast::Receiver<TickBatch> {
        self.tx.subscribe()
    }

    pub fn observer_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{DomainEvent, EventType};
    use serde_json::json;

    fn test_batch(tick: u64) -> TickBatch {
        TickBatch {
            tick,
            tick_interval_ms: 5_000,
            events: vec![DomainEvent::global(
                EventType::MarketsDrifted,
                json!({"stations": 1}),
            )],
        }
    }

    #[test]
    fn publish_without_subscribers_is_a_no_op() {
        let hub = EventHub::new();
        assert_eq!(hub.publish(test_batch(1)), 0);
    }

    #[tokio::test]
    async fn subscribers_receive_published_batches() {
        let hub = EventHub::new();
        let mut rx = hub.subscribe();
        assert_eq!(hub.observer_count(), 1);

        hub.publish(test_batch(7));
        let received = rx.recv().await.expect("batch delivered");
        assert_eq!(received.tick, 7);
    }

    #[tokio::test]
    async fn dropping_a_receiver_deregisters_the_observer() {
        let hub = EventHub::new();
        let rx = hub.subscribe();
        assert_eq!(hub.observer_count(), 1);
        drop(rx);
        assert_eq!(hub.observer_count(), 0);
    }
}
