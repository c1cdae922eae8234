//! Live-update fan-out for dashboards and the `serve` feed.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;

use crate::domain::models::LiveEvent;
use crate::domain::ports::LiveUpdateSink;

/// An event stamped with its publish order and time.
#[derive(Debug, Clone, Serialize)]
pub struct LiveUpdate {
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: LiveEvent,
}

/// Broadcast bus for [`LiveEvent`]s.
///
/// Publishing never blocks: a subscriber that falls more than `capacity`
/// events behind loses the oldest ones and sees `RecvError::Lagged`.
pub struct LiveUpdateBus {
    sender: broadcast::Sender<LiveUpdate>,
    sequence: AtomicU64,
}

impl LiveUpdateBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender, sequence: AtomicU64::new(0) }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LiveUpdate> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Events published so far.
    pub fn published(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }
}

impl Default for LiveUpdateBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl LiveUpdateSink for LiveUpdateBus {
    fn notify(&self, event: LiveEvent) {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        tracing::trace!(sequence, kind = event.kind(), "live update");
        // No subscribers is fine.
        let _ = self.sender.send(LiveUpdate { sequence, timestamp: Utc::now(), event });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ConversationId;
    use tokio::sync::broadcast::error::RecvError;

    fn end(id: i64) -> LiveEvent {
        LiveEvent::ConversationEnd { conversation_id: ConversationId(id), turns: 4 }
    }

    #[tokio::test]
    async fn test_events_arrive_in_publish_order() {
        let bus = LiveUpdateBus::default();
        let mut rx = bus.subscribe();

        bus.notify(end(1));
        bus.notify(end(2));

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.event, end(1));
        assert!(first.sequence < second.sequence);
        assert_eq!(bus.published(), 2);
    }

    #[test]
    fn test_notify_without_subscribers_is_silent() {
        let bus = LiveUpdateBus::new(4);
        bus.notify(end(1));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_slow_subscriber_lags_instead_of_blocking() {
        let bus = LiveUpdateBus::new(2);
        let mut rx = bus.subscribe();
        for id in 0..5 {
            bus.notify(end(id));
        }

        assert!(matches!(rx.recv().await, Err(RecvError::Lagged(3))));
        assert_eq!(rx.recv().await.unwrap().event, end(3));
    }

    #[test]
    fn test_serialized_update_is_flat() {
        let bus = LiveUpdateBus::new(1);
        let mut rx = bus.subscribe();
        bus.notify(end(7));
        let update = rx.try_recv().unwrap();
        let value = serde_json::to_value(&update).unwrap();
        assert_eq!(value["type"], "conversation_end");
        assert_eq!(value["conversation_id"], 7);
        assert_eq!(value["sequence"], 0);
    }
}
