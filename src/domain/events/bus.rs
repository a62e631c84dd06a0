use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::metrics::EVENTS_EMITTED_TOTAL;

use super::DomainEvent;

/// Process-local domain event bus.
///
/// A thin wrapper over `tokio::sync::broadcast`: `emit` fans an event out to
/// every live subscriber. There is no ordering guarantee across emitters, no
/// backpressure, and no redelivery; a subscriber that falls more than
/// `capacity` events behind skips the overwritten ones.
pub struct EventBus {
    sender: broadcast::Sender<DomainEvent>,
    emitted: DashMap<&'static str, AtomicU64>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            emitted: DashMap::new(),
        }
    }

    /// Publish an event to all current subscribers.
    ///
    /// Never fails: with no subscribers the event is dropped with a debug
    /// log, matching the fire-and-forget contract.
    pub fn emit(&self, event: DomainEvent) {
        let kind = event.kind();

        self.emitted
            .entry(kind)
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
        EVENTS_EMITTED_TOTAL.with_label_values(&[kind]).inc();

        match self.sender.send(event) {
            Ok(receivers) => {
                tracing::debug!(event = kind, receivers = receivers, "Domain event emitted");
            }
            Err(_) => {
                tracing::debug!(event = kind, "Domain event emitted with no subscribers");
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.sender.subscribe()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn stats(&self) -> EventBusStats {
        let emitted = self
            .emitted
            .iter()
            .map(|entry| (entry.key().to_string(), entry.value().load(Ordering::Relaxed)))
            .collect();

        EventBusStats {
            emitted,
            subscribers: self.subscriber_count(),
        }
    }
}

/// Snapshot of bus activity for the stats endpoint.
#[derive(Debug, Clone, serde::Serialize)]
pub struct EventBusStats {
    pub emitted: HashMap<String, u64>,
    pub subscribers: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn case_created(case_id: i64) -> DomainEvent {
        DomainEvent::CaseCreated {
            tenant_id: 1,
            actor_id: 2,
            case_id,
            suite_id: 3,
        }
    }

    #[tokio::test]
    async fn test_emit_reaches_subscriber() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.emit(case_created(10));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind(), "case.created");
    }

    #[tokio::test]
    async fn test_emit_without_subscribers_does_not_panic() {
        let bus = EventBus::new(16);
        bus.emit(case_created(10));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_fan_out_to_multiple_subscribers() {
        let bus = EventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.emit(case_created(10));

        assert_eq!(rx1.recv().await.unwrap().kind(), "case.created");
        assert_eq!(rx2.recv().await.unwrap().kind(), "case.created");
    }

    #[tokio::test]
    async fn test_stats_count_per_kind() {
        let bus = EventBus::new(16);
        bus.emit(case_created(1));
        bus.emit(case_created(2));
        bus.emit(DomainEvent::RunFinished {
            tenant_id: 1,
            actor_id: 2,
            run_id: 3,
            started_by: 2,
            status: "completed".to_string(),
        });

        let stats = bus.stats();
        assert_eq!(stats.emitted.get("case.created"), Some(&2));
        assert_eq!(stats.emitted.get("run.finished"), Some(&1));
    }

    #[tokio::test]
    async fn test_lagging_subscriber_drops_oldest() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();

        for i in 0..5 {
            bus.emit(case_created(i));
        }

        // The first recv reports the lag, subsequent recvs see the tail.
        match rx.recv().await {
            Err(broadcast::error::RecvError::Lagged(skipped)) => assert!(skipped >= 1),
            Ok(_) => panic!("expected lag error"),
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
}
