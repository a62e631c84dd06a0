//! Domain event listeners.
//!
//! Each listener subscribes to the in-process bus and reacts to a subset of
//! events. Failures are logged and counted, never retried; a listener that
//! lags behind the channel capacity skips the overwritten events.

mod notifier;
mod runs_view;

pub use notifier::NotifierListener;
pub use runs_view::RunsViewListener;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::domain::events::{DomainEvent, EventBus};
use crate::error::Result;
use crate::metrics::{EVENTS_LAGGED_TOTAL, LISTENER_FAILURES_TOTAL};

#[async_trait]
pub trait EventListener: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, event: &DomainEvent) -> Result<()>;
}

/// Subscribe a listener to the bus and drive it until shutdown.
pub fn spawn_listener(
    bus: &EventBus,
    listener: Arc<dyn EventListener>,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    let mut events = bus.subscribe();

    tokio::spawn(async move {
        tracing::info!(listener = listener.name(), "Event listener started");

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    break;
                }
                event = events.recv() => match event {
                    Ok(event) => {
                        if let Err(e) = listener.handle(&event).await {
                            LISTENER_FAILURES_TOTAL
                                .with_label_values(&[listener.name()])
                                .inc();
                            tracing::warn!(
                                listener = listener.name(),
                                event = event.kind(),
                                error = %e,
                                "Event listener failed"
                            );
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        EVENTS_LAGGED_TOTAL.inc_by(skipped);
                        tracing::warn!(
                            listener = listener.name(),
                            skipped = skipped,
                            "Event listener lagged, events dropped"
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                },
            }
        }

        tracing::info!(listener = listener.name(), "Event listener stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingListener {
        seen: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl EventListener for CountingListener {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn handle(&self, _event: &DomainEvent) -> Result<()> {
            self.seen.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(crate::error::AppError::Internal("boom".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn test_event() -> DomainEvent {
        DomainEvent::RunStarted {
            tenant_id: 1,
            actor_id: 2,
            run_id: 3,
            plan_id: 4,
        }
    }

    #[tokio::test]
    async fn test_listener_receives_events_and_stops_on_shutdown() {
        let bus = EventBus::new(16);
        let listener = Arc::new(CountingListener {
            seen: AtomicUsize::new(0),
            fail: false,
        });
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let handle = spawn_listener(&bus, listener.clone(), shutdown_rx);

        // Give the subscriber a moment to attach, then emit.
        tokio::time::sleep(Duration::from_millis(20)).await;
        bus.emit(test_event());
        bus.emit(test_event());
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(listener.seen.load(Ordering::SeqCst), 2);

        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("listener should stop")
            .expect("listener should not panic");
    }

    #[tokio::test]
    async fn test_listener_failure_does_not_kill_loop() {
        let bus = EventBus::new(16);
        let listener = Arc::new(CountingListener {
            seen: AtomicUsize::new(0),
            fail: true,
        });
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let handle = spawn_listener(&bus, listener.clone(), shutdown_rx);

        tokio::time::sleep(Duration::from_millis(20)).await;
        bus.emit(test_event());
        bus.emit(test_event());
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Both events were handled despite the first failure.
        assert_eq!(listener.seen.load(Ordering::SeqCst), 2);

        shutdown_tx.send(()).unwrap();
        let _ = tokio::time::timeout(Duration::from_secs(2), handle).await;
    }
}
