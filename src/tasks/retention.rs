use tokio::sync::broadcast;

use crate::config::RetentionConfig;
use crate::store::{NotificationStore, RetentionStore};

/// Background task that purges expired data on an interval:
/// soft-deleted rows past the retention window and old read notifications.
pub struct RetentionTask {
    config: RetentionConfig,
    retention: RetentionStore,
    notifications: NotificationStore,
    shutdown: broadcast::Receiver<()>,
}

impl RetentionTask {
    pub fn new(
        config: RetentionConfig,
        retention: RetentionStore,
        notifications: NotificationStore,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            config,
            retention,
            notifications,
            shutdown,
        }
    }

    /// Run the sweep loop until shutdown.
    pub async fn run(mut self) {
        let interval = std::time::Duration::from_secs(self.config.sweep_interval_seconds);
        let mut timer = tokio::time::interval(interval);

        // Skip immediate first tick
        timer.tick().await;

        tracing::info!(
            sweep_interval_secs = self.config.sweep_interval_seconds,
            soft_delete_days = self.config.soft_delete_days,
            "Retention task started"
        );

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("Retention task received shutdown signal");
                    break;
                }
                _ = timer.tick() => {
                    self.sweep().await;
                }
            }
        }

        tracing::info!("Retention task stopped");
    }

    async fn sweep(&self) {
        match self
            .retention
            .purge_soft_deleted(self.config.soft_delete_days)
            .await
        {
            Ok(purged) if purged > 0 => {
                tracing::info!(purged = purged, "Purged soft-deleted rows");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "Soft-delete purge failed");
            }
        }

        match self
            .notifications
            .purge_read_older_than(self.config.read_notification_days)
            .await
        {
            Ok(purged) if purged > 0 => {
                tracing::info!(purged = purged, "Purged read notifications");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "Notification purge failed");
            }
        }
    }
}
