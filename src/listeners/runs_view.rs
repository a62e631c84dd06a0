//! Keeps the denormalized test-runs view in sync with run activity.

use async_trait::async_trait;

use crate::domain::events::DomainEvent;
use crate::error::Result;
use crate::store::RunsViewStore;

use super::EventListener;

pub struct RunsViewListener {
    store: RunsViewStore,
}

impl RunsViewListener {
    pub fn new(store: RunsViewStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl EventListener for RunsViewListener {
    fn name(&self) -> &'static str {
        "runs_view"
    }

    async fn handle(&self, event: &DomainEvent) -> Result<()> {
        let (tenant_id, run_id) = match event {
            DomainEvent::RunStarted {
                tenant_id, run_id, ..
            }
            | DomainEvent::ResultRecorded {
                tenant_id, run_id, ..
            }
            | DomainEvent::RunFinished {
                tenant_id, run_id, ..
            } => (*tenant_id, *run_id),
            _ => return Ok(()),
        };

        self.store.refresh(tenant_id, run_id).await
    }
}
