//! Fans domain events out into notification rows.
//!
//! Recipients never include the acting user; a comment notifies prior
//! participants, a bug notifies its assignee, a finished run notifies
//! whoever started it.

use async_trait::async_trait;
use serde_json::json;

use crate::domain::events::DomainEvent;
use crate::error::Result;
use crate::store::{CommentStore, NotificationStore};

use super::EventListener;

pub struct NotifierListener {
    notifications: NotificationStore,
    comments: CommentStore,
}

impl NotifierListener {
    pub fn new(notifications: NotificationStore, comments: CommentStore) -> Self {
        Self {
            notifications,
            comments,
        }
    }
}

#[async_trait]
impl EventListener for NotifierListener {
    fn name(&self) -> &'static str {
        "notifier"
    }

    async fn handle(&self, event: &DomainEvent) -> Result<()> {
        match event {
            DomainEvent::CommentAdded {
                tenant_id,
                actor_id,
                comment_id,
                entity_type,
                entity_id,
            } => {
                let recipients: Vec<i64> = self
                    .comments
                    .participants(*tenant_id, entity_type, *entity_id)
                    .await?
                    .into_iter()
                    .filter(|user_id| user_id != actor_id)
                    .collect();

                let created = self
                    .notifications
                    .create_many(
                        *tenant_id,
                        &recipients,
                        "comment.added",
                        json!({
                            "comment_id": comment_id.to_string(),
                            "entity_type": entity_type,
                            "entity_id": entity_id.to_string(),
                            "author_id": actor_id.to_string(),
                        }),
                    )
                    .await?;

                tracing::debug!(
                    comment_id = comment_id,
                    recipients = created,
                    "Comment notifications created"
                );
            }
            DomainEvent::BugCreated {
                tenant_id,
                actor_id,
                bug_id,
                assignee_id,
            }
            | DomainEvent::BugUpdated {
                tenant_id,
                actor_id,
                bug_id,
                assignee_id,
            } => {
                if let Some(assignee_id) = assignee_id {
                    if assignee_id != actor_id {
                        self.notifications
                            .create(
                                *tenant_id,
                                *assignee_id,
                                "bug.assigned",
                                json!({
                                    "bug_id": bug_id.to_string(),
                                    "actor_id": actor_id.to_string(),
                                }),
                            )
                            .await?;
                    }
                }
            }
            DomainEvent::RunFinished {
                tenant_id,
                actor_id,
                run_id,
                started_by,
                status,
            } => {
                if started_by != actor_id {
                    self.notifications
                        .create(
                            *tenant_id,
                            *started_by,
                            "run.finished",
                            json!({
                                "run_id": run_id.to_string(),
                                "status": status,
                                "actor_id": actor_id.to_string(),
                            }),
                        )
                        .await?;
                }
            }
            _ => {}
        }

        Ok(())
    }
}
