//! Change data capture.
//!
//! Records before/after JSON snapshots of mutated rows into `audit_logs`.
//! Writes are best effort: a failure is logged and counted, and never
//! blocks the primary operation.

use serde::Serialize;
use sqlx::PgPool;

use crate::metrics::{AUDIT_RECORDS_TOTAL, AUDIT_WRITE_FAILURES_TOTAL};

/// A single captured mutation, ready to be recorded.
#[derive(Debug, Clone)]
pub struct Change {
    pub action: String,
    pub entity_type: String,
    pub entity_id: i64,
    pub before: Option<serde_json::Value>,
    pub after: Option<serde_json::Value>,
}

impl Change {
    pub fn created<T: Serialize>(entity_type: &str, entity_id: i64, after: &T) -> Self {
        Self {
            action: format!("{}.created", entity_type),
            entity_type: entity_type.to_string(),
            entity_id,
            before: None,
            after: serde_json::to_value(after).ok(),
        }
    }

    pub fn updated<T: Serialize, U: Serialize>(
        entity_type: &str,
        entity_id: i64,
        before: &T,
        after: &U,
    ) -> Self {
        Self {
            action: format!("{}.updated", entity_type),
            entity_type: entity_type.to_string(),
            entity_id,
            before: serde_json::to_value(before).ok(),
            after: serde_json::to_value(after).ok(),
        }
    }

    pub fn deleted<T: Serialize>(entity_type: &str, entity_id: i64, before: &T) -> Self {
        Self {
            action: format!("{}.deleted", entity_type),
            entity_type: entity_type.to_string(),
            entity_id,
            before: serde_json::to_value(before).ok(),
            after: None,
        }
    }

    /// Custom action name (e.g. "run.finished") on top of a snapshot pair.
    pub fn action(mut self, action: &str) -> Self {
        self.action = action.to_string();
        self
    }
}

/// Top-level JSON keys whose value differs between the two snapshots.
pub fn changed_fields(
    before: &Option<serde_json::Value>,
    after: &Option<serde_json::Value>,
) -> Vec<String> {
    let empty = serde_json::Map::new();
    let before_map = before
        .as_ref()
        .and_then(|v| v.as_object())
        .unwrap_or(&empty);
    let after_map = after
        .as_ref()
        .and_then(|v| v.as_object())
        .unwrap_or(&empty);

    let mut fields: Vec<String> = before_map
        .keys()
        .chain(after_map.keys())
        .filter(|key| before_map.get(key.as_str()) != after_map.get(key.as_str()))
        .cloned()
        .collect();

    fields.sort();
    fields.dedup();
    fields
}

/// Best-effort writer of audit rows.
#[derive(Clone)]
pub struct ChangeLogger {
    pool: PgPool,
}

impl ChangeLogger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Record a change. Never returns an error.
    pub async fn record(&self, tenant_id: i64, actor_id: i64, change: Change) {
        let fields = changed_fields(&change.before, &change.after);

        let result = sqlx::query(
            r#"
            INSERT INTO audit_logs (
                tenant_id, actor_id, action, entity_type, entity_id,
                before_state, after_state, changed_fields, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())
            "#,
        )
        .bind(tenant_id)
        .bind(actor_id)
        .bind(&change.action)
        .bind(&change.entity_type)
        .bind(change.entity_id)
        .bind(&change.before)
        .bind(&change.after)
        .bind(&fields)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                AUDIT_RECORDS_TOTAL.inc();
                tracing::debug!(
                    action = %change.action,
                    entity_type = %change.entity_type,
                    entity_id = change.entity_id,
                    changed = fields.len(),
                    "Audit log entry created"
                );
            }
            Err(e) => {
                AUDIT_WRITE_FAILURES_TOTAL.inc();
                tracing::warn!(
                    error = %e,
                    action = %change.action,
                    entity_type = %change.entity_type,
                    entity_id = change.entity_id,
                    "Failed to write audit log entry"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_changed_fields_on_update() {
        let before = Some(json!({"title": "old", "priority": "high", "version": 1}));
        let after = Some(json!({"title": "new", "priority": "high", "version": 2}));

        let fields = changed_fields(&before, &after);
        assert_eq!(fields, vec!["title", "version"]);
    }

    #[test]
    fn test_changed_fields_on_create() {
        let after = Some(json!({"title": "new", "priority": "high"}));
        let fields = changed_fields(&None, &after);
        assert_eq!(fields, vec!["priority", "title"]);
    }

    #[test]
    fn test_changed_fields_on_delete() {
        let before = Some(json!({"title": "old"}));
        let fields = changed_fields(&before, &None);
        assert_eq!(fields, vec!["title"]);
    }

    #[test]
    fn test_no_change_yields_empty() {
        let state = Some(json!({"a": 1}));
        assert!(changed_fields(&state, &state.clone()).is_empty());
    }

    #[test]
    fn test_change_constructors() {
        #[derive(serde::Serialize)]
        struct Row {
            title: &'static str,
        }

        let change = Change::created("project", 5, &Row { title: "api" });
        assert_eq!(change.action, "project.created");
        assert!(change.before.is_none());
        assert!(change.after.is_some());

        let change = Change::updated("bug", 9, &Row { title: "a" }, &Row { title: "b" })
            .action("bug.assigned");
        assert_eq!(change.action, "bug.assigned");
    }
}
