//! Notification rows.
//!
//! Table:
//! - `notifications(id, tenant_id, user_id, kind, payload, read_at,
//!   created_at)`
//!
//! Created by the notifier listener; read and acknowledged over REST.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use crate::domain::pagination::{Page, PageParams};
use crate::error::{AppError, Result};
use crate::metrics::NOTIFICATIONS_CREATED_TOTAL;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Notification {
    pub id: i64,
    pub tenant_id: i64,
    pub user_id: i64,
    pub kind: String,
    pub payload: serde_json::Value,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

const COLUMNS: &str = "id, tenant_id, user_id, kind, payload, read_at, created_at";

#[derive(Clone)]
pub struct NotificationStore {
    pool: PgPool,
}

impl NotificationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        tenant_id: i64,
        user_id: i64,
        kind: &str,
        payload: serde_json::Value,
    ) -> Result<Notification> {
        let notification: Notification = sqlx::query_as(&format!(
            r#"
            INSERT INTO notifications (tenant_id, user_id, kind, payload, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            RETURNING {COLUMNS}
            "#
        ))
        .bind(tenant_id)
        .bind(user_id)
        .bind(kind)
        .bind(&payload)
        .fetch_one(&self.pool)
        .await?;

        NOTIFICATIONS_CREATED_TOTAL.with_label_values(&[kind]).inc();

        Ok(notification)
    }

    /// Create one notification per recipient with a shared payload.
    pub async fn create_many(
        &self,
        tenant_id: i64,
        user_ids: &[i64],
        kind: &str,
        payload: serde_json::Value,
    ) -> Result<usize> {
        if user_ids.is_empty() {
            return Ok(0);
        }

        let created = sqlx::query(
            r#"
            INSERT INTO notifications (tenant_id, user_id, kind, payload, created_at)
            SELECT $1, uid, $2, $3, NOW()
            FROM UNNEST($4::bigint[]) AS uid
            "#,
        )
        .bind(tenant_id)
        .bind(kind)
        .bind(&payload)
        .bind(user_ids)
        .execute(&self.pool)
        .await?
        .rows_affected() as usize;

        for _ in 0..created {
            NOTIFICATIONS_CREATED_TOTAL.with_label_values(&[kind]).inc();
        }

        Ok(created)
    }

    pub async fn list(
        &self,
        tenant_id: i64,
        user_id: i64,
        unread_only: bool,
        params: PageParams,
    ) -> Result<Page<Notification>> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM notifications
            WHERE tenant_id = $1 AND user_id = $2
              AND (NOT $3 OR read_at IS NULL)
            "#,
        )
        .bind(tenant_id)
        .bind(user_id)
        .bind(unread_only)
        .fetch_one(&self.pool)
        .await?;

        let items: Vec<Notification> = sqlx::query_as(&format!(
            r#"
            SELECT {COLUMNS}
            FROM notifications
            WHERE tenant_id = $1 AND user_id = $2
              AND (NOT $3 OR read_at IS NULL)
            ORDER BY id DESC
            LIMIT $4 OFFSET $5
            "#
        ))
        .bind(tenant_id)
        .bind(user_id)
        .bind(unread_only)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(items, params, total))
    }

    pub async fn mark_read(&self, tenant_id: i64, user_id: i64, id: i64) -> Result<Notification> {
        let notification: Option<Notification> = sqlx::query_as(&format!(
            r#"
            UPDATE notifications
            SET read_at = COALESCE(read_at, NOW())
            WHERE tenant_id = $1 AND user_id = $2 AND id = $3
            RETURNING {COLUMNS}
            "#
        ))
        .bind(tenant_id)
        .bind(user_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        notification.ok_or_else(|| AppError::NotFound(format!("Notification {} not found", id)))
    }

    pub async fn mark_all_read(&self, tenant_id: i64, user_id: i64) -> Result<u64> {
        let updated = sqlx::query(
            r#"
            UPDATE notifications
            SET read_at = NOW()
            WHERE tenant_id = $1 AND user_id = $2 AND read_at IS NULL
            "#,
        )
        .bind(tenant_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(updated)
    }

    /// Delete read notifications older than the retention window.
    pub async fn purge_read_older_than(&self, days: i64) -> Result<u64> {
        let deleted = sqlx::query(
            r#"
            DELETE FROM notifications
            WHERE read_at IS NOT NULL
              AND read_at < NOW() - ($1 || ' days')::interval
            "#,
        )
        .bind(days.to_string())
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(deleted)
    }
}
