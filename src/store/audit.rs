//! Audit log queries.
//!
//! Table:
//! - `audit_logs(id, tenant_id, actor_id, action, entity_type, entity_id,
//!   before_state, after_state, changed_fields, created_at)`
//!
//! Writes go through `domain::changelog`; this store only reads.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use crate::domain::pagination::{Page, PageParams};
use crate::error::Result;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AuditLogEntry {
    pub id: i64,
    pub tenant_id: i64,
    pub actor_id: i64,
    pub action: String,
    pub entity_type: String,
    pub entity_id: i64,
    pub before_state: Option<serde_json::Value>,
    pub after_state: Option<serde_json::Value>,
    pub changed_fields: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct AuditLogFilter {
    pub entity_type: Option<String>,
    pub entity_id: Option<i64>,
    pub actor_id: Option<i64>,
}

const COLUMNS: &str = "id, tenant_id, actor_id, action, entity_type, entity_id, \
                       before_state, after_state, changed_fields, created_at";

#[derive(Clone)]
pub struct AuditLogStore {
    pool: PgPool,
}

impl AuditLogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(
        &self,
        tenant_id: i64,
        filter: AuditLogFilter,
        params: PageParams,
    ) -> Result<Page<AuditLogEntry>> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM audit_logs
            WHERE tenant_id = $1
              AND ($2::text IS NULL OR entity_type = $2)
              AND ($3::bigint IS NULL OR entity_id = $3)
              AND ($4::bigint IS NULL OR actor_id = $4)
            "#,
        )
        .bind(tenant_id)
        .bind(&filter.entity_type)
        .bind(filter.entity_id)
        .bind(filter.actor_id)
        .fetch_one(&self.pool)
        .await?;

        let items: Vec<AuditLogEntry> = sqlx::query_as(&format!(
            r#"
            SELECT {COLUMNS}
            FROM audit_logs
            WHERE tenant_id = $1
              AND ($2::text IS NULL OR entity_type = $2)
              AND ($3::bigint IS NULL OR entity_id = $3)
              AND ($4::bigint IS NULL OR actor_id = $4)
            ORDER BY id DESC
            LIMIT $5 OFFSET $6
            "#
        ))
        .bind(tenant_id)
        .bind(&filter.entity_type)
        .bind(filter.entity_id)
        .bind(filter.actor_id)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(items, params, total))
    }
}
