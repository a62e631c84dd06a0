//! Attachment rows.
//!
//! Table:
//! - `attachments(id, tenant_id, entity_type, entity_id, file_name,
//!   content_type, size_bytes, storage_path, blob_data, uploaded_by,
//!   created_at, deleted_at)`
//!
//! Exactly one of `storage_path` / `blob_data` is populated, depending on
//! the configured upload backend.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use crate::domain::pagination::{Page, PageParams};
use crate::error::{AppError, Result};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Attachment {
    pub id: i64,
    pub tenant_id: i64,
    pub entity_type: String,
    pub entity_id: i64,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub storage_path: Option<String>,
    #[serde(skip_serializing)]
    pub blob_data: Option<Vec<u8>>,
    pub uploaded_by: i64,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct NewAttachment {
    pub entity_type: String,
    pub entity_id: i64,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub storage_path: Option<String>,
    pub blob_data: Option<Vec<u8>>,
}

const COLUMNS: &str = "id, tenant_id, entity_type, entity_id, file_name, content_type, \
                       size_bytes, storage_path, blob_data, uploaded_by, created_at, deleted_at";

#[derive(Clone)]
pub struct AttachmentStore {
    pool: PgPool,
}

impl AttachmentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        tenant_id: i64,
        uploaded_by: i64,
        new: NewAttachment,
    ) -> Result<Attachment> {
        let attachment: Attachment = sqlx::query_as(&format!(
            r#"
            INSERT INTO attachments (tenant_id, entity_type, entity_id, file_name, content_type,
                                     size_bytes, storage_path, blob_data, uploaded_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW())
            RETURNING {COLUMNS}
            "#
        ))
        .bind(tenant_id)
        .bind(&new.entity_type)
        .bind(new.entity_id)
        .bind(&new.file_name)
        .bind(&new.content_type)
        .bind(new.size_bytes)
        .bind(&new.storage_path)
        .bind(&new.blob_data)
        .bind(uploaded_by)
        .fetch_one(&self.pool)
        .await?;

        Ok(attachment)
    }

    pub async fn fetch(&self, tenant_id: i64, id: i64) -> Result<Attachment> {
        let attachment: Option<Attachment> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM attachments WHERE tenant_id = $1 AND id = $2"
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match attachment {
            Some(a) if a.deleted_at.is_some() => {
                Err(AppError::Gone(format!("Attachment {} is deleted", id)))
            }
            Some(a) => Ok(a),
            None => Err(AppError::NotFound(format!("Attachment {} not found", id))),
        }
    }

    pub async fn list_for_entity(
        &self,
        tenant_id: i64,
        entity_type: &str,
        entity_id: i64,
        params: PageParams,
    ) -> Result<Page<Attachment>> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM attachments
            WHERE tenant_id = $1 AND entity_type = $2 AND entity_id = $3
              AND deleted_at IS NULL
            "#,
        )
        .bind(tenant_id)
        .bind(entity_type)
        .bind(entity_id)
        .fetch_one(&self.pool)
        .await?;

        // Blob bytes stay in the database on list; only the download
        // endpoint materializes them.
        let items: Vec<Attachment> = sqlx::query_as(
            r#"
            SELECT id, tenant_id, entity_type, entity_id, file_name, content_type,
                   size_bytes, storage_path, NULL::bytea AS blob_data, uploaded_by,
                   created_at, deleted_at
            FROM attachments
            WHERE tenant_id = $1 AND entity_type = $2 AND entity_id = $3
              AND deleted_at IS NULL
            ORDER BY id
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(tenant_id)
        .bind(entity_type)
        .bind(entity_id)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(items, params, total))
    }

    pub async fn soft_delete(&self, tenant_id: i64, id: i64) -> Result<Attachment> {
        let before = self.fetch(tenant_id, id).await?;

        sqlx::query(
            "UPDATE attachments SET deleted_at = NOW() WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant_id)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(before)
    }
}
