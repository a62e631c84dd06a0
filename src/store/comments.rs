//! Comment rows, polymorphic over (entity_type, entity_id).
//!
//! Table:
//! - `comments(id, tenant_id, entity_type, entity_id, author_id, body,
//!   created_at, updated_at, deleted_at)`

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use crate::domain::pagination::{Page, PageParams};
use crate::error::{AppError, Result};

/// Entity types that accept comments.
pub const COMMENTABLE_TYPES: &[&str] = &["test_case", "test_plan", "test_run", "bug"];

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Comment {
    pub id: i64,
    pub tenant_id: i64,
    pub entity_type: String,
    pub entity_id: i64,
    pub author_id: i64,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

const COLUMNS: &str =
    "id, tenant_id, entity_type, entity_id, author_id, body, created_at, updated_at, deleted_at";

#[derive(Clone)]
pub struct CommentStore {
    pool: PgPool,
}

impl CommentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        tenant_id: i64,
        author_id: i64,
        entity_type: &str,
        entity_id: i64,
        body: &str,
    ) -> Result<Comment> {
        let comment: Comment = sqlx::query_as(&format!(
            r#"
            INSERT INTO comments (tenant_id, entity_type, entity_id, author_id, body,
                                  created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, NOW(), NOW())
            RETURNING {COLUMNS}
            "#
        ))
        .bind(tenant_id)
        .bind(entity_type)
        .bind(entity_id)
        .bind(author_id)
        .bind(body)
        .fetch_one(&self.pool)
        .await?;

        Ok(comment)
    }

    pub async fn list_for_entity(
        &self,
        tenant_id: i64,
        entity_type: &str,
        entity_id: i64,
        params: PageParams,
    ) -> Result<Page<Comment>> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM comments
            WHERE tenant_id = $1 AND entity_type = $2 AND entity_id = $3
              AND deleted_at IS NULL
            "#,
        )
        .bind(tenant_id)
        .bind(entity_type)
        .bind(entity_id)
        .fetch_one(&self.pool)
        .await?;

        let items: Vec<Comment> = sqlx::query_as(&format!(
            r#"
            SELECT {COLUMNS}
            FROM comments
            WHERE tenant_id = $1 AND entity_type = $2 AND entity_id = $3
              AND deleted_at IS NULL
            ORDER BY created_at, id
            LIMIT $4 OFFSET $5
            "#
        ))
        .bind(tenant_id)
        .bind(entity_type)
        .bind(entity_id)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(items, params, total))
    }

    pub async fn fetch(&self, tenant_id: i64, id: i64) -> Result<Comment> {
        let comment: Option<Comment> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM comments WHERE tenant_id = $1 AND id = $2"
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match comment {
            Some(c) if c.deleted_at.is_some() => {
                Err(AppError::Gone(format!("Comment {} is deleted", id)))
            }
            Some(c) => Ok(c),
            None => Err(AppError::NotFound(format!("Comment {} not found", id))),
        }
    }

    pub async fn soft_delete(&self, tenant_id: i64, id: i64) -> Result<Comment> {
        let before = self.fetch(tenant_id, id).await?;

        sqlx::query(
            "UPDATE comments SET deleted_at = NOW(), updated_at = NOW() WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant_id)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(before)
    }

    /// Distinct authors who commented on an entity; used by the notifier to
    /// fan out to prior participants.
    pub async fn participants(
        &self,
        tenant_id: i64,
        entity_type: &str,
        entity_id: i64,
    ) -> Result<Vec<i64>> {
        let authors: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT author_id FROM comments
            WHERE tenant_id = $1 AND entity_type = $2 AND entity_id = $3
              AND deleted_at IS NULL
            "#,
        )
        .bind(tenant_id)
        .bind(entity_type)
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(authors)
    }
}
