//! Tenant rows.
//!
//! Table:
//! - `tenants(id, slug, name, created_at, deleted_at)`

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use crate::domain::pagination::{Page, PageParams};
use crate::error::{AppError, Result};

use super::conflict_on_unique;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Tenant {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct TenantStore {
    pool: PgPool,
}

impl TenantStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, slug: &str, name: &str) -> Result<Tenant> {
        sqlx::query_as(
            r#"
            INSERT INTO tenants (slug, name, created_at)
            VALUES ($1, $2, NOW())
            RETURNING id, slug, name, created_at, deleted_at
            "#,
        )
        .bind(slug)
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, &format!("Tenant slug '{}' already exists", slug)))
    }

    pub async fn list(&self, params: PageParams) -> Result<Page<Tenant>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tenants WHERE deleted_at IS NULL")
            .fetch_one(&self.pool)
            .await?;

        let items: Vec<Tenant> = sqlx::query_as(
            r#"
            SELECT id, slug, name, created_at, deleted_at
            FROM tenants
            WHERE deleted_at IS NULL
            ORDER BY id
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(items, params, total))
    }

    pub async fn fetch(&self, id: i64) -> Result<Tenant> {
        let tenant: Option<Tenant> = sqlx::query_as(
            "SELECT id, slug, name, created_at, deleted_at FROM tenants WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match tenant {
            Some(t) if t.deleted_at.is_some() => {
                Err(AppError::Gone(format!("Tenant {} is deleted", id)))
            }
            Some(t) => Ok(t),
            None => Err(AppError::NotFound(format!("Tenant {} not found", id))),
        }
    }
}
