//! Repository rows (source-control repositories attached to a project).
//!
//! Table:
//! - `repositories(id, tenant_id, project_id, name, provider, remote_url,
//!   default_branch, created_at, updated_at, deleted_at)`

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use crate::domain::pagination::{Page, PageParams};
use crate::error::{AppError, Result};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Repository {
    pub id: i64,
    pub tenant_id: i64,
    pub project_id: i64,
    pub name: String,
    pub provider: String,
    pub remote_url: String,
    pub default_branch: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct NewRepository {
    pub project_id: i64,
    pub name: String,
    pub provider: String,
    pub remote_url: String,
    pub default_branch: String,
}

#[derive(Debug, Default)]
pub struct UpdateRepository {
    pub name: Option<String>,
    pub remote_url: Option<String>,
    pub default_branch: Option<String>,
}

const COLUMNS: &str = "id, tenant_id, project_id, name, provider, remote_url, default_branch, \
                       created_at, updated_at, deleted_at";

#[derive(Clone)]
pub struct RepositoryStore {
    pool: PgPool,
}

impl RepositoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, tenant_id: i64, new: NewRepository) -> Result<Repository> {
        let repository: Repository = sqlx::query_as(&format!(
            r#"
            INSERT INTO repositories (tenant_id, project_id, name, provider, remote_url,
                                      default_branch, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW())
            RETURNING {COLUMNS}
            "#
        ))
        .bind(tenant_id)
        .bind(new.project_id)
        .bind(&new.name)
        .bind(&new.provider)
        .bind(&new.remote_url)
        .bind(&new.default_branch)
        .fetch_one(&self.pool)
        .await?;

        Ok(repository)
    }

    pub async fn list(
        &self,
        tenant_id: i64,
        project_id: Option<i64>,
        params: PageParams,
    ) -> Result<Page<Repository>> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM repositories
            WHERE tenant_id = $1 AND deleted_at IS NULL
              AND ($2::bigint IS NULL OR project_id = $2)
            "#,
        )
        .bind(tenant_id)
        .bind(project_id)
        .fetch_one(&self.pool)
        .await?;

        let items: Vec<Repository> = sqlx::query_as(&format!(
            r#"
            SELECT {COLUMNS}
            FROM repositories
            WHERE tenant_id = $1 AND deleted_at IS NULL
              AND ($2::bigint IS NULL OR project_id = $2)
            ORDER BY id
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(tenant_id)
        .bind(project_id)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(items, params, total))
    }

    pub async fn fetch(&self, tenant_id: i64, id: i64) -> Result<Repository> {
        let repository: Option<Repository> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM repositories WHERE tenant_id = $1 AND id = $2"
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match repository {
            Some(r) if r.deleted_at.is_some() => {
                Err(AppError::Gone(format!("Repository {} is deleted", id)))
            }
            Some(r) => Ok(r),
            None => Err(AppError::NotFound(format!("Repository {} not found", id))),
        }
    }

    pub async fn update(
        &self,
        tenant_id: i64,
        id: i64,
        update: UpdateRepository,
    ) -> Result<Repository> {
        let current = self.fetch(tenant_id, id).await?;

        let repository: Repository = sqlx::query_as(&format!(
            r#"
            UPDATE repositories
            SET name = $3, remote_url = $4, default_branch = $5, updated_at = NOW()
            WHERE tenant_id = $1 AND id = $2 AND deleted_at IS NULL
            RETURNING {COLUMNS}
            "#
        ))
        .bind(tenant_id)
        .bind(id)
        .bind(update.name.unwrap_or(current.name))
        .bind(update.remote_url.unwrap_or(current.remote_url))
        .bind(update.default_branch.unwrap_or(current.default_branch))
        .fetch_one(&self.pool)
        .await?;

        Ok(repository)
    }

    pub async fn soft_delete(&self, tenant_id: i64, id: i64) -> Result<Repository> {
        let before = self.fetch(tenant_id, id).await?;

        sqlx::query(
            "UPDATE repositories SET deleted_at = NOW(), updated_at = NOW() WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant_id)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(before)
    }
}
