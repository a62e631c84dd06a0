//! Project rows.
//!
//! Table:
//! - `projects(id, tenant_id, key, name, description, created_by,
//!   updated_by, created_at, updated_at, deleted_at)`

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use crate::domain::pagination::{Page, PageParams};
use crate::error::{AppError, Result};

use super::conflict_on_unique;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Project {
    pub id: i64,
    pub tenant_id: i64,
    pub key: String,
    pub name: String,
    pub description: Option<String>,
    pub created_by: i64,
    pub updated_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct NewProject {
    pub key: String,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Default)]
pub struct UpdateProject {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
}

const COLUMNS: &str = "id, tenant_id, key, name, description, created_by, updated_by, \
                       created_at, updated_at, deleted_at";

#[derive(Clone)]
pub struct ProjectStore {
    pool: PgPool,
}

impl ProjectStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, tenant_id: i64, actor_id: i64, new: NewProject) -> Result<Project> {
        sqlx::query_as(&format!(
            r#"
            INSERT INTO projects (tenant_id, key, name, description, created_by, updated_by,
                                  created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5, NOW(), NOW())
            RETURNING {COLUMNS}
            "#
        ))
        .bind(tenant_id)
        .bind(&new.key)
        .bind(&new.name)
        .bind(&new.description)
        .bind(actor_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, &format!("Project key '{}' already exists", new.key)))
    }

    pub async fn list(&self, tenant_id: i64, params: PageParams) -> Result<Page<Project>> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM projects WHERE tenant_id = $1 AND deleted_at IS NULL",
        )
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await?;

        let items: Vec<Project> = sqlx::query_as(&format!(
            r#"
            SELECT {COLUMNS}
            FROM projects
            WHERE tenant_id = $1 AND deleted_at IS NULL
            ORDER BY id
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(tenant_id)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(items, params, total))
    }

    pub async fn fetch(&self, tenant_id: i64, id: i64) -> Result<Project> {
        let project: Option<Project> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM projects WHERE tenant_id = $1 AND id = $2"
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match project {
            Some(p) if p.deleted_at.is_some() => {
                Err(AppError::Gone(format!("Project {} is deleted", id)))
            }
            Some(p) => Ok(p),
            None => Err(AppError::NotFound(format!("Project {} not found", id))),
        }
    }

    pub async fn update(
        &self,
        tenant_id: i64,
        actor_id: i64,
        id: i64,
        update: UpdateProject,
    ) -> Result<Project> {
        let current = self.fetch(tenant_id, id).await?;

        let description = match update.description {
            Some(d) => d,
            None => current.description,
        };

        let project: Project = sqlx::query_as(&format!(
            r#"
            UPDATE projects
            SET name = $3, description = $4, updated_by = $5, updated_at = NOW()
            WHERE tenant_id = $1 AND id = $2 AND deleted_at IS NULL
            RETURNING {COLUMNS}
            "#
        ))
        .bind(tenant_id)
        .bind(id)
        .bind(update.name.unwrap_or(current.name))
        .bind(description)
        .bind(actor_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(project)
    }

    pub async fn soft_delete(&self, tenant_id: i64, actor_id: i64, id: i64) -> Result<Project> {
        let before = self.fetch(tenant_id, id).await?;

        sqlx::query(
            r#"
            UPDATE projects
            SET deleted_at = NOW(), updated_by = $3, updated_at = NOW()
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(id)
        .bind(actor_id)
        .execute(&self.pool)
        .await?;

        Ok(before)
    }
}
