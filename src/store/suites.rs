//! Test suite rows (a tree per project via `parent_id`).
//!
//! Table:
//! - `test_suites(id, tenant_id, project_id, parent_id, name, position,
//!   created_at, updated_at, deleted_at)`

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use crate::domain::pagination::{Page, PageParams};
use crate::error::{AppError, Result};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TestSuite {
    pub id: i64,
    pub tenant_id: i64,
    pub project_id: i64,
    pub parent_id: Option<i64>,
    pub name: String,
    pub position: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct NewSuite {
    pub project_id: i64,
    pub parent_id: Option<i64>,
    pub name: String,
    pub position: i32,
}

#[derive(Debug, Default)]
pub struct UpdateSuite {
    pub name: Option<String>,
    pub parent_id: Option<Option<i64>>,
    pub position: Option<i32>,
}

const COLUMNS: &str = "id, tenant_id, project_id, parent_id, name, position, \
                       created_at, updated_at, deleted_at";

#[derive(Clone)]
pub struct SuiteStore {
    pool: PgPool,
}

impl SuiteStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, tenant_id: i64, new: NewSuite) -> Result<TestSuite> {
        // A parent must be a live suite of the same project.
        if let Some(parent_id) = new.parent_id {
            let parent = self.fetch(tenant_id, parent_id).await?;
            if parent.project_id != new.project_id {
                return Err(AppError::invalid_field(
                    "parent_id",
                    "parent suite belongs to a different project",
                ));
            }
        }

        let suite: TestSuite = sqlx::query_as(&format!(
            r#"
            INSERT INTO test_suites (tenant_id, project_id, parent_id, name, position,
                                     created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, NOW(), NOW())
            RETURNING {COLUMNS}
            "#
        ))
        .bind(tenant_id)
        .bind(new.project_id)
        .bind(new.parent_id)
        .bind(&new.name)
        .bind(new.position)
        .fetch_one(&self.pool)
        .await?;

        Ok(suite)
    }

    pub async fn list(
        &self,
        tenant_id: i64,
        project_id: Option<i64>,
        params: PageParams,
    ) -> Result<Page<TestSuite>> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM test_suites
            WHERE tenant_id = $1 AND deleted_at IS NULL
              AND ($2::bigint IS NULL OR project_id = $2)
            "#,
        )
        .bind(tenant_id)
        .bind(project_id)
        .fetch_one(&self.pool)
        .await?;

        let items: Vec<TestSuite> = sqlx::query_as(&format!(
            r#"
            SELECT {COLUMNS}
            FROM test_suites
            WHERE tenant_id = $1 AND deleted_at IS NULL
              AND ($2::bigint IS NULL OR project_id = $2)
            ORDER BY parent_id NULLS FIRST, position, id
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

    pub async fn fetch(&self, tenant_id: i64, id: i64) -> Result<TestSuite> {
        let suite: Option<TestSuite> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM test_suites WHERE tenant_id = $1 AND id = $2"
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match suite {
            Some(s) if s.deleted_at.is_some() => {
                Err(AppError::Gone(format!("Suite {} is deleted", id)))
            }
            Some(s) => Ok(s),
            None => Err(AppError::NotFound(format!("Suite {} not found", id))),
        }
    }

    pub async fn update(&self, tenant_id: i64, id: i64, update: UpdateSuite) -> Result<TestSuite> {
        let current = self.fetch(tenant_id, id).await?;

        let parent_id = match update.parent_id {
            Some(new_parent) => {
                if new_parent == Some(id) {
                    return Err(AppError::invalid_field(
                        "parent_id",
                        "suite cannot be its own parent",
                    ));
                }
                if let Some(pid) = new_parent {
                    let parent = self.fetch(tenant_id, pid).await?;
                    if parent.project_id != current.project_id {
                        return Err(AppError::invalid_field(
                            "parent_id",
                            "parent suite belongs to a different project",
                        ));
                    }
                }
                new_parent
            }
            None => current.parent_id,
        };

        let suite: TestSuite = sqlx::query_as(&format!(
            r#"
            UPDATE test_suites
            SET name = $3, parent_id = $4, position = $5, updated_at = NOW()
            WHERE tenant_id = $1 AND id = $2 AND deleted_at IS NULL
            RETURNING {COLUMNS}
            "#
        ))
        .bind(tenant_id)
        .bind(id)
        .bind(update.name.unwrap_or(current.name))
        .bind(parent_id)
        .bind(update.position.unwrap_or(current.position))
        .fetch_one(&self.pool)
        .await?;

        Ok(suite)
    }

    /// Soft delete a suite. Refused while live child suites or cases exist.
    pub async fn soft_delete(&self, tenant_id: i64, id: i64) -> Result<TestSuite> {
        let before = self.fetch(tenant_id, id).await?;

        let child_suites: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM test_suites
            WHERE tenant_id = $1 AND parent_id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(tenant_id)
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        let child_cases: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM test_cases
            WHERE tenant_id = $1 AND suite_id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(tenant_id)
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        if child_suites > 0 || child_cases > 0 {
            return Err(AppError::Conflict(format!(
                "Suite {} still contains {} suites and {} cases",
                id, child_suites, child_cases
            )));
        }

        sqlx::query(
            "UPDATE test_suites SET deleted_at = NOW(), updated_at = NOW() WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant_id)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(before)
    }
}
