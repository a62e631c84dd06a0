//! Test case rows.
//!
//! Table:
//! - `test_cases(id, tenant_id, suite_id, title, description, priority,
//!   steps, expected_result, version, created_by, updated_by, created_at,
//!   updated_at, deleted_at)`
//!
//! Updates are guarded by optimistic locking: the client supplies the
//! `version` it last read, and a mismatch yields a conflict.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgPool, Postgres, Transaction};

use crate::domain::pagination::{Page, PageParams};
use crate::error::{AppError, Result};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TestCase {
    pub id: i64,
    pub tenant_id: i64,
    pub suite_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub priority: String,
    pub steps: serde_json::Value,
    pub expected_result: Option<String>,
    pub version: i32,
    pub created_by: i64,
    pub updated_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct NewCase {
    pub suite_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub priority: String,
    pub steps: serde_json::Value,
    pub expected_result: Option<String>,
}

#[derive(Debug)]
pub struct UpdateCase {
    pub version: i32,
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub priority: Option<String>,
    pub steps: Option<serde_json::Value>,
    pub expected_result: Option<Option<String>>,
}

const COLUMNS: &str = "id, tenant_id, suite_id, title, description, priority, steps, \
                       expected_result, version, created_by, updated_by, created_at, \
                       updated_at, deleted_at";

#[derive(Clone)]
pub struct CaseStore {
    pool: PgPool,
}

impl CaseStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, tenant_id: i64, actor_id: i64, new: NewCase) -> Result<TestCase> {
        let mut tx = self.pool.begin().await?;
        let case = self.insert_in_tx(&mut tx, tenant_id, actor_id, &new).await?;
        tx.commit().await?;
        Ok(case)
    }

    /// Bulk create. All-or-nothing: one bad row rolls back the batch.
    pub async fn create_batch(
        &self,
        tenant_id: i64,
        actor_id: i64,
        batch: Vec<NewCase>,
    ) -> Result<Vec<TestCase>> {
        let mut tx = self.pool.begin().await?;
        let mut created = Vec::with_capacity(batch.len());

        for new in &batch {
            created.push(self.insert_in_tx(&mut tx, tenant_id, actor_id, new).await?);
        }

        tx.commit().await?;
        Ok(created)
    }

    async fn insert_in_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        tenant_id: i64,
        actor_id: i64,
        new: &NewCase,
    ) -> Result<TestCase> {
        let suite_exists: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM test_suites
            WHERE tenant_id = $1 AND id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(tenant_id)
        .bind(new.suite_id)
        .fetch_one(&mut **tx)
        .await?;

        if suite_exists == 0 {
            return Err(AppError::invalid_field(
                "suite_id",
                format!("suite {} not found", new.suite_id),
            ));
        }

        let case: TestCase = sqlx::query_as(&format!(
            r#"
            INSERT INTO test_cases (tenant_id, suite_id, title, description, priority, steps,
                                    expected_result, version, created_by, updated_by,
                                    created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 1, $8, $8, NOW(), NOW())
            RETURNING {COLUMNS}
            "#
        ))
        .bind(tenant_id)
        .bind(new.suite_id)
        .bind(&new.title)
        .bind(&new.description)
        .bind(&new.priority)
        .bind(&new.steps)
        .bind(&new.expected_result)
        .bind(actor_id)
        .fetch_one(&mut **tx)
        .await?;

        Ok(case)
    }

    pub async fn list(
        &self,
        tenant_id: i64,
        suite_id: Option<i64>,
        params: PageParams,
    ) -> Result<Page<TestCase>> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM test_cases
            WHERE tenant_id = $1 AND deleted_at IS NULL
              AND ($2::bigint IS NULL OR suite_id = $2)
            "#,
        )
        .bind(tenant_id)
        .bind(suite_id)
        .fetch_one(&self.pool)
        .await?;

        let items: Vec<TestCase> = sqlx::query_as(&format!(
            r#"
            SELECT {COLUMNS}
            FROM test_cases
            WHERE tenant_id = $1 AND deleted_at IS NULL
              AND ($2::bigint IS NULL OR suite_id = $2)
            ORDER BY id
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(tenant_id)
        .bind(suite_id)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(items, params, total))
    }

    pub async fn fetch(&self, tenant_id: i64, id: i64) -> Result<TestCase> {
        let case: Option<TestCase> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM test_cases WHERE tenant_id = $1 AND id = $2"
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match case {
            Some(c) if c.deleted_at.is_some() => {
                Err(AppError::Gone(format!("Case {} is deleted", id)))
            }
            Some(c) => Ok(c),
            None => Err(AppError::NotFound(format!("Case {} not found", id))),
        }
    }

    /// Optimistically-locked update. Returns the (before, after) pair for
    /// change capture. A stale client version yields a 409 carrying the
    /// current version.
    pub async fn update(
        &self,
        tenant_id: i64,
        actor_id: i64,
        id: i64,
        update: UpdateCase,
    ) -> Result<(TestCase, TestCase)> {
        let current = self.fetch(tenant_id, id).await?;

        let description = match update.description {
            Some(d) => d,
            None => current.description.clone(),
        };
        let expected_result = match update.expected_result {
            Some(e) => e,
            None => current.expected_result.clone(),
        };

        let updated: Option<TestCase> = sqlx::query_as(&format!(
            r#"
            UPDATE test_cases
            SET title = $4, description = $5, priority = $6, steps = $7,
                expected_result = $8, version = version + 1, updated_by = $9,
                updated_at = NOW()
            WHERE tenant_id = $1 AND id = $2 AND deleted_at IS NULL AND version = $3
            RETURNING {COLUMNS}
            "#
        ))
        .bind(tenant_id)
        .bind(id)
        .bind(update.version)
        .bind(update.title.unwrap_or_else(|| current.title.clone()))
        .bind(description)
        .bind(update.priority.unwrap_or_else(|| current.priority.clone()))
        .bind(update.steps.unwrap_or_else(|| current.steps.clone()))
        .bind(expected_result)
        .bind(actor_id)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(after) => Ok((current, after)),
            None => Err(AppError::Conflict(format!(
                "Case {} was modified concurrently (current version {})",
                id, current.version
            ))),
        }
    }

    pub async fn soft_delete(&self, tenant_id: i64, actor_id: i64, id: i64) -> Result<TestCase> {
        let before = self.fetch(tenant_id, id).await?;

        sqlx::query(
            r#"
            UPDATE test_cases
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
