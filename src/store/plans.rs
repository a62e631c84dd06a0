//! Test plan rows and plan membership.
//!
//! Tables:
//! - `test_plans(id, tenant_id, project_id, name, description, status,
//!   version, created_by, updated_by, created_at, updated_at, deleted_at)`
//! - `test_plan_cases(plan_id, case_id, position)`

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use crate::domain::pagination::{Page, PageParams};
use crate::error::{AppError, Result};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TestPlan {
    pub id: i64,
    pub tenant_id: i64,
    pub project_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub status: String,
    pub version: i32,
    pub created_by: i64,
    pub updated_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct NewPlan {
    pub project_id: i64,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug)]
pub struct UpdatePlan {
    pub version: i32,
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub status: Option<String>,
}

const COLUMNS: &str = "id, tenant_id, project_id, name, description, status, version, \
                       created_by, updated_by, created_at, updated_at, deleted_at";

#[derive(Clone)]
pub struct PlanStore {
    pool: PgPool,
}

impl PlanStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, tenant_id: i64, actor_id: i64, new: NewPlan) -> Result<TestPlan> {
        let plan: TestPlan = sqlx::query_as(&format!(
            r#"
            INSERT INTO test_plans (tenant_id, project_id, name, description, status, version,
                                    created_by, updated_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, 'draft', 1, $5, $5, NOW(), NOW())
            RETURNING {COLUMNS}
            "#
        ))
        .bind(tenant_id)
        .bind(new.project_id)
        .bind(&new.name)
        .bind(&new.description)
        .bind(actor_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(plan)
    }

    pub async fn list(
        &self,
        tenant_id: i64,
        project_id: Option<i64>,
        params: PageParams,
    ) -> Result<Page<TestPlan>> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM test_plans
            WHERE tenant_id = $1 AND deleted_at IS NULL
              AND ($2::bigint IS NULL OR project_id = $2)
            "#,
        )
        .bind(tenant_id)
        .bind(project_id)
        .fetch_one(&self.pool)
        .await?;

        let items: Vec<TestPlan> = sqlx::query_as(&format!(
            r#"
            SELECT {COLUMNS}
            FROM test_plans
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

    pub async fn fetch(&self, tenant_id: i64, id: i64) -> Result<TestPlan> {
        let plan: Option<TestPlan> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM test_plans WHERE tenant_id = $1 AND id = $2"
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match plan {
            Some(p) if p.deleted_at.is_some() => {
                Err(AppError::Gone(format!("Plan {} is deleted", id)))
            }
            Some(p) => Ok(p),
            None => Err(AppError::NotFound(format!("Plan {} not found", id))),
        }
    }

    /// Optimistically-locked update; returns (before, after).
    pub async fn update(
        &self,
        tenant_id: i64,
        actor_id: i64,
        id: i64,
        update: UpdatePlan,
    ) -> Result<(TestPlan, TestPlan)> {
        let current = self.fetch(tenant_id, id).await?;

        let description = match update.description {
            Some(d) => d,
            None => current.description.clone(),
        };

        let updated: Option<TestPlan> = sqlx::query_as(&format!(
            r#"
            UPDATE test_plans
            SET name = $4, description = $5, status = $6, version = version + 1,
                updated_by = $7, updated_at = NOW()
            WHERE tenant_id = $1 AND id = $2 AND deleted_at IS NULL AND version = $3
            RETURNING {COLUMNS}
            "#
        ))
        .bind(tenant_id)
        .bind(id)
        .bind(update.version)
        .bind(update.name.unwrap_or_else(|| current.name.clone()))
        .bind(description)
        .bind(update.status.unwrap_or_else(|| current.status.clone()))
        .bind(actor_id)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(after) => Ok((current, after)),
            None => Err(AppError::Conflict(format!(
                "Plan {} was modified concurrently (current version {})",
                id, current.version
            ))),
        }
    }

    pub async fn soft_delete(&self, tenant_id: i64, actor_id: i64, id: i64) -> Result<TestPlan> {
        let before = self.fetch(tenant_id, id).await?;

        sqlx::query(
            r#"
            UPDATE test_plans
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

    /// Replace the plan's case membership. Every case must be a live case
    /// of the plan's tenant; duplicates in the input are rejected.
    pub async fn set_cases(&self, tenant_id: i64, plan_id: i64, case_ids: &[i64]) -> Result<()> {
        self.fetch(tenant_id, plan_id).await?;

        let mut deduped = case_ids.to_vec();
        deduped.sort_unstable();
        deduped.dedup();
        if deduped.len() != case_ids.len() {
            return Err(AppError::invalid_field(
                "case_ids",
                "case list contains duplicates",
            ));
        }

        let known: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM test_cases
            WHERE tenant_id = $1 AND deleted_at IS NULL AND id = ANY($2)
            "#,
        )
        .bind(tenant_id)
        .bind(case_ids)
        .fetch_one(&self.pool)
        .await?;

        if known as usize != case_ids.len() {
            return Err(AppError::invalid_field(
                "case_ids",
                "one or more cases do not exist",
            ));
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM test_plan_cases WHERE plan_id = $1")
            .bind(plan_id)
            .execute(&mut *tx)
            .await?;

        for (position, case_id) in case_ids.iter().enumerate() {
            sqlx::query(
                "INSERT INTO test_plan_cases (plan_id, case_id, position) VALUES ($1, $2, $3)",
            )
            .bind(plan_id)
            .bind(case_id)
            .bind(position as i32)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::debug!(plan_id = plan_id, cases = case_ids.len(), "Plan membership replaced");
        Ok(())
    }

    pub async fn case_ids(&self, tenant_id: i64, plan_id: i64) -> Result<Vec<i64>> {
        self.fetch(tenant_id, plan_id).await?;

        let ids: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT case_id FROM test_plan_cases
            WHERE plan_id = $1
            ORDER BY position
            "#,
        )
        .bind(plan_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}
