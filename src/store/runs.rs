//! Test run and test result rows.
//!
//! Tables:
//! - `test_runs(id, tenant_id, plan_id, name, environment, status,
//!   started_by, started_at, finished_at, created_at, updated_at,
//!   deleted_at)`
//! - `test_results(id, tenant_id, run_id, case_id, status, duration_ms,
//!   message, executed_by, executed_at)`
//!
//! Starting a run snapshots the plan's case membership into `untested`
//! result rows; results may only be recorded against that snapshot.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use crate::domain::pagination::{Page, PageParams};
use crate::error::{AppError, Result};

pub const RUN_STATUS_RUNNING: &str = "running";
pub const RUN_STATUS_COMPLETED: &str = "completed";
pub const RUN_STATUS_ABORTED: &str = "aborted";

pub const RESULT_STATUSES: &[&str] = &["passed", "failed", "blocked", "skipped", "untested"];

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TestRun {
    pub id: i64,
    pub tenant_id: i64,
    pub plan_id: i64,
    pub name: String,
    pub environment: Option<String>,
    pub status: String,
    pub started_by: i64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TestResult {
    pub id: i64,
    pub tenant_id: i64,
    pub run_id: i64,
    pub case_id: i64,
    pub status: String,
    pub duration_ms: Option<i64>,
    pub message: Option<String>,
    pub executed_by: Option<i64>,
    pub executed_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct NewRun {
    pub plan_id: i64,
    pub name: String,
    pub environment: Option<String>,
}

#[derive(Debug)]
pub struct RecordResult {
    pub case_id: i64,
    pub status: String,
    pub duration_ms: Option<i64>,
    pub message: Option<String>,
}

const RUN_COLUMNS: &str = "id, tenant_id, plan_id, name, environment, status, started_by, \
                           started_at, finished_at, created_at, updated_at, deleted_at";

const RESULT_COLUMNS: &str =
    "id, tenant_id, run_id, case_id, status, duration_ms, message, executed_by, executed_at";

#[derive(Clone)]
pub struct RunStore {
    pool: PgPool,
}

impl RunStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Start a run from a plan, snapshotting the plan's current case
    /// membership into untested results in the same transaction.
    pub async fn start(&self, tenant_id: i64, actor_id: i64, new: NewRun) -> Result<TestRun> {
        let mut tx = self.pool.begin().await?;

        let plan_exists: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM test_plans
            WHERE tenant_id = $1 AND id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(tenant_id)
        .bind(new.plan_id)
        .fetch_one(&mut *tx)
        .await?;

        if plan_exists == 0 {
            return Err(AppError::invalid_field(
                "plan_id",
                format!("plan {} not found", new.plan_id),
            ));
        }

        let run: TestRun = sqlx::query_as(&format!(
            r#"
            INSERT INTO test_runs (tenant_id, plan_id, name, environment, status, started_by,
                                   started_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, '{RUN_STATUS_RUNNING}', $5, NOW(), NOW(), NOW())
            RETURNING {RUN_COLUMNS}
            "#
        ))
        .bind(tenant_id)
        .bind(new.plan_id)
        .bind(&new.name)
        .bind(&new.environment)
        .bind(actor_id)
        .fetch_one(&mut *tx)
        .await?;

        let snapshotted = sqlx::query(
            r#"
            INSERT INTO test_results (tenant_id, run_id, case_id, status)
            SELECT $1, $2, pc.case_id, 'untested'
            FROM test_plan_cases pc
            JOIN test_cases c ON c.id = pc.case_id AND c.deleted_at IS NULL
            WHERE pc.plan_id = $3
            ORDER BY pc.position
            "#,
        )
        .bind(tenant_id)
        .bind(run.id)
        .bind(new.plan_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;

        tracing::info!(
            run_id = run.id,
            plan_id = new.plan_id,
            cases = snapshotted,
            "Test run started"
        );

        Ok(run)
    }

    pub async fn list(
        &self,
        tenant_id: i64,
        plan_id: Option<i64>,
        params: PageParams,
    ) -> Result<Page<TestRun>> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM test_runs
            WHERE tenant_id = $1 AND deleted_at IS NULL
              AND ($2::bigint IS NULL OR plan_id = $2)
            "#,
        )
        .bind(tenant_id)
        .bind(plan_id)
        .fetch_one(&self.pool)
        .await?;

        let items: Vec<TestRun> = sqlx::query_as(&format!(
            r#"
            SELECT {RUN_COLUMNS}
            FROM test_runs
            WHERE tenant_id = $1 AND deleted_at IS NULL
              AND ($2::bigint IS NULL OR plan_id = $2)
            ORDER BY started_at DESC, id DESC
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(tenant_id)
        .bind(plan_id)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(items, params, total))
    }

    pub async fn fetch(&self, tenant_id: i64, id: i64) -> Result<TestRun> {
        let run: Option<TestRun> = sqlx::query_as(&format!(
            "SELECT {RUN_COLUMNS} FROM test_runs WHERE tenant_id = $1 AND id = $2"
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match run {
            Some(r) if r.deleted_at.is_some() => {
                Err(AppError::Gone(format!("Run {} is deleted", id)))
            }
            Some(r) => Ok(r),
            None => Err(AppError::NotFound(format!("Run {} not found", id))),
        }
    }

    /// Record a result for a case in the run's snapshot. A case outside the
    /// snapshot is a validation error, not an insert.
    pub async fn record_result(
        &self,
        tenant_id: i64,
        actor_id: i64,
        run_id: i64,
        record: RecordResult,
    ) -> Result<TestResult> {
        let run = self.fetch(tenant_id, run_id).await?;
        if run.status != RUN_STATUS_RUNNING {
            return Err(AppError::Conflict(format!(
                "Run {} is {}, results can no longer be recorded",
                run_id, run.status
            )));
        }

        if !RESULT_STATUSES.contains(&record.status.as_str()) {
            return Err(AppError::invalid_field(
                "status",
                format!("unknown result status '{}'", record.status),
            ));
        }

        let updated: Option<TestResult> = sqlx::query_as(&format!(
            r#"
            UPDATE test_results
            SET status = $4, duration_ms = $5, message = $6, executed_by = $7,
                executed_at = NOW()
            WHERE tenant_id = $1 AND run_id = $2 AND case_id = $3
            RETURNING {RESULT_COLUMNS}
            "#
        ))
        .bind(tenant_id)
        .bind(run_id)
        .bind(record.case_id)
        .bind(&record.status)
        .bind(record.duration_ms)
        .bind(&record.message)
        .bind(actor_id)
        .fetch_optional(&self.pool)
        .await?;

        let result = updated.ok_or_else(|| {
            AppError::invalid_field(
                "case_id",
                format!("case {} is not part of run {}", record.case_id, run_id),
            )
        })?;

        sqlx::query("UPDATE test_runs SET updated_at = NOW() WHERE id = $1")
            .bind(run_id)
            .execute(&self.pool)
            .await?;

        Ok(result)
    }

    pub async fn results(&self, tenant_id: i64, run_id: i64) -> Result<Vec<TestResult>> {
        self.fetch(tenant_id, run_id).await?;

        let results: Vec<TestResult> = sqlx::query_as(&format!(
            r#"
            SELECT {RESULT_COLUMNS}
            FROM test_results
            WHERE tenant_id = $1 AND run_id = $2
            ORDER BY case_id
            "#
        ))
        .bind(tenant_id)
        .bind(run_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(results)
    }

    /// Finish a run. Only a running run can be finished; anything else is a
    /// conflict (double-finish included).
    pub async fn finish(
        &self,
        tenant_id: i64,
        run_id: i64,
        aborted: bool,
    ) -> Result<TestRun> {
        let current = self.fetch(tenant_id, run_id).await?;

        let status = if aborted {
            RUN_STATUS_ABORTED
        } else {
            RUN_STATUS_COMPLETED
        };

        let finished: Option<TestRun> = sqlx::query_as(&format!(
            r#"
            UPDATE test_runs
            SET status = $3, finished_at = NOW(), updated_at = NOW()
            WHERE tenant_id = $1 AND id = $2 AND status = '{RUN_STATUS_RUNNING}'
            RETURNING {RUN_COLUMNS}
            "#
        ))
        .bind(tenant_id)
        .bind(run_id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await?;

        finished.ok_or_else(|| {
            AppError::Conflict(format!("Run {} is already {}", run_id, current.status))
        })
    }
}
