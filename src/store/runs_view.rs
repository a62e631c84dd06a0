//! Denormalized test-runs read model.
//!
//! Table:
//! - `test_runs_view(run_id, tenant_id, project_id, run_name, plan_name,
//!   status, total, passed, failed, blocked, skipped, untested, pass_rate,
//!   last_result_at, refreshed_at)`
//!
//! Maintained by the runs-view listener: every refresh is a full aggregate
//! re-query for one run, upserted under the run's primary key.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use crate::domain::pagination::{Page, PageParams};
use crate::error::Result;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct RunsViewRow {
    pub run_id: i64,
    pub tenant_id: i64,
    pub project_id: i64,
    pub run_name: String,
    pub plan_name: String,
    pub status: String,
    pub total: i64,
    pub passed: i64,
    pub failed: i64,
    pub blocked: i64,
    pub skipped: i64,
    pub untested: i64,
    pub pass_rate: f64,
    pub last_result_at: Option<DateTime<Utc>>,
    pub refreshed_at: DateTime<Utc>,
}

const COLUMNS: &str = "run_id, tenant_id, project_id, run_name, plan_name, status, total, \
                       passed, failed, blocked, skipped, untested, pass_rate, last_result_at, \
                       refreshed_at";

#[derive(Clone)]
pub struct RunsViewStore {
    pool: PgPool,
}

impl RunsViewStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Re-aggregate one run's results and upsert its view row.
    pub async fn refresh(&self, tenant_id: i64, run_id: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO test_runs_view (
                run_id, tenant_id, project_id, run_name, plan_name, status,
                total, passed, failed, blocked, skipped, untested, pass_rate,
                last_result_at, refreshed_at
            )
            SELECT
                r.id, r.tenant_id, p.project_id, r.name, p.name, r.status,
                COUNT(res.id),
                COUNT(*) FILTER (WHERE res.status = 'passed'),
                COUNT(*) FILTER (WHERE res.status = 'failed'),
                COUNT(*) FILTER (WHERE res.status = 'blocked'),
                COUNT(*) FILTER (WHERE res.status = 'skipped'),
                COUNT(*) FILTER (WHERE res.status = 'untested'),
                CASE WHEN COUNT(res.id) = 0 THEN 0
                     ELSE COUNT(*) FILTER (WHERE res.status = 'passed')::float8 / COUNT(res.id)
                END,
                MAX(res.executed_at),
                NOW()
            FROM test_runs r
            JOIN test_plans p ON p.id = r.plan_id
            LEFT JOIN test_results res ON res.run_id = r.id
            WHERE r.tenant_id = $1 AND r.id = $2 AND r.deleted_at IS NULL
            GROUP BY r.id, r.tenant_id, p.project_id, r.name, p.name, r.status
            ON CONFLICT (run_id) DO UPDATE SET
                status = EXCLUDED.status,
                total = EXCLUDED.total,
                passed = EXCLUDED.passed,
                failed = EXCLUDED.failed,
                blocked = EXCLUDED.blocked,
                skipped = EXCLUDED.skipped,
                untested = EXCLUDED.untested,
                pass_rate = EXCLUDED.pass_rate,
                last_result_at = EXCLUDED.last_result_at,
                refreshed_at = EXCLUDED.refreshed_at
            "#,
        )
        .bind(tenant_id)
        .bind(run_id)
        .execute(&self.pool)
        .await?;

        tracing::debug!(run_id = run_id, "Runs view refreshed");
        Ok(())
    }

    pub async fn list(
        &self,
        tenant_id: i64,
        project_id: Option<i64>,
        params: PageParams,
    ) -> Result<Page<RunsViewRow>> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM test_runs_view
            WHERE tenant_id = $1 AND ($2::bigint IS NULL OR project_id = $2)
            "#,
        )
        .bind(tenant_id)
        .bind(project_id)
        .fetch_one(&self.pool)
        .await?;

        let items: Vec<RunsViewRow> = sqlx::query_as(&format!(
            r#"
            SELECT {COLUMNS}
            FROM test_runs_view
            WHERE tenant_id = $1 AND ($2::bigint IS NULL OR project_id = $2)
            ORDER BY run_id DESC
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

    /// Rows exported to the Google Sheets integration.
    pub async fn export_rows(
        &self,
        tenant_id: i64,
        project_id: Option<i64>,
        limit: i64,
    ) -> Result<Vec<RunsViewRow>> {
        let items: Vec<RunsViewRow> = sqlx::query_as(&format!(
            r#"
            SELECT {COLUMNS}
            FROM test_runs_view
            WHERE tenant_id = $1 AND ($2::bigint IS NULL OR project_id = $2)
            ORDER BY run_id DESC
            LIMIT $3
            "#
        ))
        .bind(tenant_id)
        .bind(project_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }
}
