//! Bug rows and per-project bug budgets.
//!
//! Tables:
//! - `bugs(id, tenant_id, project_id, run_id, case_id, title, description,
//!   severity, status, assignee_id, version, created_by, updated_by,
//!   created_at, updated_at, deleted_at)`
//! - `bug_budgets(project_id, tenant_id, period, max_open_bugs, updated_by,
//!   updated_at)`

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use crate::domain::pagination::{Page, PageParams};
use crate::error::{AppError, Result};

pub const BUG_SEVERITIES: &[&str] = &["critical", "major", "minor", "trivial"];
pub const BUG_STATUSES: &[&str] = &["open", "in_progress", "resolved", "closed"];

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Bug {
    pub id: i64,
    pub tenant_id: i64,
    pub project_id: i64,
    pub run_id: Option<i64>,
    pub case_id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub severity: String,
    pub status: String,
    pub assignee_id: Option<i64>,
    pub version: i32,
    pub created_by: i64,
    pub updated_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct NewBug {
    pub project_id: i64,
    pub run_id: Option<i64>,
    pub case_id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub severity: String,
    pub assignee_id: Option<i64>,
}

#[derive(Debug)]
pub struct UpdateBug {
    pub version: i32,
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub severity: Option<String>,
    pub status: Option<String>,
    pub assignee_id: Option<Option<i64>>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct BugBudget {
    pub project_id: i64,
    pub tenant_id: i64,
    pub period: String,
    pub max_open_bugs: i32,
    pub updated_by: i64,
    pub updated_at: DateTime<Utc>,
}

/// Budget report for the current period.
#[derive(Debug, Clone, Serialize)]
pub struct BugBudgetStatus {
    pub project_id: i64,
    pub period: String,
    pub max_open_bugs: Option<i32>,
    pub open_bugs: i64,
    pub over_budget: bool,
}

/// Budget period key for a timestamp ("YYYY-MM").
pub fn budget_period(at: DateTime<Utc>) -> String {
    at.format("%Y-%m").to_string()
}

const COLUMNS: &str = "id, tenant_id, project_id, run_id, case_id, title, description, \
                       severity, status, assignee_id, version, created_by, updated_by, \
                       created_at, updated_at, deleted_at";

#[derive(Clone)]
pub struct BugStore {
    pool: PgPool,
}

impl BugStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, tenant_id: i64, actor_id: i64, new: NewBug) -> Result<Bug> {
        let bug: Bug = sqlx::query_as(&format!(
            r#"
            INSERT INTO bugs (tenant_id, project_id, run_id, case_id, title, description,
                              severity, status, assignee_id, version, created_by, updated_by,
                              created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'open', $8, 1, $9, $9, NOW(), NOW())
            RETURNING {COLUMNS}
            "#
        ))
        .bind(tenant_id)
        .bind(new.project_id)
        .bind(new.run_id)
        .bind(new.case_id)
        .bind(&new.title)
        .bind(&new.description)
        .bind(&new.severity)
        .bind(new.assignee_id)
        .bind(actor_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(bug)
    }

    pub async fn list(
        &self,
        tenant_id: i64,
        project_id: Option<i64>,
        status: Option<&str>,
        params: PageParams,
    ) -> Result<Page<Bug>> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM bugs
            WHERE tenant_id = $1 AND deleted_at IS NULL
              AND ($2::bigint IS NULL OR project_id = $2)
              AND ($3::text IS NULL OR status = $3)
            "#,
        )
        .bind(tenant_id)
        .bind(project_id)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;

        let items: Vec<Bug> = sqlx::query_as(&format!(
            r#"
            SELECT {COLUMNS}
            FROM bugs
            WHERE tenant_id = $1 AND deleted_at IS NULL
              AND ($2::bigint IS NULL OR project_id = $2)
              AND ($3::text IS NULL OR status = $3)
            ORDER BY id DESC
            LIMIT $4 OFFSET $5
            "#
        ))
        .bind(tenant_id)
        .bind(project_id)
        .bind(status)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(items, params, total))
    }

    pub async fn fetch(&self, tenant_id: i64, id: i64) -> Result<Bug> {
        let bug: Option<Bug> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM bugs WHERE tenant_id = $1 AND id = $2"
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match bug {
            Some(b) if b.deleted_at.is_some() => {
                Err(AppError::Gone(format!("Bug {} is deleted", id)))
            }
            Some(b) => Ok(b),
            None => Err(AppError::NotFound(format!("Bug {} not found", id))),
        }
    }

    /// Optimistically-locked update; returns (before, after).
    pub async fn update(
        &self,
        tenant_id: i64,
        actor_id: i64,
        id: i64,
        update: UpdateBug,
    ) -> Result<(Bug, Bug)> {
        let current = self.fetch(tenant_id, id).await?;

        let description = match update.description {
            Some(d) => d,
            None => current.description.clone(),
        };
        let assignee_id = match update.assignee_id {
            Some(a) => a,
            None => current.assignee_id,
        };

        let updated: Option<Bug> = sqlx::query_as(&format!(
            r#"
            UPDATE bugs
            SET title = $4, description = $5, severity = $6, status = $7, assignee_id = $8,
                version = version + 1, updated_by = $9, updated_at = NOW()
            WHERE tenant_id = $1 AND id = $2 AND deleted_at IS NULL AND version = $3
            RETURNING {COLUMNS}
            "#
        ))
        .bind(tenant_id)
        .bind(id)
        .bind(update.version)
        .bind(update.title.unwrap_or_else(|| current.title.clone()))
        .bind(description)
        .bind(update.severity.unwrap_or_else(|| current.severity.clone()))
        .bind(update.status.unwrap_or_else(|| current.status.clone()))
        .bind(assignee_id)
        .bind(actor_id)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(after) => Ok((current, after)),
            None => Err(AppError::Conflict(format!(
                "Bug {} was modified concurrently (current version {})",
                id, current.version
            ))),
        }
    }

    pub async fn soft_delete(&self, tenant_id: i64, actor_id: i64, id: i64) -> Result<Bug> {
        let before = self.fetch(tenant_id, id).await?;

        sqlx::query(
            r#"
            UPDATE bugs
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

    // ========================================================================
    // Bug budgets
    // ========================================================================

    pub async fn set_budget(
        &self,
        tenant_id: i64,
        actor_id: i64,
        project_id: i64,
        period: &str,
        max_open_bugs: i32,
    ) -> Result<BugBudget> {
        let budget: BugBudget = sqlx::query_as(
            r#"
            INSERT INTO bug_budgets (project_id, tenant_id, period, max_open_bugs, updated_by, updated_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            ON CONFLICT (project_id, period) DO UPDATE SET
                max_open_bugs = EXCLUDED.max_open_bugs,
                updated_by = EXCLUDED.updated_by,
                updated_at = EXCLUDED.updated_at
            RETURNING project_id, tenant_id, period, max_open_bugs, updated_by, updated_at
            "#,
        )
        .bind(project_id)
        .bind(tenant_id)
        .bind(period)
        .bind(max_open_bugs)
        .bind(actor_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(budget)
    }

    /// Open-bug count against the project's budget for the given period.
    pub async fn budget_status(
        &self,
        tenant_id: i64,
        project_id: i64,
        period: &str,
    ) -> Result<BugBudgetStatus> {
        let max_open_bugs: Option<i32> = sqlx::query_scalar(
            r#"
            SELECT max_open_bugs FROM bug_budgets
            WHERE tenant_id = $1 AND project_id = $2 AND period = $3
            "#,
        )
        .bind(tenant_id)
        .bind(project_id)
        .bind(period)
        .fetch_optional(&self.pool)
        .await?;

        let open_bugs: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM bugs
            WHERE tenant_id = $1 AND project_id = $2 AND deleted_at IS NULL
              AND status IN ('open', 'in_progress')
            "#,
        )
        .bind(tenant_id)
        .bind(project_id)
        .fetch_one(&self.pool)
        .await?;

        let over_budget = max_open_bugs.is_some_and(|max| open_bugs > max as i64);

        Ok(BugBudgetStatus {
            project_id,
            period: period.to_string(),
            max_open_bugs,
            open_bugs,
            over_budget,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_budget_period_format() {
        let at = Utc.with_ymd_and_hms(2026, 8, 7, 12, 0, 0).unwrap();
        assert_eq!(budget_period(at), "2026-08");
    }

    #[test]
    fn test_known_severities_and_statuses() {
        assert!(BUG_SEVERITIES.contains(&"critical"));
        assert!(BUG_STATUSES.contains(&"in_progress"));
        assert!(!BUG_STATUSES.contains(&"wontfix"));
    }
}
