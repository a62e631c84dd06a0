//! Analytics mirrors for Jira issues and GitLab merge requests.
//!
//! Tables:
//! - `jira_issues(id, tenant_id, project_id, issue_key, summary, status,
//!   issue_type, synced_at)`
//! - `gitlab_merge_requests(id, tenant_id, repository_id, iid, title,
//!   state, author_username, web_url, synced_at)`
//!
//! Sync endpoints upsert whatever the upstream returned; rows missing
//! upstream are left in place until the next full sync.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use crate::domain::pagination::{Page, PageParams};
use crate::error::Result;

/// Issue record as fetched from Jira, keyed by `issue_key`.
#[derive(Debug, Clone)]
pub struct JiraIssueRecord {
    pub issue_key: String,
    pub summary: String,
    pub status: String,
    pub issue_type: String,
}

/// Merge request record as fetched from GitLab, keyed by `iid`.
#[derive(Debug, Clone)]
pub struct GitLabMergeRequestRecord {
    pub iid: i64,
    pub title: String,
    pub state: String,
    pub author_username: String,
    pub web_url: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StoredJiraIssue {
    pub id: i64,
    pub tenant_id: i64,
    pub project_id: i64,
    pub issue_key: String,
    pub summary: String,
    pub status: String,
    pub issue_type: String,
    pub synced_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StoredGitLabMergeRequest {
    pub id: i64,
    pub tenant_id: i64,
    pub repository_id: i64,
    pub iid: i64,
    pub title: String,
    pub state: String,
    pub author_username: String,
    pub web_url: String,
    pub synced_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct IntegrationStore {
    pool: PgPool,
}

impl IntegrationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn upsert_jira_issues(
        &self,
        tenant_id: i64,
        project_id: i64,
        issues: &[JiraIssueRecord],
    ) -> Result<usize> {
        let mut tx = self.pool.begin().await?;

        for issue in issues {
            sqlx::query(
                r#"
                INSERT INTO jira_issues (tenant_id, project_id, issue_key, summary, status,
                                         issue_type, synced_at)
                VALUES ($1, $2, $3, $4, $5, $6, NOW())
                ON CONFLICT (tenant_id, project_id, issue_key) DO UPDATE SET
                    summary = EXCLUDED.summary,
                    status = EXCLUDED.status,
                    issue_type = EXCLUDED.issue_type,
                    synced_at = EXCLUDED.synced_at
                "#,
            )
            .bind(tenant_id)
            .bind(project_id)
            .bind(&issue.issue_key)
            .bind(&issue.summary)
            .bind(&issue.status)
            .bind(&issue.issue_type)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::info!(project_id = project_id, issues = issues.len(), "Jira issues synced");
        Ok(issues.len())
    }

    pub async fn list_jira_issues(
        &self,
        tenant_id: i64,
        project_id: Option<i64>,
        params: PageParams,
    ) -> Result<Page<StoredJiraIssue>> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM jira_issues
            WHERE tenant_id = $1 AND ($2::bigint IS NULL OR project_id = $2)
            "#,
        )
        .bind(tenant_id)
        .bind(project_id)
        .fetch_one(&self.pool)
        .await?;

        let items: Vec<StoredJiraIssue> = sqlx::query_as(
            r#"
            SELECT id, tenant_id, project_id, issue_key, summary, status, issue_type, synced_at
            FROM jira_issues
            WHERE tenant_id = $1 AND ($2::bigint IS NULL OR project_id = $2)
            ORDER BY issue_key
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(tenant_id)
        .bind(project_id)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(items, params, total))
    }

    pub async fn upsert_gitlab_merge_requests(
        &self,
        tenant_id: i64,
        repository_id: i64,
        merge_requests: &[GitLabMergeRequestRecord],
    ) -> Result<usize> {
        let mut tx = self.pool.begin().await?;

        for mr in merge_requests {
            sqlx::query(
                r#"
                INSERT INTO gitlab_merge_requests (tenant_id, repository_id, iid, title, state,
                                                   author_username, web_url, synced_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
                ON CONFLICT (tenant_id, repository_id, iid) DO UPDATE SET
                    title = EXCLUDED.title,
                    state = EXCLUDED.state,
                    author_username = EXCLUDED.author_username,
                    web_url = EXCLUDED.web_url,
                    synced_at = EXCLUDED.synced_at
                "#,
            )
            .bind(tenant_id)
            .bind(repository_id)
            .bind(mr.iid)
            .bind(&mr.title)
            .bind(&mr.state)
            .bind(&mr.author_username)
            .bind(&mr.web_url)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::info!(
            repository_id = repository_id,
            merge_requests = merge_requests.len(),
            "GitLab merge requests synced"
        );
        Ok(merge_requests.len())
    }

    pub async fn list_gitlab_merge_requests(
        &self,
        tenant_id: i64,
        repository_id: Option<i64>,
        params: PageParams,
    ) -> Result<Page<StoredGitLabMergeRequest>> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM gitlab_merge_requests
            WHERE tenant_id = $1 AND ($2::bigint IS NULL OR repository_id = $2)
            "#,
        )
        .bind(tenant_id)
        .bind(repository_id)
        .fetch_one(&self.pool)
        .await?;

        let items: Vec<StoredGitLabMergeRequest> = sqlx::query_as(
            r#"
            SELECT id, tenant_id, repository_id, iid, title, state, author_username,
                   web_url, synced_at
            FROM gitlab_merge_requests
            WHERE tenant_id = $1 AND ($2::bigint IS NULL OR repository_id = $2)
            ORDER BY iid DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(tenant_id)
        .bind(repository_id)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(items, params, total))
    }
}
