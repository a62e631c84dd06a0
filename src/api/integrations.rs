//! Integration endpoints: Jira and GitLab mirror syncs, Google Sheets
//! export. Syncs run inline; there is no background scheduler.

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::AuthContext;
use crate::domain::changelog::Change;
use crate::domain::ids;
use crate::domain::pagination::{Page, PageParams};
use crate::error::{AppError, Result};
use crate::integrations::ExportOutcome;
use crate::metrics::IntegrationMetrics;
use crate::server::AppState;
use crate::store::{StoredGitLabMergeRequest, StoredJiraIssue};

use super::extract::require_write;

const DEFAULT_SYNC_LIMIT: u32 = 100;
const DEFAULT_EXPORT_LIMIT: i64 = 200;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/integrations/jira/sync", post(sync_jira))
        .route("/integrations/jira/issues", get(list_jira_issues))
        .route("/integrations/gitlab/sync", post(sync_gitlab))
        .route(
            "/integrations/gitlab/merge-requests",
            get(list_gitlab_merge_requests),
        )
        .route("/integrations/sheets/export", post(export_sheets))
}

// ============================================================================
// Jira
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct JiraSyncRequest {
    #[serde(with = "ids")]
    pub project_id: i64,
    /// Defaults to all issues of the project's Jira key.
    pub jql: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub synced: usize,
    pub synced_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct JiraIssueResponse {
    #[serde(with = "ids")]
    pub id: i64,
    #[serde(with = "ids")]
    pub project_id: i64,
    pub issue_key: String,
    pub summary: String,
    pub status: String,
    pub issue_type: String,
    pub synced_at: DateTime<Utc>,
}

impl From<StoredJiraIssue> for JiraIssueResponse {
    fn from(issue: StoredJiraIssue) -> Self {
        Self {
            id: issue.id,
            project_id: issue.project_id,
            issue_key: issue.issue_key,
            summary: issue.summary,
            status: issue.status,
            issue_type: issue.issue_type,
            synced_at: issue.synced_at,
        }
    }
}

#[tracing::instrument(name = "http.sync_jira", skip(state, ctx, request), fields(project_id = request.project_id))]
pub async fn sync_jira(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(request): Json<JiraSyncRequest>,
) -> Result<Json<SyncResponse>> {
    require_write(&ctx)?;

    let project = state.projects.fetch(ctx.tenant_id, request.project_id).await?;

    let jql = request
        .jql
        .unwrap_or_else(|| format!("project = {}", project.key));

    let issues = match state.jira.search_issues(&jql, DEFAULT_SYNC_LIMIT).await {
        Ok(issues) => {
            IntegrationMetrics::record_success("jira");
            issues
        }
        Err(e) => {
            IntegrationMetrics::record_failure("jira");
            return Err(e);
        }
    };

    let synced = state
        .mirrors
        .upsert_jira_issues(ctx.tenant_id, project.id, &issues)
        .await?;

    state
        .change_logger
        .record(
            ctx.tenant_id,
            ctx.user_id,
            Change::updated(
                "project",
                project.id,
                &serde_json::json!({}),
                &serde_json::json!({ "jira_issues_synced": synced }),
            )
            .action("integration.jira_synced"),
        )
        .await;

    Ok(Json(SyncResponse {
        synced,
        synced_at: Utc::now(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct JiraListQuery {
    pub project_id: Option<i64>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn list_jira_issues(
    State(state): State<AppState>,
    ctx: AuthContext,
    Query(query): Query<JiraListQuery>,
) -> Result<Json<Page<JiraIssueResponse>>> {
    let params = PageParams {
        page: query.page,
        limit: query.limit,
    };
    let page = state
        .mirrors
        .list_jira_issues(ctx.tenant_id, query.project_id, params)
        .await?;
    Ok(Json(page.map(JiraIssueResponse::from)))
}

// ============================================================================
// GitLab
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct GitLabSyncRequest {
    #[serde(with = "ids")]
    pub repository_id: i64,
    /// Numeric GitLab project ID or full path. Defaults to the path parsed
    /// from the repository's remote URL.
    pub gitlab_project: Option<String>,
    #[serde(default = "default_mr_state")]
    pub state: String,
}

fn default_mr_state() -> String {
    "all".to_string()
}

#[derive(Debug, Serialize)]
pub struct MergeRequestResponse {
    #[serde(with = "ids")]
    pub id: i64,
    #[serde(with = "ids")]
    pub repository_id: i64,
    pub iid: i64,
    pub title: String,
    pub state: String,
    pub author_username: String,
    pub web_url: String,
    pub synced_at: DateTime<Utc>,
}

impl From<StoredGitLabMergeRequest> for MergeRequestResponse {
    fn from(mr: StoredGitLabMergeRequest) -> Self {
        Self {
            id: mr.id,
            repository_id: mr.repository_id,
            iid: mr.iid,
            title: mr.title,
            state: mr.state,
            author_username: mr.author_username,
            web_url: mr.web_url,
            synced_at: mr.synced_at,
        }
    }
}

/// Derive a GitLab project path from a remote URL
/// (`https://gitlab.example.com/group/app.git` → `group/app`).
fn project_path_from_remote(remote_url: &str) -> Option<String> {
    let without_scheme = remote_url.split("://").nth(1).unwrap_or(remote_url);
    let path = without_scheme.splitn(2, '/').nth(1)?;
    let path = path.trim_end_matches('/').trim_end_matches(".git");

    if path.is_empty() {
        None
    } else {
        Some(path.to_string())
    }
}

#[tracing::instrument(
    name = "http.sync_gitlab",
    skip(state, ctx, request),
    fields(repository_id = request.repository_id)
)]
pub async fn sync_gitlab(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(request): Json<GitLabSyncRequest>,
) -> Result<Json<SyncResponse>> {
    require_write(&ctx)?;

    let repository = state
        .repositories
        .fetch(ctx.tenant_id, request.repository_id)
        .await?;

    let gitlab_project = match request.gitlab_project {
        Some(project) => project,
        None => project_path_from_remote(&repository.remote_url).ok_or_else(|| {
            AppError::invalid_field(
                "gitlab_project",
                "could not derive a project path from the repository remote URL",
            )
        })?,
    };

    let merge_requests = match state
        .gitlab
        .list_merge_requests(&gitlab_project, &request.state, DEFAULT_SYNC_LIMIT)
        .await
    {
        Ok(mrs) => {
            IntegrationMetrics::record_success("gitlab");
            mrs
        }
        Err(e) => {
            IntegrationMetrics::record_failure("gitlab");
            return Err(e);
        }
    };

    let synced = state
        .mirrors
        .upsert_gitlab_merge_requests(ctx.tenant_id, repository.id, &merge_requests)
        .await?;

    state
        .change_logger
        .record(
            ctx.tenant_id,
            ctx.user_id,
            Change::updated(
                "repository",
                repository.id,
                &serde_json::json!({}),
                &serde_json::json!({ "merge_requests_synced": synced }),
            )
            .action("integration.gitlab_synced"),
        )
        .await;

    Ok(Json(SyncResponse {
        synced,
        synced_at: Utc::now(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct GitLabListQuery {
    pub repository_id: Option<i64>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn list_gitlab_merge_requests(
    State(state): State<AppState>,
    ctx: AuthContext,
    Query(query): Query<GitLabListQuery>,
) -> Result<Json<Page<MergeRequestResponse>>> {
    let params = PageParams {
        page: query.page,
        limit: query.limit,
    };
    let page = state
        .mirrors
        .list_gitlab_merge_requests(ctx.tenant_id, query.repository_id, params)
        .await?;
    Ok(Json(page.map(MergeRequestResponse::from)))
}

// ============================================================================
// Google Sheets
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SheetsExportRequest {
    #[serde(default, with = "ids::option")]
    pub project_id: Option<i64>,
    #[serde(default = "default_sheet")]
    pub sheet: String,
    pub limit: Option<i64>,
}

fn default_sheet() -> String {
    "test-runs".to_string()
}

#[tracing::instrument(name = "http.export_sheets", skip(state, ctx, request))]
pub async fn export_sheets(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(request): Json<SheetsExportRequest>,
) -> Result<Json<ExportOutcome>> {
    require_write(&ctx)?;

    let limit = request.limit.unwrap_or(DEFAULT_EXPORT_LIMIT).clamp(1, 1000);
    let rows = state
        .runs_view
        .export_rows(ctx.tenant_id, request.project_id, limit)
        .await?;

    let outcome = match state.sheets.export_runs(&request.sheet, &rows).await {
        Ok(outcome) => {
            IntegrationMetrics::record_success("sheets");
            outcome
        }
        Err(e) => {
            IntegrationMetrics::record_failure("sheets");
            return Err(e);
        }
    };

    tracing::info!(
        exported = outcome.exported_rows,
        updated = outcome.updated_rows,
        sheet = %request.sheet,
        "Runs view exported to Google Sheets"
    );

    Ok(Json(outcome))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_path_from_remote() {
        assert_eq!(
            project_path_from_remote("https://gitlab.example.com/group/app.git"),
            Some("group/app".to_string())
        );
        assert_eq!(
            project_path_from_remote("https://gitlab.com/group/sub/app"),
            Some("group/sub/app".to_string())
        );
        assert_eq!(project_path_from_remote("https://gitlab.com/"), None);
    }
}
