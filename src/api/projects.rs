//! Project endpoints, including the per-project bug budget.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::AuthContext;
use crate::domain::changelog::Change;
use crate::domain::ids;
use crate::domain::pagination::{Page, PageParams};
use crate::error::{AppError, FieldError, Result};
use crate::server::AppState;
use crate::store::{budget_period, NewProject, Project, UpdateProject};

use super::extract::{require_admin, require_write};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/projects", get(list_projects).post(create_project))
        .route(
            "/projects/{id}",
            get(get_project).patch(update_project).delete(delete_project),
        )
        .route(
            "/projects/{id}/bug-budget",
            get(get_bug_budget).put(set_bug_budget),
        )
}

#[derive(Debug, Serialize)]
pub struct ProjectResponse {
    #[serde(with = "ids")]
    pub id: i64,
    pub key: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(with = "ids")]
    pub created_by: i64,
    #[serde(with = "ids")]
    pub updated_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Project> for ProjectResponse {
    fn from(project: Project) -> Self {
        Self {
            id: project.id,
            key: project.key,
            name: project.name,
            description: project.description,
            created_by: project.created_by,
            updated_by: project.updated_by,
            created_at: project.created_at,
            updated_at: project.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub key: String,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProjectRequest {
    pub name: Option<String>,
    #[serde(default, with = "double_option")]
    pub description: Option<Option<String>>,
}

/// Distinguishes an absent field from an explicit null in PATCH bodies.
mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer).map(Some)
    }
}

fn validate_create(req: &CreateProjectRequest) -> Result<()> {
    let mut details = Vec::new();

    let key = req.key.trim();
    if key.is_empty() || key.len() > 32 {
        details.push(FieldError::new("key", "key must be 1-32 characters"));
    } else if !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        details.push(FieldError::new("key", "key may contain letters, digits and dashes only"));
    }
    if req.name.trim().is_empty() {
        details.push(FieldError::new("name", "name must not be empty"));
    }

    if details.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation {
            message: "Invalid project".to_string(),
            details,
        })
    }
}

pub async fn list_projects(
    State(state): State<AppState>,
    ctx: AuthContext,
    Query(params): Query<PageParams>,
) -> Result<Json<Page<ProjectResponse>>> {
    let page = state.projects.list(ctx.tenant_id, params).await?;
    Ok(Json(page.map(ProjectResponse::from)))
}

#[tracing::instrument(name = "http.create_project", skip(state, ctx, request), fields(key = %request.key))]
pub async fn create_project(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(request): Json<CreateProjectRequest>,
) -> Result<Json<ProjectResponse>> {
    require_write(&ctx)?;
    validate_create(&request)?;

    let project = state
        .projects
        .create(
            ctx.tenant_id,
            ctx.user_id,
            NewProject {
                key: request.key.trim().to_string(),
                name: request.name.trim().to_string(),
                description: request.description,
            },
        )
        .await?;

    state
        .change_logger
        .record(
            ctx.tenant_id,
            ctx.user_id,
            Change::created("project", project.id, &project),
        )
        .await;

    Ok(Json(ProjectResponse::from(project)))
}

pub async fn get_project(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<ProjectResponse>> {
    let project = state.projects.fetch(ctx.tenant_id, id).await?;
    Ok(Json(ProjectResponse::from(project)))
}

pub async fn update_project(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<i64>,
    Json(request): Json<UpdateProjectRequest>,
) -> Result<Json<ProjectResponse>> {
    require_write(&ctx)?;

    if let Some(ref name) = request.name {
        if name.trim().is_empty() {
            return Err(AppError::invalid_field("name", "name must not be empty"));
        }
    }

    let before = state.projects.fetch(ctx.tenant_id, id).await?;
    let after = state
        .projects
        .update(
            ctx.tenant_id,
            ctx.user_id,
            id,
            UpdateProject {
                name: request.name,
                description: request.description,
            },
        )
        .await?;

    state
        .change_logger
        .record(
            ctx.tenant_id,
            ctx.user_id,
            Change::updated("project", id, &before, &after),
        )
        .await;

    Ok(Json(ProjectResponse::from(after)))
}

pub async fn delete_project(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>> {
    require_write(&ctx)?;

    let before = state.projects.soft_delete(ctx.tenant_id, ctx.user_id, id).await?;

    state
        .change_logger
        .record(
            ctx.tenant_id,
            ctx.user_id,
            Change::deleted("project", id, &before),
        )
        .await;

    Ok(Json(serde_json::json!({ "deleted": true })))
}

// ============================================================================
// Bug budget
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SetBugBudgetRequest {
    pub max_open_bugs: i32,
    /// Defaults to the current month.
    pub period: Option<String>,
}

pub async fn get_bug_budget(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<crate::store::BugBudgetStatus>> {
    state.projects.fetch(ctx.tenant_id, id).await?;

    let period = budget_period(Utc::now());
    let status = state.bugs.budget_status(ctx.tenant_id, id, &period).await?;
    Ok(Json(status))
}

#[tracing::instrument(name = "http.set_bug_budget", skip(state, ctx, request))]
pub async fn set_bug_budget(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<i64>,
    Json(request): Json<SetBugBudgetRequest>,
) -> Result<Json<crate::store::BugBudget>> {
    require_admin(&ctx)?;

    if request.max_open_bugs < 0 {
        return Err(AppError::invalid_field(
            "max_open_bugs",
            "budget must not be negative",
        ));
    }
    if let Some(ref period) = request.period {
        if chrono::NaiveDate::parse_from_str(&format!("{}-01", period), "%Y-%m-%d").is_err() {
            return Err(AppError::invalid_field("period", "period must be YYYY-MM"));
        }
    }

    state.projects.fetch(ctx.tenant_id, id).await?;

    let period = request.period.unwrap_or_else(|| budget_period(Utc::now()));
    let budget = state
        .bugs
        .set_budget(ctx.tenant_id, ctx.user_id, id, &period, request.max_open_bugs)
        .await?;

    state
        .change_logger
        .record(
            ctx.tenant_id,
            ctx.user_id,
            Change::updated("bug_budget", id, &serde_json::json!({}), &budget)
                .action("bug_budget.set"),
        )
        .await;

    Ok(Json(budget))
}
