//! Bug tracking endpoints.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::AuthContext;
use crate::domain::changelog::Change;
use crate::domain::events::DomainEvent;
use crate::domain::ids;
use crate::domain::pagination::{Page, PageParams};
use crate::error::{AppError, FieldError, Result};
use crate::server::AppState;
use crate::store::{Bug, NewBug, UpdateBug, BUG_SEVERITIES, BUG_STATUSES};

use super::extract::require_write;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/bugs", get(list_bugs).post(create_bug))
        .route(
            "/bugs/{id}",
            get(get_bug).patch(update_bug).delete(delete_bug),
        )
}

#[derive(Debug, Serialize)]
pub struct BugResponse {
    #[serde(with = "ids")]
    pub id: i64,
    #[serde(with = "ids")]
    pub project_id: i64,
    #[serde(with = "ids::option")]
    pub run_id: Option<i64>,
    #[serde(with = "ids::option")]
    pub case_id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub severity: String,
    pub status: String,
    #[serde(with = "ids::option")]
    pub assignee_id: Option<i64>,
    pub version: i32,
    #[serde(with = "ids")]
    pub created_by: i64,
    #[serde(with = "ids")]
    pub updated_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Bug> for BugResponse {
    fn from(bug: Bug) -> Self {
        Self {
            id: bug.id,
            project_id: bug.project_id,
            run_id: bug.run_id,
            case_id: bug.case_id,
            title: bug.title,
            description: bug.description,
            severity: bug.severity,
            status: bug.status,
            assignee_id: bug.assignee_id,
            version: bug.version,
            created_by: bug.created_by,
            updated_by: bug.updated_by,
            created_at: bug.created_at,
            updated_at: bug.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateBugRequest {
    #[serde(with = "ids")]
    pub project_id: i64,
    #[serde(default, with = "ids::option")]
    pub run_id: Option<i64>,
    #[serde(default, with = "ids::option")]
    pub case_id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    #[serde(default = "default_severity")]
    pub severity: String,
    #[serde(default, with = "ids::option")]
    pub assignee_id: Option<i64>,
}

fn default_severity() -> String {
    "major".to_string()
}

#[derive(Debug, Deserialize)]
pub struct UpdateBugRequest {
    pub version: i32,
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable_string")]
    pub description: Option<Option<String>>,
    pub severity: Option<String>,
    pub status: Option<String>,
    #[serde(default, deserialize_with = "nullable_id")]
    pub assignee_id: Option<Option<i64>>,
}

fn nullable_string<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<Option<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

fn nullable_id<'de, D>(deserializer: D) -> std::result::Result<Option<Option<i64>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    ids::option::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub project_id: Option<i64>,
    pub status: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

fn validate_create(req: &CreateBugRequest) -> Result<()> {
    let mut details = Vec::new();

    if req.title.trim().is_empty() {
        details.push(FieldError::new("title", "title must not be empty"));
    }
    if !BUG_SEVERITIES.contains(&req.severity.as_str()) {
        details.push(FieldError::new(
            "severity",
            "severity must be critical, major, minor or trivial",
        ));
    }

    if details.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation {
            message: "Invalid bug".to_string(),
            details,
        })
    }
}

pub async fn list_bugs(
    State(state): State<AppState>,
    ctx: AuthContext,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<BugResponse>>> {
    if let Some(ref status) = query.status {
        if !BUG_STATUSES.contains(&status.as_str()) {
            return Err(AppError::invalid_field(
                "status",
                "status must be open, in_progress, resolved or closed",
            ));
        }
    }

    let params = PageParams {
        page: query.page,
        limit: query.limit,
    };
    let page = state
        .bugs
        .list(ctx.tenant_id, query.project_id, query.status.as_deref(), params)
        .await?;
    Ok(Json(page.map(BugResponse::from)))
}

#[tracing::instrument(name = "http.create_bug", skip(state, ctx, request))]
pub async fn create_bug(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(request): Json<CreateBugRequest>,
) -> Result<Json<BugResponse>> {
    require_write(&ctx)?;
    validate_create(&request)?;

    state.projects.fetch(ctx.tenant_id, request.project_id).await?;

    if let Some(assignee_id) = request.assignee_id {
        state.users.fetch(ctx.tenant_id, assignee_id).await?;
    }

    let bug = state
        .bugs
        .create(
            ctx.tenant_id,
            ctx.user_id,
            NewBug {
                project_id: request.project_id,
                run_id: request.run_id,
                case_id: request.case_id,
                title: request.title.trim().to_string(),
                description: request.description,
                severity: request.severity,
                assignee_id: request.assignee_id,
            },
        )
        .await?;

    state
        .change_logger
        .record(ctx.tenant_id, ctx.user_id, Change::created("bug", bug.id, &bug))
        .await;

    state.event_bus.emit(DomainEvent::BugCreated {
        tenant_id: ctx.tenant_id,
        actor_id: ctx.user_id,
        bug_id: bug.id,
        assignee_id: bug.assignee_id,
    });

    Ok(Json(BugResponse::from(bug)))
}

pub async fn get_bug(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<BugResponse>> {
    let bug = state.bugs.fetch(ctx.tenant_id, id).await?;
    Ok(Json(BugResponse::from(bug)))
}

#[tracing::instrument(name = "http.update_bug", skip(state, ctx, request))]
pub async fn update_bug(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<i64>,
    Json(request): Json<UpdateBugRequest>,
) -> Result<Json<BugResponse>> {
    require_write(&ctx)?;

    if let Some(ref severity) = request.severity {
        if !BUG_SEVERITIES.contains(&severity.as_str()) {
            return Err(AppError::invalid_field(
                "severity",
                "severity must be critical, major, minor or trivial",
            ));
        }
    }
    if let Some(ref status) = request.status {
        if !BUG_STATUSES.contains(&status.as_str()) {
            return Err(AppError::invalid_field(
                "status",
                "status must be open, in_progress, resolved or closed",
            ));
        }
    }
    if let Some(Some(assignee_id)) = request.assignee_id {
        state.users.fetch(ctx.tenant_id, assignee_id).await?;
    }

    let (before, after) = state
        .bugs
        .update(
            ctx.tenant_id,
            ctx.user_id,
            id,
            UpdateBug {
                version: request.version,
                title: request.title,
                description: request.description,
                severity: request.severity,
                status: request.status,
                assignee_id: request.assignee_id,
            },
        )
        .await?;

    state
        .change_logger
        .record(ctx.tenant_id, ctx.user_id, Change::updated("bug", id, &before, &after))
        .await;

    state.event_bus.emit(DomainEvent::BugUpdated {
        tenant_id: ctx.tenant_id,
        actor_id: ctx.user_id,
        bug_id: id,
        assignee_id: after.assignee_id,
    });

    Ok(Json(BugResponse::from(after)))
}

pub async fn delete_bug(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>> {
    require_write(&ctx)?;

    let before = state.bugs.soft_delete(ctx.tenant_id, ctx.user_id, id).await?;

    state
        .change_logger
        .record(ctx.tenant_id, ctx.user_id, Change::deleted("bug", id, &before))
        .await;

    Ok(Json(serde_json::json!({ "deleted": true })))
}
