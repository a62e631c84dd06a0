//! Repository endpoints.

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
use crate::store::{NewRepository, Repository, UpdateRepository};

use super::extract::require_write;

const PROVIDERS: &[&str] = &["gitlab", "github", "other"];

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/repositories", get(list_repositories).post(create_repository))
        .route(
            "/repositories/{id}",
            get(get_repository)
                .patch(update_repository)
                .delete(delete_repository),
        )
}

#[derive(Debug, Serialize)]
pub struct RepositoryResponse {
    #[serde(with = "ids")]
    pub id: i64,
    #[serde(with = "ids")]
    pub project_id: i64,
    pub name: String,
    pub provider: String,
    pub remote_url: String,
    pub default_branch: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Repository> for RepositoryResponse {
    fn from(repo: Repository) -> Self {
        Self {
            id: repo.id,
            project_id: repo.project_id,
            name: repo.name,
            provider: repo.provider,
            remote_url: repo.remote_url,
            default_branch: repo.default_branch,
            created_at: repo.created_at,
            updated_at: repo.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateRepositoryRequest {
    #[serde(with = "ids")]
    pub project_id: i64,
    pub name: String,
    pub provider: String,
    pub remote_url: String,
    pub default_branch: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRepositoryRequest {
    pub name: Option<String>,
    pub remote_url: Option<String>,
    pub default_branch: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub project_id: Option<i64>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl ListQuery {
    fn page_params(&self) -> PageParams {
        PageParams {
            page: self.page,
            limit: self.limit,
        }
    }
}

fn validate_create(req: &CreateRepositoryRequest) -> Result<()> {
    let mut details = Vec::new();

    if req.name.trim().is_empty() {
        details.push(FieldError::new("name", "name must not be empty"));
    }
    if !PROVIDERS.contains(&req.provider.as_str()) {
        details.push(FieldError::new("provider", "provider must be gitlab, github or other"));
    }
    if req.remote_url.trim().is_empty() {
        details.push(FieldError::new("remote_url", "remote URL must not be empty"));
    }

    if details.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation {
            message: "Invalid repository".to_string(),
            details,
        })
    }
}

pub async fn list_repositories(
    State(state): State<AppState>,
    ctx: AuthContext,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<RepositoryResponse>>> {
    let page = state
        .repositories
        .list(ctx.tenant_id, query.project_id, query.page_params())
        .await?;
    Ok(Json(page.map(RepositoryResponse::from)))
}

#[tracing::instrument(name = "http.create_repository", skip(state, ctx, request))]
pub async fn create_repository(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(request): Json<CreateRepositoryRequest>,
) -> Result<Json<RepositoryResponse>> {
    require_write(&ctx)?;
    validate_create(&request)?;

    // The project must be live in this tenant.
    state.projects.fetch(ctx.tenant_id, request.project_id).await?;

    let repository = state
        .repositories
        .create(
            ctx.tenant_id,
            NewRepository {
                project_id: request.project_id,
                name: request.name.trim().to_string(),
                provider: request.provider,
                remote_url: request.remote_url.trim().to_string(),
                default_branch: request.default_branch.unwrap_or_else(|| "main".to_string()),
            },
        )
        .await?;

    state
        .change_logger
        .record(
            ctx.tenant_id,
            ctx.user_id,
            Change::created("repository", repository.id, &repository),
        )
        .await;

    Ok(Json(RepositoryResponse::from(repository)))
}

pub async fn get_repository(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<RepositoryResponse>> {
    let repository = state.repositories.fetch(ctx.tenant_id, id).await?;
    Ok(Json(RepositoryResponse::from(repository)))
}

pub async fn update_repository(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<i64>,
    Json(request): Json<UpdateRepositoryRequest>,
) -> Result<Json<RepositoryResponse>> {
    require_write(&ctx)?;

    let before = state.repositories.fetch(ctx.tenant_id, id).await?;
    let after = state
        .repositories
        .update(
            ctx.tenant_id,
            id,
            UpdateRepository {
                name: request.name,
                remote_url: request.remote_url,
                default_branch: request.default_branch,
            },
        )
        .await?;

    state
        .change_logger
        .record(
            ctx.tenant_id,
            ctx.user_id,
            Change::updated("repository", id, &before, &after),
        )
        .await;

    Ok(Json(RepositoryResponse::from(after)))
}

pub async fn delete_repository(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>> {
    require_write(&ctx)?;

    let before = state.repositories.soft_delete(ctx.tenant_id, id).await?;

    state
        .change_logger
        .record(
            ctx.tenant_id,
            ctx.user_id,
            Change::deleted("repository", id, &before),
        )
        .await;

    Ok(Json(serde_json::json!({ "deleted": true })))
}
