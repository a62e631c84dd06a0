//! Test suite endpoints.

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
use crate::error::{AppError, Result};
use crate::server::AppState;
use crate::store::{NewSuite, TestSuite, UpdateSuite};

use super::extract::require_write;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/suites", get(list_suites).post(create_suite))
        .route(
            "/suites/{id}",
            get(get_suite).patch(update_suite).delete(delete_suite),
        )
}

#[derive(Debug, Serialize)]
pub struct SuiteResponse {
    #[serde(with = "ids")]
    pub id: i64,
    #[serde(with = "ids")]
    pub project_id: i64,
    #[serde(with = "ids::option")]
    pub parent_id: Option<i64>,
    pub name: String,
    pub position: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<TestSuite> for SuiteResponse {
    fn from(suite: TestSuite) -> Self {
        Self {
            id: suite.id,
            project_id: suite.project_id,
            parent_id: suite.parent_id,
            name: suite.name,
            position: suite.position,
            created_at: suite.created_at,
            updated_at: suite.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateSuiteRequest {
    #[serde(with = "ids")]
    pub project_id: i64,
    #[serde(default, with = "ids::option")]
    pub parent_id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub position: i32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSuiteRequest {
    pub name: Option<String>,
    /// Present-and-null moves the suite to the root.
    #[serde(default, deserialize_with = "deserialize_reparent")]
    pub parent_id: Option<Option<i64>>,
    pub position: Option<i32>,
}

fn deserialize_reparent<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<Option<i64>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    ids::option::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub project_id: Option<i64>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn list_suites(
    State(state): State<AppState>,
    ctx: AuthContext,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<SuiteResponse>>> {
    let params = PageParams {
        page: query.page,
        limit: query.limit,
    };
    let page = state.suites.list(ctx.tenant_id, query.project_id, params).await?;
    Ok(Json(page.map(SuiteResponse::from)))
}

#[tracing::instrument(name = "http.create_suite", skip(state, ctx, request))]
pub async fn create_suite(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(request): Json<CreateSuiteRequest>,
) -> Result<Json<SuiteResponse>> {
    require_write(&ctx)?;

    if request.name.trim().is_empty() {
        return Err(AppError::invalid_field("name", "name must not be empty"));
    }

    state.projects.fetch(ctx.tenant_id, request.project_id).await?;

    let suite = state
        .suites
        .create(
            ctx.tenant_id,
            NewSuite {
                project_id: request.project_id,
                parent_id: request.parent_id,
                name: request.name.trim().to_string(),
                position: request.position,
            },
        )
        .await?;

    state
        .change_logger
        .record(
            ctx.tenant_id,
            ctx.user_id,
            Change::created("test_suite", suite.id, &suite),
        )
        .await;

    Ok(Json(SuiteResponse::from(suite)))
}

pub async fn get_suite(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<SuiteResponse>> {
    let suite = state.suites.fetch(ctx.tenant_id, id).await?;
    Ok(Json(SuiteResponse::from(suite)))
}

pub async fn update_suite(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<i64>,
    Json(request): Json<UpdateSuiteRequest>,
) -> Result<Json<SuiteResponse>> {
    require_write(&ctx)?;

    let before = state.suites.fetch(ctx.tenant_id, id).await?;
    let after = state
        .suites
        .update(
            ctx.tenant_id,
            id,
            UpdateSuite {
                name: request.name,
                parent_id: request.parent_id,
                position: request.position,
            },
        )
        .await?;

    state
        .change_logger
        .record(
            ctx.tenant_id,
            ctx.user_id,
            Change::updated("test_suite", id, &before, &after),
        )
        .await;

    Ok(Json(SuiteResponse::from(after)))
}

pub async fn delete_suite(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>> {
    require_write(&ctx)?;

    let before = state.suites.soft_delete(ctx.tenant_id, id).await?;

    state
        .change_logger
        .record(
            ctx.tenant_id,
            ctx.user_id,
            Change::deleted("test_suite", id, &before),
        )
        .await;

    Ok(Json(serde_json::json!({ "deleted": true })))
}
