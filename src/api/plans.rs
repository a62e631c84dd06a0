//! Test plan endpoints.

use axum::{
    extract::{Path, Query, State},
    routing::{get, put},
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
use crate::store::{NewPlan, TestPlan, UpdatePlan};

use super::extract::require_write;

const PLAN_STATUSES: &[&str] = &["draft", "active", "archived"];

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/plans", get(list_plans).post(create_plan))
        .route(
            "/plans/{id}",
            get(get_plan).patch(update_plan).delete(delete_plan),
        )
        .route("/plans/{id}/cases", put(set_plan_cases).get(get_plan_cases))
}

#[derive(Debug, Serialize)]
pub struct PlanResponse {
    #[serde(with = "ids")]
    pub id: i64,
    #[serde(with = "ids")]
    pub project_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub status: String,
    pub version: i32,
    #[serde(with = "ids")]
    pub created_by: i64,
    #[serde(with = "ids")]
    pub updated_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<TestPlan> for PlanResponse {
    fn from(plan: TestPlan) -> Self {
        Self {
            id: plan.id,
            project_id: plan.project_id,
            name: plan.name,
            description: plan.description,
            status: plan.status,
            version: plan.version,
            created_by: plan.created_by,
            updated_by: plan.updated_by,
            created_at: plan.created_at,
            updated_at: plan.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreatePlanRequest {
    #[serde(with = "ids")]
    pub project_id: i64,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePlanRequest {
    pub version: i32,
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable_string")]
    pub description: Option<Option<String>>,
    pub status: Option<String>,
}

fn nullable_string<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<Option<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize)]
pub struct SetPlanCasesRequest {
    pub case_ids: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct PlanCasesResponse {
    #[serde(with = "ids")]
    pub plan_id: i64,
    pub case_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub project_id: Option<i64>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn list_plans(
    State(state): State<AppState>,
    ctx: AuthContext,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<PlanResponse>>> {
    let params = PageParams {
        page: query.page,
        limit: query.limit,
    };
    let page = state.plans.list(ctx.tenant_id, query.project_id, params).await?;
    Ok(Json(page.map(PlanResponse::from)))
}

#[tracing::instrument(name = "http.create_plan", skip(state, ctx, request))]
pub async fn create_plan(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(request): Json<CreatePlanRequest>,
) -> Result<Json<PlanResponse>> {
    require_write(&ctx)?;

    if request.name.trim().is_empty() {
        return Err(AppError::invalid_field("name", "name must not be empty"));
    }

    state.projects.fetch(ctx.tenant_id, request.project_id).await?;

    let plan = state
        .plans
        .create(
            ctx.tenant_id,
            ctx.user_id,
            NewPlan {
                project_id: request.project_id,
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
            Change::created("test_plan", plan.id, &plan),
        )
        .await;

    Ok(Json(PlanResponse::from(plan)))
}

pub async fn get_plan(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<PlanResponse>> {
    let plan = state.plans.fetch(ctx.tenant_id, id).await?;
    Ok(Json(PlanResponse::from(plan)))
}

#[tracing::instrument(name = "http.update_plan", skip(state, ctx, request))]
pub async fn update_plan(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<i64>,
    Json(request): Json<UpdatePlanRequest>,
) -> Result<Json<PlanResponse>> {
    require_write(&ctx)?;

    if let Some(ref status) = request.status {
        if !PLAN_STATUSES.contains(&status.as_str()) {
            return Err(AppError::invalid_field(
                "status",
                "status must be draft, active or archived",
            ));
        }
    }

    let (before, after) = state
        .plans
        .update(
            ctx.tenant_id,
            ctx.user_id,
            id,
            UpdatePlan {
                version: request.version,
                name: request.name,
                description: request.description,
                status: request.status,
            },
        )
        .await?;

    state
        .change_logger
        .record(
            ctx.tenant_id,
            ctx.user_id,
            Change::updated("test_plan", id, &before, &after),
        )
        .await;

    Ok(Json(PlanResponse::from(after)))
}

pub async fn delete_plan(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>> {
    require_write(&ctx)?;

    let before = state.plans.soft_delete(ctx.tenant_id, ctx.user_id, id).await?;

    state
        .change_logger
        .record(
            ctx.tenant_id,
            ctx.user_id,
            Change::deleted("test_plan", id, &before),
        )
        .await;

    Ok(Json(serde_json::json!({ "deleted": true })))
}

/// PUT /plans/{id}/cases - replace plan membership
#[tracing::instrument(name = "http.set_plan_cases", skip(state, ctx, request))]
pub async fn set_plan_cases(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<i64>,
    Json(request): Json<SetPlanCasesRequest>,
) -> Result<Json<PlanCasesResponse>> {
    require_write(&ctx)?;

    let case_ids = parse_id_list(&request.case_ids)?;
    state.plans.set_cases(ctx.tenant_id, id, &case_ids).await?;

    state
        .change_logger
        .record(
            ctx.tenant_id,
            ctx.user_id,
            Change::updated(
                "test_plan",
                id,
                &serde_json::json!({}),
                &serde_json::json!({ "case_count": case_ids.len() }),
            )
            .action("test_plan.cases_replaced"),
        )
        .await;

    Ok(Json(PlanCasesResponse {
        plan_id: id,
        case_ids: case_ids.iter().map(|id| id.to_string()).collect(),
    }))
}

pub async fn get_plan_cases(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<PlanCasesResponse>> {
    let case_ids = state.plans.case_ids(ctx.tenant_id, id).await?;

    Ok(Json(PlanCasesResponse {
        plan_id: id,
        case_ids: case_ids.iter().map(|id| id.to_string()).collect(),
    }))
}

/// Case IDs arrive as strings or numbers, like every other ID field.
fn parse_id_list(raw: &[serde_json::Value]) -> Result<Vec<i64>> {
    raw.iter()
        .map(|value| match value {
            serde_json::Value::Number(n) => n.as_i64().ok_or(()),
            serde_json::Value::String(s) => s.parse().map_err(|_| ()),
            _ => Err(()),
        })
        .collect::<std::result::Result<Vec<i64>, ()>>()
        .map_err(|_| AppError::invalid_field("case_ids", "case ids must be strings or integers"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_id_list_mixed() {
        let raw = vec![json!(3), json!("17"), json!(42)];
        assert_eq!(parse_id_list(&raw).unwrap(), vec![3, 17, 42]);
    }

    #[test]
    fn test_parse_id_list_rejects_garbage() {
        assert!(parse_id_list(&[json!(true)]).is_err());
        assert!(parse_id_list(&[json!("abc")]).is_err());
    }
}
