//! Test case endpoints.
//!
//! Updates require the client's last-read `version`; a stale version is a
//! 409 with the current version in the message.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
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
use crate::store::{NewCase, TestCase, UpdateCase};

use super::extract::require_write;

const PRIORITIES: &[&str] = &["critical", "high", "medium", "low"];

/// Upper bound on one batch-create request.
const MAX_BATCH: usize = 100;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/cases", get(list_cases).post(create_case))
        .route("/cases/batch", post(create_cases_batch))
        .route(
            "/cases/{id}",
            get(get_case).patch(update_case).delete(delete_case),
        )
}

#[derive(Debug, Serialize)]
pub struct CaseResponse {
    #[serde(with = "ids")]
    pub id: i64,
    #[serde(with = "ids")]
    pub suite_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub priority: String,
    pub steps: serde_json::Value,
    pub expected_result: Option<String>,
    pub version: i32,
    #[serde(with = "ids")]
    pub created_by: i64,
    #[serde(with = "ids")]
    pub updated_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<TestCase> for CaseResponse {
    fn from(case: TestCase) -> Self {
        Self {
            id: case.id,
            suite_id: case.suite_id,
            title: case.title,
            description: case.description,
            priority: case.priority,
            steps: case.steps,
            expected_result: case.expected_result,
            version: case.version,
            created_by: case.created_by,
            updated_by: case.updated_by,
            created_at: case.created_at,
            updated_at: case.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateCaseRequest {
    #[serde(with = "ids")]
    pub suite_id: i64,
    pub title: String,
    pub description: Option<String>,
    #[serde(default = "default_priority")]
    pub priority: String,
    #[serde(default = "empty_steps")]
    pub steps: serde_json::Value,
    pub expected_result: Option<String>,
}

fn default_priority() -> String {
    "medium".to_string()
}

fn empty_steps() -> serde_json::Value {
    serde_json::Value::Array(vec![])
}

#[derive(Debug, Deserialize)]
pub struct BatchCreateRequest {
    pub cases: Vec<CreateCaseRequest>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCaseRequest {
    pub version: i32,
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable_string")]
    pub description: Option<Option<String>>,
    pub priority: Option<String>,
    pub steps: Option<serde_json::Value>,
    #[serde(default, deserialize_with = "nullable_string")]
    pub expected_result: Option<Option<String>>,
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
pub struct ListQuery {
    pub suite_id: Option<i64>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

fn validate_case(req: &CreateCaseRequest, field_prefix: &str) -> Vec<FieldError> {
    let mut details = Vec::new();

    if req.title.trim().is_empty() {
        details.push(FieldError::new(
            format!("{}title", field_prefix),
            "title must not be empty",
        ));
    }
    if !PRIORITIES.contains(&req.priority.as_str()) {
        details.push(FieldError::new(
            format!("{}priority", field_prefix),
            "priority must be critical, high, medium or low",
        ));
    }
    if !req.steps.is_array() {
        details.push(FieldError::new(
            format!("{}steps", field_prefix),
            "steps must be an array",
        ));
    }

    details
}

pub async fn list_cases(
    State(state): State<AppState>,
    ctx: AuthContext,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<CaseResponse>>> {
    let params = PageParams {
        page: query.page,
        limit: query.limit,
    };
    let page = state.cases.list(ctx.tenant_id, query.suite_id, params).await?;
    Ok(Json(page.map(CaseResponse::from)))
}

#[tracing::instrument(name = "http.create_case", skip(state, ctx, request))]
pub async fn create_case(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(request): Json<CreateCaseRequest>,
) -> Result<Json<CaseResponse>> {
    require_write(&ctx)?;

    let details = validate_case(&request, "");
    if !details.is_empty() {
        return Err(AppError::Validation {
            message: "Invalid case".to_string(),
            details,
        });
    }

    let case = state
        .cases
        .create(ctx.tenant_id, ctx.user_id, new_case_from(request))
        .await?;

    state
        .change_logger
        .record(
            ctx.tenant_id,
            ctx.user_id,
            Change::created("test_case", case.id, &case),
        )
        .await;

    state.event_bus.emit(DomainEvent::CaseCreated {
        tenant_id: ctx.tenant_id,
        actor_id: ctx.user_id,
        case_id: case.id,
        suite_id: case.suite_id,
    });

    Ok(Json(CaseResponse::from(case)))
}

#[tracing::instrument(
    name = "http.create_cases_batch",
    skip(state, ctx, request),
    fields(count = request.cases.len())
)]
pub async fn create_cases_batch(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(request): Json<BatchCreateRequest>,
) -> Result<Json<Vec<CaseResponse>>> {
    require_write(&ctx)?;

    if request.cases.is_empty() {
        return Err(AppError::invalid_field("cases", "batch must not be empty"));
    }
    if request.cases.len() > MAX_BATCH {
        return Err(AppError::invalid_field(
            "cases",
            format!("batch is limited to {} cases", MAX_BATCH),
        ));
    }

    let mut details = Vec::new();
    for (index, case) in request.cases.iter().enumerate() {
        details.extend(validate_case(case, &format!("cases[{}].", index)));
    }
    if !details.is_empty() {
        return Err(AppError::Validation {
            message: "Invalid batch".to_string(),
            details,
        });
    }

    let batch = request.cases.into_iter().map(new_case_from).collect();
    let created = state
        .cases
        .create_batch(ctx.tenant_id, ctx.user_id, batch)
        .await?;

    for case in &created {
        state
            .change_logger
            .record(
                ctx.tenant_id,
                ctx.user_id,
                Change::created("test_case", case.id, case),
            )
            .await;

        state.event_bus.emit(DomainEvent::CaseCreated {
            tenant_id: ctx.tenant_id,
            actor_id: ctx.user_id,
            case_id: case.id,
            suite_id: case.suite_id,
        });
    }

    Ok(Json(created.into_iter().map(CaseResponse::from).collect()))
}

fn new_case_from(request: CreateCaseRequest) -> NewCase {
    NewCase {
        suite_id: request.suite_id,
        title: request.title.trim().to_string(),
        description: request.description,
        priority: request.priority,
        steps: request.steps,
        expected_result: request.expected_result,
    }
}

pub async fn get_case(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<CaseResponse>> {
    let case = state.cases.fetch(ctx.tenant_id, id).await?;
    Ok(Json(CaseResponse::from(case)))
}

#[tracing::instrument(name = "http.update_case", skip(state, ctx, request))]
pub async fn update_case(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<i64>,
    Json(request): Json<UpdateCaseRequest>,
) -> Result<Json<CaseResponse>> {
    require_write(&ctx)?;

    if let Some(ref priority) = request.priority {
        if !PRIORITIES.contains(&priority.as_str()) {
            return Err(AppError::invalid_field(
                "priority",
                "priority must be critical, high, medium or low",
            ));
        }
    }
    if let Some(ref steps) = request.steps {
        if !steps.is_array() {
            return Err(AppError::invalid_field("steps", "steps must be an array"));
        }
    }

    let (before, after) = state
        .cases
        .update(
            ctx.tenant_id,
            ctx.user_id,
            id,
            UpdateCase {
                version: request.version,
                title: request.title,
                description: request.description,
                priority: request.priority,
                steps: request.steps,
                expected_result: request.expected_result,
            },
        )
        .await?;

    state
        .change_logger
        .record(
            ctx.tenant_id,
            ctx.user_id,
            Change::updated("test_case", id, &before, &after),
        )
        .await;

    state.event_bus.emit(DomainEvent::CaseUpdated {
        tenant_id: ctx.tenant_id,
        actor_id: ctx.user_id,
        case_id: id,
    });

    Ok(Json(CaseResponse::from(after)))
}

pub async fn delete_case(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>> {
    require_write(&ctx)?;

    let before = state.cases.soft_delete(ctx.tenant_id, ctx.user_id, id).await?;

    state
        .change_logger
        .record(
            ctx.tenant_id,
            ctx.user_id,
            Change::deleted("test_case", id, &before),
        )
        .await;

    state.event_bus.emit(DomainEvent::CaseDeleted {
        tenant_id: ctx.tenant_id,
        actor_id: ctx.user_id,
        case_id: id,
    });

    Ok(Json(serde_json::json!({ "deleted": true })))
}
