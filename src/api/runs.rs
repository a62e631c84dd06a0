//! Test run endpoints, including the denormalized runs view.

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
use crate::error::{AppError, Result};
use crate::server::AppState;
use crate::store::{NewRun, RecordResult, RunsViewRow, TestResult, TestRun};

use super::extract::require_write;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/runs", get(list_runs).post(start_run))
        .route("/runs-view", get(list_runs_view))
        .route("/runs/{id}", get(get_run))
        .route("/runs/{id}/results", get(list_results).post(record_result))
        .route("/runs/{id}/finish", post(finish_run))
}

#[derive(Debug, Serialize)]
pub struct RunResponse {
    #[serde(with = "ids")]
    pub id: i64,
    #[serde(with = "ids")]
    pub plan_id: i64,
    pub name: String,
    pub environment: Option<String>,
    pub status: String,
    #[serde(with = "ids")]
    pub started_by: i64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl From<TestRun> for RunResponse {
    fn from(run: TestRun) -> Self {
        Self {
            id: run.id,
            plan_id: run.plan_id,
            name: run.name,
            environment: run.environment,
            status: run.status,
            started_by: run.started_by,
            started_at: run.started_at,
            finished_at: run.finished_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ResultResponse {
    #[serde(with = "ids")]
    pub id: i64,
    #[serde(with = "ids")]
    pub run_id: i64,
    #[serde(with = "ids")]
    pub case_id: i64,
    pub status: String,
    pub duration_ms: Option<i64>,
    pub message: Option<String>,
    #[serde(with = "ids::option")]
    pub executed_by: Option<i64>,
    pub executed_at: Option<DateTime<Utc>>,
}

impl From<TestResult> for ResultResponse {
    fn from(result: TestResult) -> Self {
        Self {
            id: result.id,
            run_id: result.run_id,
            case_id: result.case_id,
            status: result.status,
            duration_ms: result.duration_ms,
            message: result.message,
            executed_by: result.executed_by,
            executed_at: result.executed_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RunsViewResponse {
    #[serde(with = "ids")]
    pub run_id: i64,
    #[serde(with = "ids")]
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

impl From<RunsViewRow> for RunsViewResponse {
    fn from(row: RunsViewRow) -> Self {
        Self {
            run_id: row.run_id,
            project_id: row.project_id,
            run_name: row.run_name,
            plan_name: row.plan_name,
            status: row.status,
            total: row.total,
            passed: row.passed,
            failed: row.failed,
            blocked: row.blocked,
            skipped: row.skipped,
            untested: row.untested,
            pass_rate: row.pass_rate,
            last_result_at: row.last_result_at,
            refreshed_at: row.refreshed_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StartRunRequest {
    #[serde(with = "ids")]
    pub plan_id: i64,
    pub name: String,
    pub environment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecordResultRequest {
    #[serde(with = "ids")]
    pub case_id: i64,
    pub status: String,
    pub duration_ms: Option<i64>,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FinishRunRequest {
    #[serde(default)]
    pub aborted: bool,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub plan_id: Option<i64>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ViewQuery {
    pub project_id: Option<i64>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn list_runs(
    State(state): State<AppState>,
    ctx: AuthContext,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<RunResponse>>> {
    let params = PageParams {
        page: query.page,
        limit: query.limit,
    };
    let page = state.runs.list(ctx.tenant_id, query.plan_id, params).await?;
    Ok(Json(page.map(RunResponse::from)))
}

#[tracing::instrument(name = "http.start_run", skip(state, ctx, request), fields(plan_id = request.plan_id))]
pub async fn start_run(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(request): Json<StartRunRequest>,
) -> Result<Json<RunResponse>> {
    require_write(&ctx)?;

    if request.name.trim().is_empty() {
        return Err(AppError::invalid_field("name", "name must not be empty"));
    }

    let run = state
        .runs
        .start(
            ctx.tenant_id,
            ctx.user_id,
            NewRun {
                plan_id: request.plan_id,
                name: request.name.trim().to_string(),
                environment: request.environment,
            },
        )
        .await?;

    state
        .change_logger
        .record(
            ctx.tenant_id,
            ctx.user_id,
            Change::created("test_run", run.id, &run),
        )
        .await;

    state.event_bus.emit(DomainEvent::RunStarted {
        tenant_id: ctx.tenant_id,
        actor_id: ctx.user_id,
        run_id: run.id,
        plan_id: run.plan_id,
    });

    Ok(Json(RunResponse::from(run)))
}

pub async fn get_run(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<RunResponse>> {
    let run = state.runs.fetch(ctx.tenant_id, id).await?;
    Ok(Json(RunResponse::from(run)))
}

pub async fn list_results(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<Vec<ResultResponse>>> {
    let results = state.runs.results(ctx.tenant_id, id).await?;
    Ok(Json(results.into_iter().map(ResultResponse::from).collect()))
}

#[tracing::instrument(
    name = "http.record_result",
    skip(state, ctx, request),
    fields(case_id = request.case_id, status = %request.status)
)]
pub async fn record_result(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<i64>,
    Json(request): Json<RecordResultRequest>,
) -> Result<Json<ResultResponse>> {
    require_write(&ctx)?;

    if let Some(duration) = request.duration_ms {
        if duration < 0 {
            return Err(AppError::invalid_field(
                "duration_ms",
                "duration must not be negative",
            ));
        }
    }

    let result = state
        .runs
        .record_result(
            ctx.tenant_id,
            ctx.user_id,
            id,
            RecordResult {
                case_id: request.case_id,
                status: request.status.clone(),
                duration_ms: request.duration_ms,
                message: request.message,
            },
        )
        .await?;

    state.event_bus.emit(DomainEvent::ResultRecorded {
        tenant_id: ctx.tenant_id,
        actor_id: ctx.user_id,
        run_id: id,
        case_id: request.case_id,
        status: request.status,
    });

    Ok(Json(ResultResponse::from(result)))
}

#[tracing::instrument(name = "http.finish_run", skip(state, ctx, request))]
pub async fn finish_run(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<i64>,
    Json(request): Json<FinishRunRequest>,
) -> Result<Json<RunResponse>> {
    require_write(&ctx)?;

    let run = state.runs.finish(ctx.tenant_id, id, request.aborted).await?;

    state
        .change_logger
        .record(
            ctx.tenant_id,
            ctx.user_id,
            Change::updated(
                "test_run",
                id,
                &serde_json::json!({ "status": "running" }),
                &serde_json::json!({ "status": run.status }),
            )
            .action("test_run.finished"),
        )
        .await;

    state.event_bus.emit(DomainEvent::RunFinished {
        tenant_id: ctx.tenant_id,
        actor_id: ctx.user_id,
        run_id: id,
        started_by: run.started_by,
        status: run.status.clone(),
    });

    Ok(Json(RunResponse::from(run)))
}

pub async fn list_runs_view(
    State(state): State<AppState>,
    ctx: AuthContext,
    Query(query): Query<ViewQuery>,
) -> Result<Json<Page<RunsViewResponse>>> {
    let params = PageParams {
        page: query.page,
        limit: query.limit,
    };
    let page = state
        .runs_view
        .list(ctx.tenant_id, query.project_id, params)
        .await?;
    Ok(Json(page.map(RunsViewResponse::from)))
}
