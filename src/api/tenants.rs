//! Tenant endpoints.
//!
//! `GET /tenant` returns the caller's own tenant. Provisioning endpoints
//! are admin-gated; tenant rows are the one resource that is not itself
//! tenant-scoped.

use axum::{
    extract::{Query, State},
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
use crate::store::Tenant;

use super::extract::require_admin;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/tenant", get(current_tenant))
        .route("/tenants", get(list_tenants).post(create_tenant))
}

#[derive(Debug, Serialize)]
pub struct TenantResponse {
    #[serde(with = "ids")]
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl From<Tenant> for TenantResponse {
    fn from(tenant: Tenant) -> Self {
        Self {
            id: tenant.id,
            slug: tenant.slug,
            name: tenant.name,
            created_at: tenant.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateTenantRequest {
    pub slug: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn current_tenant(
    State(state): State<AppState>,
    ctx: AuthContext,
) -> Result<Json<TenantResponse>> {
    let tenant = state.tenants.fetch(ctx.tenant_id).await?;
    Ok(Json(TenantResponse::from(tenant)))
}

pub async fn list_tenants(
    State(state): State<AppState>,
    ctx: AuthContext,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<TenantResponse>>> {
    require_admin(&ctx)?;

    let params = PageParams {
        page: query.page,
        limit: query.limit,
    };
    let page = state.tenants.list(params).await?;
    Ok(Json(page.map(TenantResponse::from)))
}

#[tracing::instrument(name = "http.create_tenant", skip(state, ctx, request), fields(slug = %request.slug))]
pub async fn create_tenant(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(request): Json<CreateTenantRequest>,
) -> Result<Json<TenantResponse>> {
    require_admin(&ctx)?;

    let mut details = Vec::new();
    let slug = request.slug.trim();
    if slug.is_empty() || !slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
        details.push(FieldError::new(
            "slug",
            "slug must be lowercase letters, digits and dashes",
        ));
    }
    if request.name.trim().is_empty() {
        details.push(FieldError::new("name", "name must not be empty"));
    }
    if !details.is_empty() {
        return Err(AppError::Validation {
            message: "Invalid tenant".to_string(),
            details,
        });
    }

    let tenant = state.tenants.create(slug, request.name.trim()).await?;

    state
        .change_logger
        .record(
            ctx.tenant_id,
            ctx.user_id,
            Change::created("tenant", tenant.id, &tenant),
        )
        .await;

    Ok(Json(TenantResponse::from(tenant)))
}
