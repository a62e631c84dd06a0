//! User management endpoints.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::{AuthContext, UserRole};
use crate::domain::changelog::Change;
use crate::domain::ids;
use crate::domain::pagination::{Page, PageParams};
use crate::error::{AppError, FieldError, Result};
use crate::server::AppState;
use crate::store::{NewUser, UpdateUser, User};

use super::extract::require_admin;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/me", get(me))
        .route(
            "/users/{id}",
            get(get_user).patch(update_user).delete(delete_user),
        )
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    #[serde(with = "ids")]
    pub id: i64,
    #[serde(with = "ids")]
    pub tenant_id: i64,
    pub email: String,
    pub display_name: String,
    pub role: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            tenant_id: user.tenant_id,
            email: user.email,
            display_name: user.display_name,
            role: user.role,
            is_active: user.is_active,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub display_name: String,
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub display_name: Option<String>,
    pub role: Option<String>,
    pub is_active: Option<bool>,
}

fn validate_create(req: &CreateUserRequest) -> Result<()> {
    let mut details = Vec::new();

    if req.email.trim().is_empty() || !req.email.contains('@') {
        details.push(FieldError::new("email", "a valid email address is required"));
    }
    if req.display_name.trim().is_empty() {
        details.push(FieldError::new("display_name", "display name must not be empty"));
    }
    if UserRole::parse(&req.role).is_none() {
        details.push(FieldError::new("role", "role must be admin, member or viewer"));
    }

    if details.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation {
            message: "Invalid user".to_string(),
            details,
        })
    }
}

pub async fn me(State(state): State<AppState>, ctx: AuthContext) -> Result<Json<UserResponse>> {
    let user = state.users.fetch(ctx.tenant_id, ctx.user_id).await?;
    Ok(Json(UserResponse::from(user)))
}

pub async fn list_users(
    State(state): State<AppState>,
    ctx: AuthContext,
    Query(params): Query<PageParams>,
) -> Result<Json<Page<UserResponse>>> {
    let page = state.users.list(ctx.tenant_id, params).await?;
    Ok(Json(page.map(UserResponse::from)))
}

#[tracing::instrument(name = "http.create_user", skip(state, ctx, request))]
pub async fn create_user(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(request): Json<CreateUserRequest>,
) -> Result<Json<UserResponse>> {
    require_admin(&ctx)?;
    validate_create(&request)?;

    let user = state
        .users
        .create(
            ctx.tenant_id,
            NewUser {
                email: request.email.trim().to_string(),
                display_name: request.display_name.trim().to_string(),
                role: request.role,
            },
        )
        .await?;

    state
        .change_logger
        .record(ctx.tenant_id, ctx.user_id, Change::created("user", user.id, &user))
        .await;

    Ok(Json(UserResponse::from(user)))
}

pub async fn get_user(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<UserResponse>> {
    let user = state.users.fetch(ctx.tenant_id, id).await?;
    Ok(Json(UserResponse::from(user)))
}

#[tracing::instrument(name = "http.update_user", skip(state, ctx, request))]
pub async fn update_user(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<i64>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>> {
    require_admin(&ctx)?;

    if let Some(ref role) = request.role {
        if UserRole::parse(role).is_none() {
            return Err(AppError::invalid_field(
                "role",
                "role must be admin, member or viewer",
            ));
        }
    }

    let before = state.users.fetch(ctx.tenant_id, id).await?;
    let after = state
        .users
        .update(
            ctx.tenant_id,
            id,
            UpdateUser {
                display_name: request.display_name,
                role: request.role,
                is_active: request.is_active,
            },
        )
        .await?;

    state
        .change_logger
        .record(ctx.tenant_id, ctx.user_id, Change::updated("user", id, &before, &after))
        .await;

    Ok(Json(UserResponse::from(after)))
}

pub async fn delete_user(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>> {
    require_admin(&ctx)?;

    if id == ctx.user_id {
        return Err(AppError::Conflict(
            "Cannot delete your own account".to_string(),
        ));
    }

    let before = state.users.soft_delete(ctx.tenant_id, id).await?;

    state
        .change_logger
        .record(ctx.tenant_id, ctx.user_id, Change::deleted("user", id, &before))
        .await;

    Ok(Json(serde_json::json!({ "deleted": true })))
}
