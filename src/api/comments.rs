//! Comment endpoints, polymorphic over (entity_type, entity_id).

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
use crate::store::{Comment, COMMENTABLE_TYPES};

use super::extract::require_write;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/comments", get(list_comments).post(create_comment))
        .route("/comments/{id}", axum::routing::delete(delete_comment))
}

#[derive(Debug, Serialize)]
pub struct CommentResponse {
    #[serde(with = "ids")]
    pub id: i64,
    pub entity_type: String,
    #[serde(with = "ids")]
    pub entity_id: i64,
    #[serde(with = "ids")]
    pub author_id: i64,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Comment> for CommentResponse {
    fn from(comment: Comment) -> Self {
        Self {
            id: comment.id,
            entity_type: comment.entity_type,
            entity_id: comment.entity_id,
            author_id: comment.author_id,
            body: comment.body,
            created_at: comment.created_at,
            updated_at: comment.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub entity_type: String,
    #[serde(with = "ids")]
    pub entity_id: i64,
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub entity_type: String,
    pub entity_id: i64,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

fn validate_entity_type(entity_type: &str) -> Result<()> {
    if COMMENTABLE_TYPES.contains(&entity_type) {
        Ok(())
    } else {
        Err(AppError::Validation {
            message: "Invalid comment target".to_string(),
            details: vec![FieldError::new(
                "entity_type",
                format!("entity type must be one of {:?}", COMMENTABLE_TYPES),
            )],
        })
    }
}

pub async fn list_comments(
    State(state): State<AppState>,
    ctx: AuthContext,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<CommentResponse>>> {
    validate_entity_type(&query.entity_type)?;

    let params = PageParams {
        page: query.page,
        limit: query.limit,
    };
    let page = state
        .comments
        .list_for_entity(ctx.tenant_id, &query.entity_type, query.entity_id, params)
        .await?;
    Ok(Json(page.map(CommentResponse::from)))
}

#[tracing::instrument(
    name = "http.create_comment",
    skip(state, ctx, request),
    fields(entity_type = %request.entity_type, entity_id = request.entity_id)
)]
pub async fn create_comment(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(request): Json<CreateCommentRequest>,
) -> Result<Json<CommentResponse>> {
    require_write(&ctx)?;
    validate_entity_type(&request.entity_type)?;

    if request.body.trim().is_empty() {
        return Err(AppError::invalid_field("body", "comment body must not be empty"));
    }

    let comment = state
        .comments
        .create(
            ctx.tenant_id,
            ctx.user_id,
            &request.entity_type,
            request.entity_id,
            request.body.trim(),
        )
        .await?;

    state
        .change_logger
        .record(
            ctx.tenant_id,
            ctx.user_id,
            Change::created("comment", comment.id, &comment),
        )
        .await;

    state.event_bus.emit(DomainEvent::CommentAdded {
        tenant_id: ctx.tenant_id,
        actor_id: ctx.user_id,
        comment_id: comment.id,
        entity_type: comment.entity_type.clone(),
        entity_id: comment.entity_id,
    });

    Ok(Json(CommentResponse::from(comment)))
}

/// DELETE /comments/{id} - author or admin only
pub async fn delete_comment(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>> {
    require_write(&ctx)?;

    let comment = state.comments.fetch(ctx.tenant_id, id).await?;
    if comment.author_id != ctx.user_id && !ctx.is_admin() {
        return Err(AppError::Forbidden(
            "Only the author or an admin may delete a comment".to_string(),
        ));
    }

    let before = state.comments.soft_delete(ctx.tenant_id, id).await?;

    state
        .change_logger
        .record(
            ctx.tenant_id,
            ctx.user_id,
            Change::deleted("comment", id, &before),
        )
        .await;

    Ok(Json(serde_json::json!({ "deleted": true })))
}
