//! Notification endpoints.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::AuthContext;
use crate::domain::ids;
use crate::domain::pagination::{Page, PageParams};
use crate::error::Result;
use crate::server::AppState;
use crate::store::Notification;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(list_notifications))
        .route("/notifications/read-all", post(mark_all_read))
        .route("/notifications/{id}/read", post(mark_read))
}

#[derive(Debug, Serialize)]
pub struct NotificationResponse {
    #[serde(with = "ids")]
    pub id: i64,
    pub kind: String,
    pub payload: serde_json::Value,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<Notification> for NotificationResponse {
    fn from(notification: Notification) -> Self {
        Self {
            id: notification.id,
            kind: notification.kind,
            payload: notification.payload,
            read_at: notification.read_at,
            created_at: notification.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub unread_only: bool,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn list_notifications(
    State(state): State<AppState>,
    ctx: AuthContext,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<NotificationResponse>>> {
    let params = PageParams {
        page: query.page,
        limit: query.limit,
    };
    let page = state
        .notifications
        .list(ctx.tenant_id, ctx.user_id, query.unread_only, params)
        .await?;
    Ok(Json(page.map(NotificationResponse::from)))
}

pub async fn mark_read(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<NotificationResponse>> {
    let notification = state
        .notifications
        .mark_read(ctx.tenant_id, ctx.user_id, id)
        .await?;
    Ok(Json(NotificationResponse::from(notification)))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    ctx: AuthContext,
) -> Result<Json<serde_json::Value>> {
    let updated = state
        .notifications
        .mark_all_read(ctx.tenant_id, ctx.user_id)
        .await?;
    Ok(Json(serde_json::json!({ "marked_read": updated })))
}
