//! Audit log endpoints.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::AuthContext;
use crate::domain::ids;
use crate::domain::pagination::{Page, PageParams};
use crate::error::Result;
use crate::server::AppState;
use crate::store::{AuditLogEntry, AuditLogFilter};

pub fn routes() -> Router<AppState> {
    Router::new().route("/audit-logs", get(list_audit_logs))
}

#[derive(Debug, Serialize)]
pub struct AuditLogResponse {
    #[serde(with = "ids")]
    pub id: i64,
    #[serde(with = "ids")]
    pub actor_id: i64,
    pub action: String,
    pub entity_type: String,
    #[serde(with = "ids")]
    pub entity_id: i64,
    pub before_state: Option<serde_json::Value>,
    pub after_state: Option<serde_json::Value>,
    pub changed_fields: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
}

impl From<AuditLogEntry> for AuditLogResponse {
    fn from(entry: AuditLogEntry) -> Self {
        Self {
            id: entry.id,
            actor_id: entry.actor_id,
            action: entry.action,
            entity_type: entry.entity_type,
            entity_id: entry.entity_id,
            before_state: entry.before_state,
            after_state: entry.after_state,
            changed_fields: entry.changed_fields,
            created_at: entry.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub entity_type: Option<String>,
    pub entity_id: Option<i64>,
    pub actor_id: Option<i64>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn list_audit_logs(
    State(state): State<AppState>,
    ctx: AuthContext,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<AuditLogResponse>>> {
    let params = PageParams {
        page: query.page,
        limit: query.limit,
    };
    let page = state
        .audit
        .list(
            ctx.tenant_id,
            AuditLogFilter {
                entity_type: query.entity_type,
                entity_id: query.entity_id,
                actor_id: query.actor_id,
            },
            params,
        )
        .await?;
    Ok(Json(page.map(AuditLogResponse::from)))
}
