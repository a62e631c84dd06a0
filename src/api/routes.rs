use axum::{routing::get, Router};

use crate::server::AppState;

use super::health::{health, metrics, stats};

/// Unauthenticated endpoints.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/metrics", get(metrics))
}

/// Tenant-scoped resource routers, mounted under `/api/v1` behind the
/// bearer middleware.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(super::tenants::routes())
        .merge(super::users::routes())
        .merge(super::tokens::routes())
        .merge(super::projects::routes())
        .merge(super::repositories::routes())
        .merge(super::suites::routes())
        .merge(super::cases::routes())
        .merge(super::plans::routes())
        .merge(super::runs::routes())
        .merge(super::bugs::routes())
        .merge(super::comments::routes())
        .merge(super::notifications::routes())
        .merge(super::audit::routes())
        .merge(super::attachments::routes())
        .merge(super::integrations::routes())
}
