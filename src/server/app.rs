use axum::{extract::DefaultBodyLimit, middleware, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

use crate::api::{api_routes, public_routes};

use super::middleware::bearer_auth;
use super::AppState;

pub fn create_app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let max_body = state.settings.server.max_body_bytes;

    let protected = api_routes()
        .route_layer(middleware::from_fn_with_state(state.clone(), bearer_auth));

    Router::new()
        // Health & metrics stay unauthenticated
        .merge(public_routes())
        .nest("/api/v1", protected)
        // Add middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body))
        // Add state
        .with_state(state)
}
