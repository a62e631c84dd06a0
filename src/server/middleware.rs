use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use crate::auth::{hash_token, is_personal_token, AuthContext, UserRole};
use crate::error::{AppError, Result};

use super::AppState;

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(req: &Request<Body>) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Bearer authentication middleware.
///
/// Accepts either a JWT session token or a personal access token. On
/// success an `AuthContext` is injected as a request extension; the user
/// row must exist and be active either way.
pub async fn bearer_auth(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response> {
    let token = extract_bearer_token(&req)
        .ok_or_else(|| AppError::Auth("Missing bearer token".to_string()))?;

    let ctx = if is_personal_token(token) {
        authenticate_personal_token(&state, token).await?
    } else {
        authenticate_jwt(&state, token).await?
    };

    req.extensions_mut().insert(ctx);
    Ok(next.run(req).await)
}

async fn authenticate_personal_token(state: &AppState, token: &str) -> Result<AuthContext> {
    let hash = hash_token(token);

    let row = state
        .tokens
        .find_by_hash(&hash)
        .await?
        .ok_or_else(|| AppError::Auth("Invalid token".to_string()))?;

    if !row.is_usable(Utc::now()) {
        return Err(AppError::Auth("Token is revoked or expired".to_string()));
    }
    if !row.is_active {
        return Err(AppError::Auth("User is deactivated".to_string()));
    }

    let role = UserRole::parse(&row.role)
        .ok_or_else(|| AppError::Internal(format!("Unknown role '{}'", row.role)))?;

    // Last-used bookkeeping must never delay or fail the request.
    let tokens = state.tokens.clone();
    let token_id = row.token_id;
    tokio::spawn(async move {
        tokens.touch_last_used(token_id).await;
    });

    Ok(AuthContext {
        user_id: row.user_id,
        tenant_id: row.tenant_id,
        role,
    })
}

async fn authenticate_jwt(state: &AppState, token: &str) -> Result<AuthContext> {
    let claims = state.jwt_validator.validate(token)?;

    let user_id = claims
        .user_id()
        .ok_or_else(|| AppError::Auth("Token subject is not a user id".to_string()))?;

    let user = state.users.fetch_active(user_id).await?;

    if let Some(claimed_tenant) = claims.tenant_id() {
        if claimed_tenant != user.tenant_id {
            tracing::warn!(
                user_id = user_id,
                claimed_tenant = claimed_tenant,
                actual_tenant = user.tenant_id,
                "JWT tenant claim does not match user row"
            );
            return Err(AppError::Auth("Token tenant mismatch".to_string()));
        }
    }

    let role = UserRole::parse(&user.role)
        .ok_or_else(|| AppError::Internal(format!("Unknown role '{}'", user.role)))?;

    Ok(AuthContext {
        user_id,
        tenant_id: user.tenant_id,
        role,
    })
}
