//! Personal access token endpoints.
//!
//! The token secret appears in exactly one response: creation. Every other
//! response carries metadata only.

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::{generate_token, hash_token, AuthContext};
use crate::domain::ids;
use crate::error::{AppError, Result};
use crate::server::AppState;
use crate::store::PersonalAccessToken;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/tokens", get(list_tokens).post(create_token))
        .route("/tokens/{id}", axum::routing::delete(revoke_token))
}

#[derive(Debug, Deserialize)]
pub struct CreateTokenRequest {
    pub name: String,
    pub expires_in_days: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct CreatedTokenResponse {
    #[serde(with = "ids")]
    pub id: i64,
    pub name: String,
    /// The secret, shown only here.
    pub token: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    #[serde(with = "ids")]
    pub id: i64,
    pub name: String,
    pub last_used_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<PersonalAccessToken> for TokenResponse {
    fn from(token: PersonalAccessToken) -> Self {
        Self {
            id: token.id,
            name: token.name,
            last_used_at: token.last_used_at,
            expires_at: token.expires_at,
            created_at: token.created_at,
        }
    }
}

#[tracing::instrument(name = "http.create_token", skip(state, ctx, request))]
pub async fn create_token(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(request): Json<CreateTokenRequest>,
) -> Result<Json<CreatedTokenResponse>> {
    if request.name.trim().is_empty() {
        return Err(AppError::invalid_field("name", "token name must not be empty"));
    }
    if let Some(days) = request.expires_in_days {
        if days <= 0 {
            return Err(AppError::invalid_field(
                "expires_in_days",
                "expiry must be a positive number of days",
            ));
        }
    }

    let secret = generate_token();
    let expires_at = request
        .expires_in_days
        .map(|days| Utc::now() + Duration::days(days));

    let token = state
        .tokens
        .create(ctx.user_id, request.name.trim(), &hash_token(&secret), expires_at)
        .await?;

    tracing::info!(user_id = ctx.user_id, token_id = token.id, "Personal access token created");

    Ok(Json(CreatedTokenResponse {
        id: token.id,
        name: token.name,
        token: secret,
        expires_at: token.expires_at,
        created_at: token.created_at,
    }))
}

pub async fn list_tokens(
    State(state): State<AppState>,
    ctx: AuthContext,
) -> Result<Json<Vec<TokenResponse>>> {
    let tokens = state.tokens.list_for_user(ctx.user_id).await?;
    Ok(Json(tokens.into_iter().map(TokenResponse::from).collect()))
}

pub async fn revoke_token(
    State(state): State<AppState>,
    ctx: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>> {
    state.tokens.revoke(ctx.user_id, id).await?;

    tracing::info!(user_id = ctx.user_id, token_id = id, "Personal access token revoked");

    Ok(Json(serde_json::json!({ "revoked": true })))
}
