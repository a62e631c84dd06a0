//! User rows.
//!
//! Table:
//! - `users(id, tenant_id, email, display_name, role, is_active,
//!   created_at, updated_at, deleted_at)`

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use crate::domain::pagination::{Page, PageParams};
use crate::error::{AppError, Result};

use super::conflict_on_unique;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub tenant_id: i64,
    pub email: String,
    pub display_name: String,
    pub role: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct NewUser {
    pub email: String,
    pub display_name: String,
    pub role: String,
}

#[derive(Debug, Default)]
pub struct UpdateUser {
    pub display_name: Option<String>,
    pub role: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Clone)]
pub struct UserStore {
    pool: PgPool,
}

impl UserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, tenant_id: i64, new: NewUser) -> Result<User> {
        sqlx::query_as(
            r#"
            INSERT INTO users (tenant_id, email, display_name, role, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, TRUE, NOW(), NOW())
            RETURNING id, tenant_id, email, display_name, role, is_active,
                      created_at, updated_at, deleted_at
            "#,
        )
        .bind(tenant_id)
        .bind(&new.email)
        .bind(&new.display_name)
        .bind(&new.role)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, &format!("User '{}' already exists", new.email)))
    }

    pub async fn list(&self, tenant_id: i64, params: PageParams) -> Result<Page<User>> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users WHERE tenant_id = $1 AND deleted_at IS NULL",
        )
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await?;

        let items: Vec<User> = sqlx::query_as(
            r#"
            SELECT id, tenant_id, email, display_name, role, is_active,
                   created_at, updated_at, deleted_at
            FROM users
            WHERE tenant_id = $1 AND deleted_at IS NULL
            ORDER BY id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(tenant_id)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(items, params, total))
    }

    pub async fn fetch(&self, tenant_id: i64, id: i64) -> Result<User> {
        let user: Option<User> = sqlx::query_as(
            r#"
            SELECT id, tenant_id, email, display_name, role, is_active,
                   created_at, updated_at, deleted_at
            FROM users
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match user {
            Some(u) if u.deleted_at.is_some() => {
                Err(AppError::Gone(format!("User {} is deleted", id)))
            }
            Some(u) => Ok(u),
            None => Err(AppError::NotFound(format!("User {} not found", id))),
        }
    }

    /// Lookup for the auth middleware: active, non-deleted user by ID.
    pub async fn fetch_active(&self, id: i64) -> Result<User> {
        let user: Option<User> = sqlx::query_as(
            r#"
            SELECT id, tenant_id, email, display_name, role, is_active,
                   created_at, updated_at, deleted_at
            FROM users
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match user {
            Some(u) if !u.is_active => Err(AppError::Auth("User is deactivated".to_string())),
            Some(u) => Ok(u),
            None => Err(AppError::Auth("Unknown user".to_string())),
        }
    }

    pub async fn update(&self, tenant_id: i64, id: i64, update: UpdateUser) -> Result<User> {
        // Read first so that PATCH semantics and 404/410 mapping stay uniform.
        let current = self.fetch(tenant_id, id).await?;

        let user: User = sqlx::query_as(
            r#"
            UPDATE users
            SET display_name = $3, role = $4, is_active = $5, updated_at = NOW()
            WHERE tenant_id = $1 AND id = $2 AND deleted_at IS NULL
            RETURNING id, tenant_id, email, display_name, role, is_active,
                      created_at, updated_at, deleted_at
            "#,
        )
        .bind(tenant_id)
        .bind(id)
        .bind(update.display_name.unwrap_or(current.display_name))
        .bind(update.role.unwrap_or(current.role))
        .bind(update.is_active.unwrap_or(current.is_active))
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn soft_delete(&self, tenant_id: i64, id: i64) -> Result<User> {
        let before = self.fetch(tenant_id, id).await?;

        sqlx::query(
            "UPDATE users SET deleted_at = NOW(), updated_at = NOW() WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant_id)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(before)
    }
}
