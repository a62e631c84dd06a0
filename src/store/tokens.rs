//! Personal access token rows.
//!
//! Tables:
//! - `personal_access_tokens(id, user_id, name, token_hash, last_used_at,
//!   expires_at, revoked_at, created_at)`
//!
//! Only the SHA-256 hash of a token secret is stored; verification is a
//! lookup by hash joined to the owning user row.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PersonalAccessToken {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    #[serde(skip_serializing)]
    pub token_hash: String,
    pub last_used_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Joined row used by the bearer middleware.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TokenAuthRow {
    pub token_id: i64,
    pub user_id: i64,
    pub tenant_id: i64,
    pub role: String,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct TokenStore {
    pool: PgPool,
}

impl TokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        user_id: i64,
        name: &str,
        token_hash: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<PersonalAccessToken> {
        let token: PersonalAccessToken = sqlx::query_as(
            r#"
            INSERT INTO personal_access_tokens (user_id, name, token_hash, expires_at, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            RETURNING id, user_id, name, token_hash, last_used_at, expires_at, revoked_at, created_at
            "#,
        )
        .bind(user_id)
        .bind(name)
        .bind(token_hash)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(token)
    }

    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<PersonalAccessToken>> {
        let tokens: Vec<PersonalAccessToken> = sqlx::query_as(
            r#"
            SELECT id, user_id, name, token_hash, last_used_at, expires_at, revoked_at, created_at
            FROM personal_access_tokens
            WHERE user_id = $1 AND revoked_at IS NULL
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(tokens)
    }

    pub async fn revoke(&self, user_id: i64, id: i64) -> Result<()> {
        let affected = sqlx::query(
            r#"
            UPDATE personal_access_tokens
            SET revoked_at = NOW()
            WHERE id = $1 AND user_id = $2 AND revoked_at IS NULL
            "#,
        )
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if affected == 0 {
            return Err(AppError::NotFound(format!("Token {} not found", id)));
        }

        Ok(())
    }

    /// Look up a token by secret hash for authentication. Returns the token
    /// joined with its owning user; the caller checks expiry/revocation.
    pub async fn find_by_hash(&self, token_hash: &str) -> Result<Option<TokenAuthRow>> {
        let row: Option<TokenAuthRow> = sqlx::query_as(
            r#"
            SELECT t.id AS token_id, u.id AS user_id, u.tenant_id, u.role, u.is_active,
                   t.expires_at, t.revoked_at
            FROM personal_access_tokens t
            JOIN users u ON u.id = t.user_id AND u.deleted_at IS NULL
            WHERE t.token_hash = $1
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Update the token's last-used timestamp. Failures are logged and
    /// swallowed; auth never blocks on this write.
    pub async fn touch_last_used(&self, token_id: i64) {
        let result = sqlx::query(
            "UPDATE personal_access_tokens SET last_used_at = NOW() WHERE id = $1",
        )
        .bind(token_id)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            tracing::warn!(
                error = %e,
                token_id = token_id,
                "Failed to update token last_used_at"
            );
        }
    }
}

impl TokenAuthRow {
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        if self.revoked_at.is_some() {
            return false;
        }
        match self.expires_at {
            Some(expires_at) => expires_at > now,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn auth_row(expires_at: Option<DateTime<Utc>>, revoked_at: Option<DateTime<Utc>>) -> TokenAuthRow {
        TokenAuthRow {
            token_id: 1,
            user_id: 2,
            tenant_id: 3,
            role: "member".to_string(),
            is_active: true,
            expires_at,
            revoked_at,
        }
    }

    #[test]
    fn test_usable_without_expiry() {
        assert!(auth_row(None, None).is_usable(Utc::now()));
    }

    #[test]
    fn test_expired_token_rejected() {
        let now = Utc::now();
        let row = auth_row(Some(now - Duration::hours(1)), None);
        assert!(!row.is_usable(now));
    }

    #[test]
    fn test_revoked_token_rejected() {
        let now = Utc::now();
        let row = auth_row(None, Some(now));
        assert!(!row.is_usable(now));
    }
}
