//! Request extractors.

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::auth::AuthContext;
use crate::error::AppError;

impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or_else(|| AppError::Auth("Not authenticated".to_string()))
    }
}

/// Guard for mutating endpoints: viewers are read-only.
pub fn require_write(ctx: &AuthContext) -> Result<(), AppError> {
    if ctx.role.can_write() {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Viewer role cannot modify resources".to_string(),
        ))
    }
}

/// Guard for administration endpoints.
pub fn require_admin(ctx: &AuthContext) -> Result<(), AppError> {
    if ctx.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden("Admin role required".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::UserRole;

    fn ctx(role: UserRole) -> AuthContext {
        AuthContext {
            user_id: 1,
            tenant_id: 1,
            role,
        }
    }

    #[test]
    fn test_viewer_cannot_write() {
        assert!(require_write(&ctx(UserRole::Viewer)).is_err());
        assert!(require_write(&ctx(UserRole::Member)).is_ok());
        assert!(require_write(&ctx(UserRole::Admin)).is_ok());
    }

    #[test]
    fn test_only_admin_administers() {
        assert!(require_admin(&ctx(UserRole::Member)).is_err());
        assert!(require_admin(&ctx(UserRole::Admin)).is_ok());
    }
}
