use serde::{Deserialize, Serialize};

/// Role of an authenticated user within its tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Member,
    Viewer,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Member => "member",
            UserRole::Viewer => "viewer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(UserRole::Admin),
            "member" => Some(UserRole::Member),
            "viewer" => Some(UserRole::Viewer),
            _ => None,
        }
    }

    /// Whether this role may mutate resources.
    pub fn can_write(&self) -> bool {
        matches!(self, UserRole::Admin | UserRole::Member)
    }
}

/// Authenticated request context, injected as a request extension by the
/// bearer middleware and consumed by every handler.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: i64,
    pub tenant_id: i64,
    pub role: UserRole,
}

impl AuthContext {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip() {
        for role in [UserRole::Admin, UserRole::Member, UserRole::Viewer] {
            assert_eq!(UserRole::parse(role.as_str()), Some(role));
        }
        assert_eq!(UserRole::parse("owner"), None);
    }

    #[test]
    fn test_write_permission() {
        assert!(UserRole::Admin.can_write());
        assert!(UserRole::Member.can_write());
        assert!(!UserRole::Viewer.can_write());
    }
}
