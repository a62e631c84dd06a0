use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID, decimal string)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Tenant ID (decimal string)
    #[serde(default)]
    pub tenant_id: Option<String>,
    /// User roles
    #[serde(default)]
    pub roles: Vec<String>,
    /// Additional custom claims
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl Claims {
    /// Parse the subject into a numeric user ID.
    pub fn user_id(&self) -> Option<i64> {
        self.sub.parse().ok()
    }

    /// Parse the tenant claim into a numeric tenant ID.
    pub fn tenant_id(&self) -> Option<i64> {
        self.tenant_id.as_deref().and_then(|t| t.parse().ok())
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn is_expired(&self) -> bool {
        let now = chrono::Utc::now().timestamp();
        self.exp < now
    }
}
