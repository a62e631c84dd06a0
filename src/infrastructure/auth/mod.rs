mod claims;
mod context;
mod jwt;
mod token;

pub use claims::Claims;
pub use context::{AuthContext, UserRole};
pub use jwt::JwtValidator;
pub use token::{generate_token, hash_token, is_personal_token, TOKEN_PREFIX};
