//! Personal access token generation and hashing.
//!
//! The token secret is handed to the client exactly once at creation time;
//! only its SHA-256 hash is persisted.

use rand::RngCore;
use sha2::{Digest, Sha256};

/// Prefix identifying QaHub personal access tokens in an Authorization header.
pub const TOKEN_PREFIX: &str = "qah_";

/// Number of random bytes in a token secret (40 hex chars).
const TOKEN_BYTES: usize = 20;

/// Generate a new personal access token secret.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    format!("{}{}", TOKEN_PREFIX, hex::encode(bytes))
}

/// Hash a token secret for storage and lookup.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Whether a bearer credential looks like a personal access token rather
/// than a JWT.
pub fn is_personal_token(bearer: &str) -> bool {
    bearer.starts_with(TOKEN_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_token_shape() {
        let token = generate_token();
        assert!(token.starts_with(TOKEN_PREFIX));
        assert_eq!(token.len(), TOKEN_PREFIX.len() + TOKEN_BYTES * 2);
        assert!(is_personal_token(&token));
    }

    #[test]
    fn test_tokens_are_unique() {
        assert_ne!(generate_token(), generate_token());
    }

    #[test]
    fn test_hash_is_stable_hex() {
        let token = "qah_0123456789abcdef0123456789abcdef01234567";
        let hash = hash_token(token);
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, hash_token(token));
        assert_ne!(hash, hash_token("qah_other"));
    }

    #[test]
    fn test_jwt_is_not_personal_token() {
        assert!(!is_personal_token("eyJhbGciOiJIUzI1NiJ9.e30.sig"));
    }
}
