use jsonwebtoken::{decode, DecodingKey, Validation};

use crate::config::JwtConfig;
use crate::error::AppError;

use super::Claims;

pub struct JwtValidator {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtValidator {
    pub fn new(config: &JwtConfig) -> Self {
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        let mut validation = Validation::default();

        if let Some(ref issuer) = config.issuer {
            validation.set_issuer(&[issuer]);
        }

        if let Some(ref audience) = config.audience {
            validation.set_audience(&[audience]);
        }

        Self {
            decoding_key,
            validation,
        }
    }

    pub fn validate(&self, token: &str) -> Result<Claims, AppError> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| AppError::Auth(format!("Invalid token: {}", e)))?;

        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn create_test_config() -> JwtConfig {
        JwtConfig {
            secret: "test-secret-key-for-testing".to_string(),
            issuer: None,
            audience: None,
        }
    }

    fn create_test_token(claims: &Claims, secret: &str) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_valid_token() {
        let config = create_test_config();
        let validator = JwtValidator::new(&config);

        let claims = Claims {
            sub: "42".to_string(),
            exp: chrono::Utc::now().timestamp() + 3600,
            iat: chrono::Utc::now().timestamp(),
            tenant_id: Some("7".to_string()),
            roles: vec!["member".to_string()],
            extra: Default::default(),
        };

        let token = create_test_token(&claims, &config.secret);
        let result = validator.validate(&token);

        assert!(result.is_ok());
        let validated = result.unwrap();
        assert_eq!(validated.user_id(), Some(42));
        assert_eq!(validated.tenant_id(), Some(7));
    }

    #[test]
    fn test_invalid_token() {
        let config = create_test_config();
        let validator = JwtValidator::new(&config);

        let result = validator.validate("invalid-token");
        assert!(result.is_err());
    }

    #[test]
    fn test_non_numeric_subject() {
        let claims = Claims {
            sub: "not-a-number".to_string(),
            exp: 0,
            iat: 0,
            tenant_id: None,
            roles: vec![],
            extra: Default::default(),
        };
        assert_eq!(claims.user_id(), None);
        assert_eq!(claims.tenant_id(), None);
    }
}
