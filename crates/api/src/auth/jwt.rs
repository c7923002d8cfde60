//! JWT validation for identity-provider session tokens
//!
//! The identity provider mints HS256 tokens with the provider user id in
//! `sub`; the API only validates them. Account rows are created lazily on
//! first authenticated access.

use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Identity-provider user id.
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    pub exp: i64,
}

#[derive(Clone)]
pub struct JwtManager {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtManager {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::default();
        validation.validate_exp = true;
        // Issuer varies per identity-provider environment
        validation.validate_aud = false;

        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        decode::<Claims>(token, &self.decoding_key, &self.validation).map(|data| data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use time::OffsetDateTime;

    fn mint(secret: &str, claims: &Claims) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn claims(exp_offset_secs: i64) -> Claims {
        Claims {
            sub: "user_123".to_string(),
            email: Some("owner@example.com".to_string()),
            name: Some("Owner".to_string()),
            exp: OffsetDateTime::now_utc().unix_timestamp() + exp_offset_secs,
        }
    }

    #[test]
    fn verifies_valid_token() {
        let manager = JwtManager::new("test-secret");
        let token = mint("test-secret", &claims(3600));

        let verified = manager.verify(&token).unwrap();
        assert_eq!(verified.sub, "user_123");
        assert_eq!(verified.email.as_deref(), Some("owner@example.com"));
    }

    #[test]
    fn rejects_wrong_secret() {
        let manager = JwtManager::new("test-secret");
        let token = mint("other-secret", &claims(3600));
        assert!(manager.verify(&token).is_err());
    }

    #[test]
    fn rejects_expired_token() {
        let manager = JwtManager::new("test-secret");
        let token = mint("test-secret", &claims(-3600));
        assert!(manager.verify(&token).is_err());
    }
}
