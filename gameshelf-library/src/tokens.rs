use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What a session token asserts about its bearer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// The user id
    pub sub: String,
    pub username: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub secret: String,
    pub expiration_days: i64,
}

impl TokenConfig {
    pub const DEFAULT_EXPIRATION_DAYS: i64 = 7;

    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            expiration_days: Self::DEFAULT_EXPIRATION_DAYS,
        }
    }

    pub fn with_expiration_days(mut self, days: i64) -> Self {
        self.expiration_days = days;
        self
    }
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Token has expired")]
    Expired,
    #[error("Token is invalid")]
    Invalid,
    #[error("Could not sign token: {0}")]
    Encoding(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid,
        }
    }
}

/// Issues and verifies stateless session tokens (HS256 JWTs)
pub struct Tokens {
    config: TokenConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl Tokens {
    pub fn new(config: TokenConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        // Tokens expire exactly at exp
        let mut validation = Validation::default();
        validation.leeway = 0;

        Self {
            config,
            encoding_key,
            decoding_key,
            validation,
        }
    }

    pub fn issue(&self, user_id: &str, username: &str) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            username: username.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::days(self.config.expiration_days)).timestamp(),
        };

        self.sign(&claims)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        Ok(data.claims)
    }

    /// Like [Tokens::verify], but a missing or bad token is simply no claims
    pub fn verify_optional(&self, token: Option<&str>) -> Option<Claims> {
        token.and_then(|t| self.verify(t).ok())
    }

    fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::default(), claims, &self.encoding_key)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn tokens_with(secret: &str) -> Tokens {
        Tokens::new(TokenConfig::new(secret))
    }

    #[test]
    fn test_issue_and_verify() {
        let tokens = tokens_with("a-secret-long-enough-for-tests");

        let token = tokens.issue("user-1", "ana").unwrap();
        let claims = tokens.verify(&token).unwrap();

        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.username, "ana");
        assert_eq!(claims.exp - claims.iat, 7 * 24 * 60 * 60);
    }

    #[test]
    fn test_expired_and_forged_are_distinct() {
        let tokens = tokens_with("a-secret-long-enough-for-tests");

        let now = Utc::now();
        let expired = tokens
            .sign(&Claims {
                sub: "user-1".to_string(),
                username: "ana".to_string(),
                iat: (now - Duration::days(8)).timestamp(),
                exp: (now - Duration::days(1)).timestamp(),
            })
            .unwrap();

        assert!(matches!(tokens.verify(&expired), Err(TokenError::Expired)));

        let forged = tokens_with("another-secret-entirely")
            .issue("user-1", "ana")
            .unwrap();

        assert!(matches!(tokens.verify(&forged), Err(TokenError::Invalid)));
        assert!(matches!(tokens.verify("garbage"), Err(TokenError::Invalid)));
    }

    #[test]
    fn test_expiry_has_no_grace_period() {
        let tokens = tokens_with("a-secret-long-enough-for-tests");

        let now = Utc::now();
        let just_expired = tokens
            .sign(&Claims {
                sub: "user-1".to_string(),
                username: "ana".to_string(),
                iat: (now - Duration::days(7)).timestamp(),
                exp: (now - Duration::seconds(5)).timestamp(),
            })
            .unwrap();

        assert!(matches!(
            tokens.verify(&just_expired),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn test_verify_optional_never_fails() {
        let tokens = tokens_with("a-secret-long-enough-for-tests");
        let token = tokens.issue("user-1", "ana").unwrap();

        assert!(tokens.verify_optional(None).is_none());
        assert!(tokens.verify_optional(Some("garbage")).is_none());
        assert_eq!(
            tokens.verify_optional(Some(&token)).map(|c| c.sub),
            Some("user-1".to_string())
        );
    }
}
