//! Signed access tokens (HS256 JWT).

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use serde::{Deserialize, Serialize};

const JWT_ALGORITHM: Algorithm = Algorithm::HS256;

/// Purpose of a token, carried as the `type` claim. Claims naming any other
/// type fail to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Auth,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Unique token id, used for revocation
    pub jti: String,
}

#[derive(Debug)]
pub struct IssuedToken {
    pub token: String,
    pub claims: Claims,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,
    #[error("invalid token: {0}")]
    Invalid(jsonwebtoken::errors::Error),
}

/// Generate a random token id.
pub fn generate_token_id() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

/// Signing and verification keys plus the access token lifetime.
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenKeys {
    #[must_use]
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token of the given type valid from now.
    pub fn issue(&self, user_id: i64, token_type: TokenType) -> Result<IssuedToken> {
        self.issue_at(user_id, token_type, Utc::now().timestamp())
    }

    /// Issue a token as if it had been created at `issued_at`.
    pub fn issue_at(
        &self,
        user_id: i64,
        token_type: TokenType,
        issued_at: i64,
    ) -> Result<IssuedToken> {
        let ttl = i64::try_from(self.ttl.as_secs()).context("Token lifetime out of range")?;
        let claims = Claims {
            user_id,
            token_type,
            iat: issued_at,
            exp: issued_at + ttl,
            jti: generate_token_id(),
        };

        let token = encode(&Header::new(JWT_ALGORITHM), &claims, &self.encoding)
            .context("Failed to sign token")?;

        Ok(IssuedToken { token, claims })
    }

    /// Verify signature and expiry and return the claims.
    pub fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(JWT_ALGORITHM);
        validation.leeway = 0;

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> TokenKeys {
        TokenKeys::new(b"unit-test-secret-unit-test-secret", Duration::from_secs(3600))
    }

    #[test]
    fn test_issue_and_decode() {
        let keys = keys();
        let issued = keys.issue(42, TokenType::Auth).unwrap();

        let claims = keys.decode(&issued.token).unwrap();
        assert_eq!(claims.token_type, TokenType::Auth);
        assert_eq!(claims.user_id, 42);
        assert_eq!(claims.jti, issued.claims.jti);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_expired_token_rejected() {
        let keys = keys();
        let two_hours_ago = Utc::now().timestamp() - 7200;
        let issued = keys.issue_at(1, TokenType::Auth, two_hours_ago).unwrap();

        assert!(matches!(keys.decode(&issued.token), Err(TokenError::Expired)));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let issued = keys().issue(1, TokenType::Auth).unwrap();
        let other = TokenKeys::new(b"another-secret-another-secret-xx", Duration::from_secs(60));

        assert!(matches!(other.decode(&issued.token), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn test_wrong_type_rejected() {
        let now = Utc::now().timestamp();
        let claims = serde_json::json!({
            "user_id": 1,
            "type": "reset",
            "iat": now,
            "exp": now + 3600,
            "jti": generate_token_id(),
        });
        let token = encode(
            &Header::new(JWT_ALGORITHM),
            &claims,
            &EncodingKey::from_secret(b"unit-test-secret-unit-test-secret"),
        )
        .unwrap();

        assert!(matches!(keys().decode(&token), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn test_token_ids_are_unique() {
        assert_ne!(generate_token_id(), generate_token_id());
        assert_eq!(generate_token_id().len(), 32);
    }
}
