//! Access token codec
//!
//! Tokens are compact HS256 JWTs: `base64url(header).base64url(claims).base64url(hmac)`.
//! Signature checks are delegated to `jsonwebtoken`; expiry is checked here
//! against an explicit clock so `now > exp` is the only expiry rule.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

use super::models::Claims;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("invalid token")]
    Invalid,

    #[error("token expired")]
    Expired,

    #[error("failed to sign token: {0}")]
    Signing(String),
}

#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec").field("ttl", &self.ttl).finish()
    }
}

impl TokenCodec {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    /// Issue an access token for `user_id` valid for the configured lifetime
    pub fn issue(&self, user_id: &str, email: &str) -> Result<String, TokenError> {
        self.issue_at(user_id, email, Utc::now().timestamp())
    }

    pub fn issue_at(&self, user_id: &str, email: &str, now: i64) -> Result<String, TokenError> {
        let claims = Claims {
            user_id: user_id.to_string(),
            email: email.to_string(),
            iat: now,
            exp: now + self.ttl.num_seconds(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Verify signature and expiry, returning the embedded claims
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, Utc::now().timestamp())
    }

    pub fn verify_at(&self, token: &str, now: i64) -> Result<Claims, TokenError> {
        if token.split('.').count() != 3 {
            return Err(TokenError::Invalid);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.required_spec_claims.clear();

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|_| TokenError::Invalid)?
            .claims;

        if now > claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }
}
