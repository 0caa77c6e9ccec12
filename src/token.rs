// ABOUTME: Issues and verifies HMAC-signed bearer tokens that carry the owner's user id
// ABOUTME: Verification is stateless; callers still confirm the owner exists before trusting it

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token could not be signed: {0}")]
    Signing(String),
    #[error("token rejected: {0}")]
    Invalid(String),
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    user_id: i32,
    iat: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exp: Option<i64>,
}

pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Option<Duration>,
}

impl TokenService {
    /// Without a `ttl` tokens never expire.
    pub fn new(secret: &str, ttl: Option<Duration>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.required_spec_claims.clear();
        validation.validate_exp = ttl.is_some();
        if ttl.is_some() {
            validation.required_spec_claims.insert("exp".to_string());
        }

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        }
    }

    pub fn issue(&self, user_id: i32) -> Result<String, TokenError> {
        let now = Utc::now().timestamp();
        let exp = self
            .ttl
            .map(|ttl| {
                i64::try_from(ttl.as_secs())
                    .ok()
                    .and_then(|secs| now.checked_add(secs))
                    .ok_or_else(|| TokenError::Signing("token lifetime out of range".to_string()))
            })
            .transpose()?;
        let claims = Claims {
            user_id,
            iat: now,
            exp,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|err| TokenError::Signing(err.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<i32, TokenError> {
        decode::<Claims>(token.trim(), &self.decoding, &self.validation)
            .map(|data| data.claims.user_id)
            .map_err(|err| TokenError::Invalid(err.to_string()))
    }
}
