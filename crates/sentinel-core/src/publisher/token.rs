//! Short-lived signed token presented on delivery calls.

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SentinelError};

pub const TOKEN_SUBJECT: &str = "publisher";
pub const TOKEN_TTL_SECS: i64 = 3600;

/// Used when the configured secret variable is unset. Never use outside development.
const DEV_SECRET: &str = "sentinel-dev-secret";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Read the signing secret from `var`, falling back to the development secret.
pub fn secret_from_env(var: &str) -> String {
    match std::env::var(var) {
        Ok(secret) if !secret.is_empty() => secret,
        _ => {
            tracing::warn!(var, "signing secret not set, using development secret");
            DEV_SECRET.to_string()
        }
    }
}

/// Mint an HS256 token valid for one hour from `now`.
pub fn mint(secret: &[u8], now: DateTime<Utc>) -> Result<String> {
    let iat = now.timestamp();
    let claims = Claims {
        sub: TOKEN_SUBJECT.to_string(),
        iat,
        exp: iat + TOKEN_TTL_SECS,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| SentinelError::Token(e.to_string()))
}

pub fn verify(token: &str, secret: &[u8]) -> Result<Claims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.sub = Some(TOKEN_SUBJECT.to_string());
    decode::<Claims>(token, &DecodingKey::from_secret(secret), &validation)
        .map(|data| data.claims)
        .map_err(|e| SentinelError::Token(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minted_token_verifies_with_one_hour_expiry() {
        let now = Utc::now();
        let token = mint(b"k", now).unwrap();
        let claims = verify(&token, b"k").unwrap();
        assert_eq!(claims.sub, "publisher");
        assert_eq!(claims.iat, now.timestamp());
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = mint(b"right", Utc::now()).unwrap();
        assert!(matches!(verify(&token, b"wrong"), Err(SentinelError::Token(_))));
    }

    #[test]
    fn expired_token_is_rejected() {
        let issued = Utc::now() - chrono::Duration::hours(3);
        let token = mint(b"k", issued).unwrap();
        assert!(verify(&token, b"k").is_err());
    }
}
