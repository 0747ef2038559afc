use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use shared::domain::{Role, UserId};

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub secret: String,
    pub ttl_seconds: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

pub fn subject_for(user_id: UserId) -> String {
    format!("user:{}", user_id.0)
}

pub fn mint_token(
    cfg: &SessionConfig,
    user_id: UserId,
    role: Role,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let exp = now + Duration::seconds(cfg.ttl_seconds);
    let claims = Claims {
        sub: subject_for(user_id),
        role,
        iat: now.timestamp(),
        exp: exp.timestamp(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(cfg.secret.as_bytes()),
    )
}

/// Checks signature and expiry and returns the user the token was minted for.
/// The role claim is informational; callers reload the account.
pub fn verify_token(cfg: &SessionConfig, token: &str) -> Option<UserId> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(cfg.secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .ok()?;
    data.claims
        .sub
        .strip_prefix("user:")
        .and_then(|id| id.parse::<i64>().ok())
        .map(UserId)
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
