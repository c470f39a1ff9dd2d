use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::config::AuthConfig;
use crate::db::models::Role;
use crate::error::AppError;

/// Signed token payload: subject user id plus a role snapshot taken at
/// issuance. The snapshot is trusted for ownership checks; admin endpoints
/// re-read the role from the users row instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl JwtKeys {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    /// Build keys from config, falling back to a random per-process secret.
    pub fn from_config(auth: &AuthConfig) -> Self {
        match &auth.secret {
            Some(secret) => Self::new(secret.as_bytes()),
            None => {
                tracing::warn!("No auth.secret configured, tokens will not survive a restart");
                let mut secret = [0u8; 32];
                rand::thread_rng().fill_bytes(&mut secret);
                Self::new(&secret)
            }
        }
    }

    pub fn issue(&self, user_id: &str, role: Role, hours: u64) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            role,
            iat: now.timestamp(),
            exp: (now + Duration::hours(hours as i64)).timestamp(),
        };
        jsonwebtoken::encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("Token signing failed: {}", e)))
    }

    /// Any structural, signature, or expiry failure collapses to 401.
    pub fn decode(&self, token: &str) -> Result<Claims, AppError> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| AppError::Unauthorized)
    }
}
