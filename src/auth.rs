//! Bearer token checks for the WebSocket endpoint (HS256 JWT).

use crate::error::GameError;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    user_id: String,
    exp: i64,
    iat: i64,
}

#[derive(Clone)]
pub struct TokenVerifier {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// The user id carried by a valid, unexpired token.
    pub fn verify(&self, token: &str) -> Result<String, GameError> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|err| {
            debug!(%err, "Token rejected");
            GameError::Unauthenticated
        })?;
        if data.claims.user_id.is_empty() {
            return Err(GameError::Unauthenticated);
        }
        Ok(data.claims.user_id)
    }

    pub fn issue(&self, user_id: &str, ttl: Duration) -> Result<String, GameError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            user_id: user_id.to_string(),
            iat: now,
            exp: now + ttl.as_secs() as i64,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|err| GameError::InvalidState(format!("cannot sign token: {err}")))
    }
}

/// Token from `Authorization: Bearer <t>`, else from the `token` query parameter.
/// Browsers cannot set headers on a WebSocket handshake.
pub fn token_from_request<'a>(headers: &'a HeaderMap, query_token: Option<&'a str>) -> Option<&'a str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .or(query_token.filter(|token| !token.is_empty()))
}
