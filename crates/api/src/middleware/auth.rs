//! Worker session tokens.
//!
//! Workers present an HS256 token whose subject is their worker id. The
//! location route keys the upsert on that id, so a worker can only ever move
//! its own registration.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use beacon_common::error::AppError;

use crate::state::AppState;

const BEARER: &str = "Bearer ";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WorkerClaims {
    /// Worker id
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
}

/// The worker a request was made by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthWorker {
    pub worker_id: Uuid,
}

/// Issue a session token for `worker_id`, valid for `expiry_hours`.
pub fn issue_token(worker_id: Uuid, secret: &str, expiry_hours: u64) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = WorkerClaims {
        sub: worker_id.to_string(),
        exp: (now + Duration::hours(expiry_hours as i64)).timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Auth(format!("Failed to issue token: {}", e)))
}

/// Check a session token and return the worker it was issued to.
pub fn verify_token(token: &str, secret: &str) -> Result<AuthWorker, AppError> {
    let claims = decode::<WorkerClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| AppError::Auth(format!("Invalid token: {}", e)))?
    .claims;

    let worker_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| AppError::Auth("Token subject is not a worker id".to_string()))?;
    Ok(AuthWorker { worker_id })
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix(BEARER)
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

impl FromRequestParts<AppState> for AuthWorker {
    type Rejection = AppError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let verified = match bearer_token(parts) {
            Some(token) => verify_token(token, &state.config.jwt_secret),
            None => Err(AppError::Auth(
                "Missing or invalid Authorization header. Use 'Bearer <token>'".to_string(),
            )),
        };
        std::future::ready(verified)
    }
}
