// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! JWT authentication middleware.

use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Session cookie name.
pub const SESSION_COOKIE: &str = "creator_token";

/// Session lifetime in seconds (30 days).
const SESSION_TTL_SECS: usize = 30 * 24 * 60 * 60;

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (YouTube channel ID)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
}

/// Authenticated user extracted from JWT.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
}

/// Middleware that requires valid JWT authentication.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // Try cookie first, then header
    let token = if let Some(cookie) = jar.get(SESSION_COOKIE) {
        cookie.value().to_string()
    } else {
        let auth_header = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok());

        match auth_header.and_then(|h| h.strip_prefix("Bearer ")) {
            Some(t) => t.to_string(),
            None => return Err(StatusCode::UNAUTHORIZED),
        }
    };

    let key = DecodingKey::from_secret(&state.config.jwt_signing_key);
    let validation = Validation::new(Algorithm::HS256);

    let token_data =
        decode::<Claims>(&token, &key, &validation).map_err(|_| StatusCode::UNAUTHORIZED)?;

    if token_data.claims.sub.is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    request.extensions_mut().insert(AuthUser {
        user_id: token_data.claims.sub,
    });

    Ok(next.run(request).await)
}

/// Create a JWT for a user session.
pub fn create_jwt(user_id: &str, signing_key: &[u8]) -> anyhow::Result<String> {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as usize;

    let claims = Claims {
        sub: user_id.to_string(),
        iat: now,
        exp: now + SESSION_TTL_SECS,
    };

    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )?)
}
