// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google OAuth routes for connecting a YouTube channel.

use axum::{
    extract::{Query, State},
    response::Redirect,
    routing::get,
    Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{AppError, Result};
use crate::middleware::auth::{create_jwt, SESSION_COOKIE};
use crate::services::youtube::OAUTH_SCOPES;
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

/// How long a signed state parameter stays valid.
const STATE_MAX_AGE_MS: u128 = 15 * 60 * 1000;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/youtube", get(auth_start))
        .route("/auth/youtube/callback", get(auth_callback))
        .route("/auth/logout", get(logout))
}

/// Query parameters for starting OAuth flow.
#[derive(Deserialize)]
pub struct AuthStartParams {
    /// Frontend URL to redirect back to after OAuth completes.
    /// If not provided, uses FRONTEND_URL env var.
    #[serde(default)]
    redirect_uri: Option<String>,
}

fn now_millis() -> Result<u128> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("System time error: {}", e)))?
        .as_millis())
}

/// Only the configured frontend and local dev servers may receive the session.
fn is_allowed_frontend(url: &str, configured: &str) -> bool {
    url == configured || super::is_local_origin(url)
}

/// Build the signed state: base64url("frontend_url|timestamp_hex|signature_hex").
fn sign_state(frontend_url: &str, timestamp_ms: u128, secret: &[u8]) -> Result<String> {
    let payload = format!("{}|{:x}", frontend_url, timestamp_ms);

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(payload.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());

    Ok(URL_SAFE_NO_PAD.encode(format!("{}|{}", payload, signature)))
}

/// Start OAuth flow - redirect to the Google consent screen.
async fn auth_start(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AuthStartParams>,
) -> Result<Redirect> {
    let frontend_url = match params.redirect_uri {
        Some(uri) if is_allowed_frontend(&uri, &state.config.frontend_url) => uri,
        Some(uri) => {
            return Err(AppError::BadRequest(format!(
                "redirect_uri not allowed: {}",
                uri
            )))
        }
        None => state.config.frontend_url.clone(),
    };

    let oauth_state = sign_state(&frontend_url, now_millis()?, &state.config.oauth_state_key)?;

    let auth_url = format!(
        "{}?client_id={}&redirect_uri={}&response_type=code&scope={}\
         &access_type=offline&prompt=consent&include_granted_scopes=true&state={}",
        state.config.google.auth_url,
        urlencoding::encode(&state.config.google_client_id),
        urlencoding::encode(&state.config.oauth_callback_url()),
        urlencoding::encode(&OAUTH_SCOPES.join(" ")),
        oauth_state
    );

    tracing::info!(
        client_id = %state.config.google_client_id,
        frontend_url = %frontend_url,
        "Starting OAuth flow, redirecting to Google"
    );

    Ok(Redirect::temporary(&auth_url))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    state: String,
    #[serde(default)]
    error: Option<String>,
}

/// OAuth callback - exchange code for tokens, create session.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Result<Redirect> {
    let now = now_millis()?;
    let frontend_url = verify_and_decode_state(&params.state, &state.config.oauth_state_key, now)
        .unwrap_or_else(|| {
            tracing::warn!(
                "Invalid, expired or tampered state parameter, falling back to default frontend URL"
            );
            state.config.frontend_url.clone()
        });

    if let Some(error) = params.error {
        tracing::warn!(error = %error, "OAuth error from Google");
        let redirect = format!("{}?error={}", frontend_url, urlencoding::encode(&error));
        return Ok(Redirect::temporary(&redirect));
    }

    let code = params
        .code
        .ok_or_else(|| AppError::BadRequest("Missing authorization code".to_string()))?;

    tracing::info!("Exchanging authorization code for tokens");

    let oauth_result = state
        .youtube_service
        .handle_oauth_callback(&code, &state.config.oauth_callback_url())
        .await?;

    tracing::info!(
        user_id = %oauth_result.user_id,
        channel = %oauth_result.channel_title,
        "OAuth successful, user and tokens stored"
    );

    let jwt = create_jwt(&oauth_result.user_id, &state.config.jwt_signing_key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {}", e)))?;

    let redirect_url = format!("{}/callback?token={}", frontend_url, jwt);
    Ok(Redirect::temporary(&redirect_url))
}

/// Verify HMAC signature and age, and decode the frontend URL from the OAuth
/// state parameter.
fn verify_and_decode_state(state: &str, secret: &[u8], now_ms: u128) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(state).ok()?;
    let state_str = String::from_utf8(bytes).ok()?;

    // The URL itself may contain '|', so split from the right.
    let mut parts = state_str.rsplitn(3, '|');
    let signature_hex = parts.next()?;
    let timestamp_hex = parts.next()?;
    let frontend_url = parts.next()?;

    let payload = format!("{}|{}", frontend_url, timestamp_hex);
    let signature = hex::decode(signature_hex).ok()?;

    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(payload.as_bytes());
    if mac.verify_slice(&signature).is_err() {
        tracing::error!("OAuth state signature mismatch! Potential tampering.");
        return None;
    }

    let issued_ms = u128::from_str_radix(timestamp_hex, 16).ok()?;
    if now_ms.saturating_sub(issued_ms) > STATE_MAX_AGE_MS {
        tracing::warn!("OAuth state expired");
        return None;
    }

    Some(frontend_url.to_string())
}

/// Logout - clear the session cookie and return to the frontend.
async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> (CookieJar, Redirect) {
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    (jar, Redirect::temporary(&state.config.frontend_url))
}
