// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google OAuth and YouTube API client.
//!
//! Handles:
//! - Authorization code exchange and token refresh
//! - Token revocation on disconnect
//! - Channel profile lookup
//! - YouTube Analytics day-granularity reports

use crate::config::GoogleEndpoints;
use crate::error::AppError;
use crate::models::analytics::{ColumnHeader, REPORT_METRICS};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;

/// Per-request timeout for Google calls.
const HTTP_TIMEOUT_SECS: u64 = 30;

/// Scopes requested at consent time.
pub const OAUTH_SCOPES: [&str; 3] = [
    "https://www.googleapis.com/auth/youtube.readonly",
    "https://www.googleapis.com/auth/yt-analytics.readonly",
    "https://www.googleapis.com/auth/userinfo.profile",
];

/// Google/YouTube API client.
#[derive(Clone)]
pub struct YouTubeClient {
    http: reqwest::Client,
    endpoints: GoogleEndpoints,
    client_id: String,
    client_secret: String,
}

impl YouTubeClient {
    /// Create a new client with OAuth credentials.
    pub fn new(
        client_id: String,
        client_secret: String,
        endpoints: GoogleEndpoints,
    ) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("HTTP client build failed: {}", e)))?;
        Ok(Self {
            http,
            endpoints,
            client_id,
            client_secret,
        })
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenResponse, AppError> {
        let response = self
            .http
            .post(&self.endpoints.token_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", redirect_uri),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| AppError::YouTubeApi(format!("Token exchange failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Google token exchange failed");
            return Err(AppError::YouTubeApi(format!(
                "Token exchange failed with status {}",
                status
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::YouTubeApi(format!("Failed to parse token response: {}", e)))
    }

    /// Refresh an expired access token.
    ///
    /// Every failure is a `RefreshFailed`; a revoked grant carries `invalid_grant`
    /// in the message.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, AppError> {
        let response = self
            .http
            .post(&self.endpoints.token_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| AppError::RefreshFailed(format!("Token refresh request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::RefreshFailed(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::RefreshFailed(format!("JSON parse error: {}", e)))
    }

    /// Revoke a token (access or refresh). Revoking the refresh token ends the grant.
    pub async fn revoke(&self, token: &str) -> Result<(), AppError> {
        let response = self
            .http
            .post(&self.endpoints.revoke_url)
            .form(&[("token", token)])
            .send()
            .await
            .map_err(|e| AppError::YouTubeApi(format!("Revoke request failed: {}", e)))?;

        self.check_response(response).await?;
        tracing::info!("Google token revoked");
        Ok(())
    }

    /// Get the authenticated user's channel.
    pub async fn get_my_channel(&self, access_token: &str) -> Result<ChannelInfo, AppError> {
        let url = format!("{}/channels", self.endpoints.data_api_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .query(&[("part", "snippet"), ("mine", "true")])
            .send()
            .await
            .map_err(|e| AppError::YouTubeApi(e.to_string()))?;

        let list: ChannelListResponse = self.check_response_json(response).await?;
        list.items
            .into_iter()
            .next()
            .map(channel_info)
            .ok_or_else(|| AppError::NotFound("No YouTube channel for this account".to_string()))
    }

    /// Query day-granularity channel metrics for `[start, end]`.
    pub async fn query_report(
        &self,
        access_token: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<ReportResponse, AppError> {
        let url = format!("{}/reports", self.endpoints.analytics_api_url);
        let metrics = REPORT_METRICS.join(",");

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .query(&[
                ("ids", "channel==MINE".to_string()),
                ("startDate", start.format("%Y-%m-%d").to_string()),
                ("endDate", end.format("%Y-%m-%d").to_string()),
                ("metrics", metrics),
                ("dimensions", "day".to_string()),
                ("sort", "day".to_string()),
            ])
            .send()
            .await
            .map_err(|e| AppError::YouTubeApi(e.to_string()))?;

        self.check_response_json(response).await
    }

    /// Check response status and return error if not successful.
    async fn check_response(&self, response: reqwest::Response) -> Result<(), AppError> {
        if response.status().is_success() {
            return Ok(());
        }
        Err(Self::status_error(response).await)
    }

    /// Check response and parse JSON body.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| AppError::YouTubeApi(format!("JSON parse error: {}", e)))
    }

    async fn status_error(response: reqwest::Response) -> AppError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.as_u16() == 429 {
            tracing::warn!("YouTube rate limit hit (429)");
            return AppError::YouTubeApi(AppError::YOUTUBE_RATE_LIMIT.to_string());
        }

        if status.as_u16() == 401 {
            return AppError::YouTubeApi(AppError::YOUTUBE_TOKEN_ERROR.to_string());
        }

        AppError::YouTubeApi(format!("HTTP {}: {}", status, body))
    }
}

/// Token endpoint response (code exchange and refresh).
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Seconds until the access token expires
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Usually omitted on refresh
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Space-separated granted scopes
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl TokenResponse {
    pub fn scopes(&self) -> Option<Vec<String>> {
        self.scope
            .as_deref()
            .map(|s| s.split_whitespace().map(String::from).collect())
    }
}

/// YouTube Analytics reports response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportResponse {
    #[serde(default)]
    pub column_headers: Vec<ColumnHeader>,
    /// Absent when the window has no data
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChannelListResponse {
    #[serde(default)]
    items: Vec<ChannelItem>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChannelItem {
    id: String,
    snippet: ChannelSnippet,
}

#[derive(Debug, Clone, Deserialize)]
struct ChannelSnippet {
    title: String,
    #[serde(default)]
    thumbnails: Option<Thumbnails>,
}

#[derive(Debug, Clone, Deserialize)]
struct Thumbnails {
    #[serde(default)]
    default: Option<Thumbnail>,
}

#[derive(Debug, Clone, Deserialize)]
struct Thumbnail {
    url: String,
}

/// Channel identity used as the user profile.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelInfo {
    pub id: String,
    pub title: String,
    pub thumbnail_url: Option<String>,
}

fn channel_info(item: ChannelItem) -> ChannelInfo {
    ChannelInfo {
        id: item.id,
        title: item.snippet.title,
        thumbnail_url: item
            .snippet
            .thumbnails
            .and_then(|t| t.default)
            .map(|t| t.url),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// YouTubeService - High-level service with token management
// ─────────────────────────────────────────────────────────────────────────────

use crate::db::Database;
use crate::models::{Provider, TokenRecord, TokenState, User};
use crate::services::TokenCipher;
use crate::time_utils::format_utc_rfc3339;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Margin before token expiration when we proactively refresh (5 minutes).
pub const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// Cached access token with expiry information.
#[derive(Clone)]
pub struct CachedToken {
    access_token: String,
    /// None when the provider gave no expiry
    expires_at: Option<DateTime<Utc>>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        self.expires_at.map_or(true, |exp| now + margin < exp)
    }
}

/// Shared token cache type for use in AppState.
pub type TokenCache = Arc<DashMap<String, CachedToken>>;

/// Shared refresh locks type for use in AppState.
pub type RefreshLocks = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// High-level YouTube service that manages the token lifecycle and API calls.
///
/// This service encapsulates:
/// - Token retrieval and decryption from storage
/// - Automatic token refresh when expiring (with 5-minute margin)
/// - Re-encryption and storage of refreshed tokens
/// - In-memory token caching
/// - Per-user locking to prevent duplicate refresh calls
#[derive(Clone)]
pub struct YouTubeService {
    client: YouTubeClient,
    db: Database,
    cipher: TokenCipher,
    /// In-memory cache of decrypted access tokens (shared across requests).
    token_cache: TokenCache,
    /// Per-user mutex to serialize token refresh operations.
    refresh_locks: RefreshLocks,
}

impl YouTubeService {
    /// Create a new YouTube service with shared token cache.
    pub fn new(
        client: YouTubeClient,
        db: Database,
        cipher: TokenCipher,
        token_cache: TokenCache,
        refresh_locks: RefreshLocks,
    ) -> Self {
        Self {
            client,
            db,
            cipher,
            token_cache,
            refresh_locks,
        }
    }

    // ─── Token Management ────────────────────────────────────────────────────

    /// Get a valid (non-expired) access token for the given user.
    ///
    /// 1. Check in-memory cache (fast path - no I/O)
    /// 2. Acquire per-user lock so only one task refreshes
    /// 3. Re-check cache after lock (another task may have refreshed)
    /// 4. Load the record; none on file is `AuthRequired`
    /// 5. If still valid, decrypt, cache and return
    /// 6. If expired without a refresh token, `AuthRequired` (no network call)
    /// 7. Refresh with Google, persist, cache
    /// 8. On `invalid_grant`, re-read once in case another instance won the race
    pub async fn get_valid_access_token(&self, user_id: &str) -> Result<String, AppError> {
        let now = Utc::now();
        let margin = Duration::seconds(TOKEN_REFRESH_MARGIN_SECS);

        if let Some(cached) = self.token_cache.get(user_id) {
            if cached.is_fresh(now, margin) {
                return Ok(cached.access_token.clone());
            }
        }

        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        if let Some(cached) = self.token_cache.get(user_id) {
            if cached.is_fresh(now, margin) {
                return Ok(cached.access_token.clone());
            }
        }

        let Some(tokens) = self.db.get_tokens(Provider::YouTube, user_id).await? else {
            self.token_cache.remove(user_id);
            return Err(AppError::AuthRequired);
        };

        if !tokens.is_expired(now, margin) {
            return self.cache_record(&tokens);
        }

        let Some(refresh_encrypted) = tokens
            .refresh_token_encrypted
            .as_deref()
            .filter(|t| !t.is_empty())
        else {
            tracing::info!(user_id, "Access token expired and no refresh token on file");
            self.token_cache.remove(user_id);
            return Err(AppError::AuthRequired);
        };

        tracing::info!(user_id, "Access token expired, refreshing");
        let refresh_token = self.cipher.decrypt(refresh_encrypted, user_id)?;

        let refreshed = match self.client.refresh_token(&refresh_token).await {
            Ok(t) => t,
            Err(AppError::RefreshFailed(msg)) if msg.contains("invalid_grant") => {
                return self.recover_from_rejected_grant(user_id, &tokens, msg).await;
            }
            Err(e) => return Err(e),
        };

        let record = self.build_record(
            user_id,
            &refreshed,
            Some(refresh_token.as_str()),
            &tokens.scopes,
        )?;
        self.db.set_tokens(&record).await?;

        self.token_cache.insert(
            user_id.to_string(),
            CachedToken {
                access_token: refreshed.access_token.clone(),
                expires_at: record.expiry(),
            },
        );

        tracing::info!(user_id, "Token refreshed and cached");
        Ok(refreshed.access_token)
    }

    /// Per-user lock serializing every write to the user's token record.
    fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        self.refresh_locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Google rejected our refresh token.
    ///
    /// If the stored record changed since we read it, another instance
    /// refreshed first and its token is used. Otherwise the grant is gone:
    /// the record is deleted and the user has to reconnect.
    async fn recover_from_rejected_grant(
        &self,
        user_id: &str,
        stale: &TokenRecord,
        msg: String,
    ) -> Result<String, AppError> {
        let now = Utc::now();
        let margin = Duration::seconds(TOKEN_REFRESH_MARGIN_SECS);

        if let Some(current) = self.db.get_tokens(Provider::YouTube, user_id).await? {
            if current != *stale && !current.is_expired(now, margin) {
                tracing::info!(
                    user_id,
                    "Refresh token race detected - another instance won, using their tokens"
                );
                return self.cache_record(&current);
            }
        }

        tracing::warn!(user_id, "Refresh grant rejected, clearing stored tokens");
        self.db.delete_tokens(Provider::YouTube, user_id).await?;
        self.token_cache.remove(user_id);
        Err(AppError::RefreshFailed(msg))
    }

    /// Decrypt a record's access token and cache it.
    fn cache_record(&self, record: &TokenRecord) -> Result<String, AppError> {
        let access_token = self
            .cipher
            .decrypt(&record.access_token_encrypted, &record.user_id)?;
        self.token_cache.insert(
            record.user_id.clone(),
            CachedToken {
                access_token: access_token.clone(),
                expires_at: record.expiry(),
            },
        );
        Ok(access_token)
    }

    /// Encrypt a token response into a storable record.
    ///
    /// `fallback_refresh` is kept when the response carries no refresh token.
    fn build_record(
        &self,
        user_id: &str,
        response: &TokenResponse,
        fallback_refresh: Option<&str>,
        fallback_scopes: &[String],
    ) -> Result<TokenRecord, AppError> {
        let now = Utc::now();
        let refresh = response.refresh_token.as_deref().or(fallback_refresh);

        Ok(TokenRecord {
            user_id: user_id.to_string(),
            provider: Provider::YouTube,
            access_token_encrypted: self.cipher.encrypt(&response.access_token, user_id)?,
            refresh_token_encrypted: refresh
                .map(|r| self.cipher.encrypt(r, user_id))
                .transpose()?,
            expires_at: response
                .expires_in
                .map(|secs| format_utc_rfc3339(now + Duration::seconds(secs))),
            token_type: response.token_type.clone(),
            scopes: response
                .scopes()
                .unwrap_or_else(|| fallback_scopes.to_vec()),
            updated_at: format_utc_rfc3339(now),
        })
    }

    /// Where the user's token record sits in its lifecycle.
    pub async fn token_status(&self, user_id: &str) -> Result<TokenState, AppError> {
        let margin = Duration::seconds(TOKEN_REFRESH_MARGIN_SECS);
        Ok(match self.db.get_tokens(Provider::YouTube, user_id).await? {
            None => TokenState::Unauthenticated,
            Some(record) => record.state(Utc::now(), margin),
        })
    }

    // ─── OAuth Callback Handling ─────────────────────────────────────────────

    /// Handle OAuth callback: exchange code for tokens, store user and tokens.
    pub async fn handle_oauth_callback(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<OAuthResult, AppError> {
        let token_response = self.client.exchange_code(code, redirect_uri).await?;
        let channel = self
            .client
            .get_my_channel(&token_response.access_token)
            .await?;

        let user_id = channel.id.clone();
        let now = format_utc_rfc3339(Utc::now());

        let created_at = match self.db.get_user(&user_id).await {
            Ok(Some(existing)) => existing.created_at,
            _ => now.clone(),
        };
        let user = User {
            user_id: user_id.clone(),
            channel_title: channel.title.clone(),
            thumbnail_url: channel.thumbnail_url.clone(),
            created_at,
            last_active: now,
        };

        if let Err(e) = self.db.upsert_user(&user).await {
            tracing::warn!(error = %e, "Failed to store user profile, continuing anyway");
        }

        if token_response.refresh_token.is_none() {
            tracing::warn!(
                user_id = %user_id,
                "No refresh token granted; user will need to reconnect when the token expires"
            );
        }

        // An in-flight refresh must not overwrite the tokens stored here.
        let lock = self.user_lock(&user_id);
        let _guard = lock.lock().await;

        // Re-consent without a new refresh token keeps the one on file.
        let previous_refresh = match self.db.get_tokens(Provider::YouTube, &user_id).await? {
            Some(old) => match old
                .refresh_token_encrypted
                .as_deref()
                .filter(|t| !t.is_empty())
                .map(|t| self.cipher.decrypt(t, &user_id))
                .transpose()
            {
                Ok(refresh) => refresh,
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        user_id = %user_id,
                        "Failed to decrypt previous refresh token, not carrying it over"
                    );
                    None
                }
            },
            None => None,
        };

        let default_scopes: Vec<String> = OAUTH_SCOPES.iter().map(|s| s.to_string()).collect();
        let record = self.build_record(
            &user_id,
            &token_response,
            previous_refresh.as_deref(),
            &default_scopes,
        )?;
        self.db.set_tokens(&record).await?;
        self.token_cache.remove(&user_id);

        tracing::info!(
            user_id = %user_id,
            channel = %channel.title,
            "OAuth callback handled, user and tokens stored"
        );

        Ok(OAuthResult {
            user_id,
            channel_title: channel.title,
        })
    }

    // ─── API Wrappers ────────────────────────────────────────────────────────

    /// Query the analytics report for `[start, end]` on behalf of a user.
    pub async fn query_report(
        &self,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<ReportResponse, AppError> {
        let access_token = self.get_valid_access_token(user_id).await?;
        let result = self.client.query_report(&access_token, start, end).await;
        if let Err(e) = &result {
            if e.requires_reauth() {
                // Google no longer accepts the cached token; force a reload next time.
                self.token_cache.remove(user_id);
            }
        }
        result
    }

    /// Disconnect: delete the stored tokens, drop the cache entry and revoke
    /// the grant at Google (best effort).
    ///
    /// Returns `false` if nothing was connected.
    pub async fn disconnect(&self, user_id: &str) -> Result<bool, AppError> {
        // Waits out any refresh in flight so it cannot write the record back.
        let tokens = {
            let lock = self.user_lock(user_id);
            let _guard = lock.lock().await;

            let Some(tokens) = self.db.get_tokens(Provider::YouTube, user_id).await? else {
                self.token_cache.remove(user_id);
                return Ok(false);
            };

            // Delete first so concurrent requests stop using the grant.
            self.db.delete_tokens(Provider::YouTube, user_id).await?;
            self.token_cache.remove(user_id);
            tokens
        };

        let revocable = tokens
            .refresh_token_encrypted
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or(&tokens.access_token_encrypted);

        match self.cipher.decrypt(revocable, user_id) {
            Ok(token) => {
                if let Err(e) = self.client.revoke(&token).await {
                    tracing::warn!(error = %e, user_id, "Failed to revoke grant at Google");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, user_id, "Failed to decrypt tokens (skipping revoke)");
            }
        }

        tracing::info!(user_id, "YouTube account disconnected");
        Ok(true)
    }
}

/// Result of handling OAuth callback.
#[derive(Debug, Clone)]
pub struct OAuthResult {
    pub user_id: String,
    pub channel_title: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_builds_with_timeout() {
        let client = YouTubeClient::new(
            "id".to_string(),
            "secret".to_string(),
            GoogleEndpoints::with_base("http://127.0.0.1:9"),
        );
        assert!(client.is_ok());
    }

    #[test]
    fn test_report_without_rows_parses() {
        let json = r#"{
            "kind": "youtubeAnalytics#resultTable",
            "columnHeaders": [
                {"name": "day", "columnType": "DIMENSION", "dataType": "STRING"},
                {"name": "views", "columnType": "METRIC", "dataType": "INTEGER"}
            ]
        }"#;
        let report: ReportResponse = serde_json::from_str(json).unwrap();
        assert_eq!(report.column_headers.len(), 2);
        assert!(report.rows.is_empty());
    }

    #[test]
    fn test_refresh_response_without_refresh_token() {
        let json = r#"{"access_token":"ya29.new","expires_in":3599,"scope":"a b","token_type":"Bearer"}"#;
        let resp: TokenResponse = serde_json::from_str(json).unwrap();
        assert!(resp.refresh_token.is_none());
        assert_eq!(resp.scopes(), Some(vec!["a".to_string(), "b".to_string()]));
    }

    #[test]
    fn test_channel_info_from_item() {
        let json = r#"{"items":[{"id":"UCabc","snippet":{"title":"My Channel",
            "thumbnails":{"default":{"url":"https://img/1.jpg"}}}}]}"#;
        let list: ChannelListResponse = serde_json::from_str(json).unwrap();
        let info = channel_info(list.items.into_iter().next().unwrap());
        assert_eq!(info.id, "UCabc");
        assert_eq!(info.thumbnail_url.as_deref(), Some("https://img/1.jpg"));
    }

    #[test]
    fn test_cached_token_without_expiry_is_fresh() {
        let cached = CachedToken {
            access_token: "t".to_string(),
            expires_at: None,
        };
        assert!(cached.is_fresh(Utc::now(), Duration::minutes(5)));
    }
}
