// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid or expired token")]
    InvalidToken,

    /// No usable provider token on file; the user must re-authenticate.
    #[error("Provider authorization required")]
    AuthRequired,

    /// The refresh grant was rejected or the refresh call failed.
    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    /// The provider reporting call failed or returned unusable data.
    #[error("Analytics sync failed: {0}")]
    Sync(String),

    #[error("YouTube API error: {0}")]
    YouTubeApi(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// The persistence layer cannot be reached at all.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Marker message used when the provider rejects an access token (HTTP 401).
    pub const YOUTUBE_TOKEN_ERROR: &'static str = "YouTube access token rejected";

    /// Marker message used when the provider rate limits us (HTTP 429).
    pub const YOUTUBE_RATE_LIMIT: &'static str = "YouTube rate limit exceeded";

    /// Whether this error means the user has to go through OAuth again.
    pub fn requires_reauth(&self) -> bool {
        match self {
            AppError::AuthRequired | AppError::RefreshFailed(_) => true,
            AppError::YouTubeApi(msg) => msg == Self::YOUTUBE_TOKEN_ERROR,
            _ => false,
        }
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid_token", None),
            AppError::AuthRequired => (StatusCode::UNAUTHORIZED, "auth_required", None),
            AppError::RefreshFailed(msg) => {
                tracing::warn!(error = %msg, "Token refresh failed");
                (StatusCode::UNAUTHORIZED, "refresh_failed", None)
            }
            AppError::Sync(msg) => (StatusCode::BAD_GATEWAY, "sync_error", Some(msg.clone())),
            AppError::YouTubeApi(msg) => {
                (StatusCode::BAD_GATEWAY, "youtube_error", Some(msg.clone()))
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::StorageUnavailable(msg) => {
                tracing::error!(error = %msg, "Storage unavailable");
                (StatusCode::SERVICE_UNAVAILABLE, "storage_unavailable", None)
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            success: false,
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
