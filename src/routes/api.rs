// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users.

use crate::config::DEFAULT_SYNC_WINDOW_DAYS;
use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{
    AnalyticsSummary, DailyAnalytics, DashboardSummary, OnboardingProgress, OnboardingStep,
    TokenState,
};
use crate::services::DataSource;
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post},
    Extension, Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/account", delete(delete_account))
        .route("/api/youtube/status", get(get_connection_status))
        .route("/api/youtube/sync", post(sync_analytics))
        .route("/api/youtube/analytics", get(get_analytics))
        .route("/api/youtube/summary", get(get_summary))
        .route("/api/youtube/connection", delete(disconnect))
        .route("/api/onboarding", get(get_onboarding))
        .route(
            "/api/onboarding/steps/{step}/complete",
            post(complete_onboarding_step),
        )
        .route("/api/onboarding/dismiss", post(dismiss_onboarding))
        .route("/api/onboarding/reset", post(reset_onboarding))
}

// ─── User Profile ────────────────────────────────────────────

/// Current user response.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserResponse {
    pub success: bool,
    pub user_id: String,
    pub channel_title: String,
    pub thumbnail_url: Option<String>,
    pub created_at: String,
}

/// Get current user profile.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<UserResponse>> {
    let profile = state
        .db
        .get_user(&user.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user.user_id)))?;

    Ok(Json(UserResponse {
        success: true,
        user_id: profile.user_id,
        channel_title: profile.channel_title,
        thumbnail_url: profile.thumbnail_url,
        created_at: profile.created_at,
    }))
}

// ─── Account Deletion ────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DeleteAccountResponse {
    pub success: bool,
    pub message: String,
}

/// Delete the user's account: revoke the YouTube grant, then remove every
/// stored document for the user.
async fn delete_account(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<DeleteAccountResponse>> {
    tracing::info!(user_id = %user.user_id, "User-initiated account deletion");

    // Tokens go first so no sync can run against a half-deleted account.
    state.youtube_service.disconnect(&user.user_id).await?;
    let deleted = state.db.delete_user_data(&user.user_id).await?;

    tracing::info!(user_id = %user.user_id, deleted, "Account deleted");

    Ok(Json(DeleteAccountResponse {
        success: true,
        message: "Account deleted. All data has been removed.".to_string(),
    }))
}

// ─── YouTube Connection ──────────────────────────────────────

#[derive(Serialize)]
pub struct ConnectionStatusResponse {
    pub success: bool,
    pub provider: &'static str,
    #[serde(flatten)]
    pub state: TokenState,
}

/// Where the user's YouTube authorization stands.
async fn get_connection_status(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ConnectionStatusResponse>> {
    let token_state = state.youtube_service.token_status(&user.user_id).await?;
    Ok(Json(ConnectionStatusResponse {
        success: true,
        provider: "youtube",
        state: token_state,
    }))
}

#[derive(Serialize)]
pub struct DisconnectResponse {
    pub success: bool,
    /// False if nothing was connected
    pub disconnected: bool,
}

async fn disconnect(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<DisconnectResponse>> {
    let disconnected = state.youtube_service.disconnect(&user.user_id).await?;
    Ok(Json(DisconnectResponse {
        success: true,
        disconnected,
    }))
}

// ─── Analytics ───────────────────────────────────────────────

#[derive(Deserialize)]
struct WindowQuery {
    /// Window length in days (1..=365)
    days: Option<u32>,
}

impl WindowQuery {
    fn days(&self) -> u32 {
        self.days.unwrap_or(DEFAULT_SYNC_WINDOW_DAYS)
    }
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SyncResponse {
    pub success: bool,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub records_stored: usize,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub start_date: NaiveDate,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub end_date: NaiveDate,
}

/// Pull the window from YouTube into storage.
async fn sync_analytics(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<SyncResponse>> {
    let outcome = state
        .analytics_service
        .sync_analytics(&user.user_id, query.days())
        .await?;

    Ok(Json(SyncResponse {
        success: true,
        records_stored: outcome.records_stored,
        start_date: outcome.start_date,
        end_date: outcome.end_date,
    }))
}

#[derive(Serialize)]
pub struct AnalyticsResponse {
    pub success: bool,
    pub source: DataSource,
    pub window_days: u32,
    pub records: Vec<DailyAnalytics>,
    pub summary: AnalyticsSummary,
}

/// Stored daily rows for the window, with totals.
async fn get_analytics(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<AnalyticsResponse>> {
    let window_days = query.days();
    let stored = state
        .analytics_service
        .get_stored_analytics(&user.user_id, window_days)
        .await?;

    Ok(Json(AnalyticsResponse {
        success: true,
        source: stored.source,
        window_days,
        records: stored.records,
        summary: stored.summary,
    }))
}

#[derive(Serialize)]
pub struct SummaryResponse {
    pub success: bool,
    pub source: DataSource,
    #[serde(flatten)]
    pub summary: DashboardSummary,
}

async fn get_summary(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<SummaryResponse>> {
    let report = state
        .analytics_service
        .get_dashboard_summary(&user.user_id)
        .await?;

    Ok(Json(SummaryResponse {
        success: true,
        source: report.source,
        summary: report.summary,
    }))
}

// ─── Onboarding ──────────────────────────────────────────────

#[derive(Serialize)]
pub struct OnboardingResponse {
    pub success: bool,
    pub progress: OnboardingProgress,
}

impl From<OnboardingProgress> for OnboardingResponse {
    fn from(progress: OnboardingProgress) -> Self {
        Self {
            success: true,
            progress,
        }
    }
}

/// Stored progress, or a fresh record if the user never started.
async fn load_onboarding(state: &AppState, user_id: &str) -> Result<OnboardingProgress> {
    Ok(state
        .db
        .get_onboarding(user_id)
        .await?
        .unwrap_or_else(|| OnboardingProgress::new(user_id)))
}

async fn get_onboarding(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<OnboardingResponse>> {
    Ok(Json(load_onboarding(&state, &user.user_id).await?.into()))
}

async fn complete_onboarding_step(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(step): Path<String>,
) -> Result<Json<OnboardingResponse>> {
    let step: OnboardingStep = step.parse().map_err(AppError::BadRequest)?;

    let mut progress = load_onboarding(&state, &user.user_id).await?;
    let now = format_utc_rfc3339(chrono::Utc::now());
    if progress.complete(step, &now) {
        state.db.set_onboarding(&progress).await?;
        tracing::debug!(user_id = %user.user_id, step = step.as_str(), "Onboarding step completed");
    }

    Ok(Json(progress.into()))
}

async fn dismiss_onboarding(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<OnboardingResponse>> {
    let mut progress = load_onboarding(&state, &user.user_id).await?;
    progress.dismiss(&format_utc_rfc3339(chrono::Utc::now()));
    state.db.set_onboarding(&progress).await?;
    Ok(Json(progress.into()))
}

async fn reset_onboarding(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<OnboardingResponse>> {
    let mut progress = load_onboarding(&state, &user.user_id).await?;
    progress.reset(&format_utc_rfc3339(chrono::Utc::now()));
    state.db.set_onboarding(&progress).await?;
    Ok(Json(progress.into()))
}
