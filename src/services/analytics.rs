// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Analytics sync and summary service.
//!
//! Pulls day-granularity reports from YouTube into the daily analytics
//! store and derives summaries from the stored rows.

use crate::db::Database;
use crate::error::AppError;
use crate::models::analytics::ColumnIndex;
use crate::models::{AnalyticsSummary, DailyAnalytics, DashboardSummary};
use crate::services::YouTubeService;
use crate::time_utils::{format_utc_rfc3339, window_bounds};
use chrono::{Datelike, NaiveDate, Utc};
use serde::Serialize;

/// Largest window a caller may ask for.
pub const MAX_WINDOW_DAYS: u32 = 365;

/// Windows used by the dashboard summary.
const SHORT_WINDOW_DAYS: u32 = 7;
const LONG_WINDOW_DAYS: u32 = 30;

/// Where returned rows came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Stored,
    /// Generated because storage was unreachable
    Mock,
}

/// Result of one sync.
#[derive(Debug, Clone, Serialize)]
pub struct SyncOutcome {
    pub records_stored: usize,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Stored rows for a window with their summary.
#[derive(Debug, Clone, Serialize)]
pub struct StoredAnalytics {
    pub source: DataSource,
    pub records: Vec<DailyAnalytics>,
    pub summary: AnalyticsSummary,
}

/// Dashboard rollup with its data source.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardReport {
    pub source: DataSource,
    #[serde(flatten)]
    pub summary: DashboardSummary,
}

/// Reject windows outside `1..=365`.
pub fn validate_window(window_days: u32) -> Result<u32, AppError> {
    if window_days == 0 || window_days > MAX_WINDOW_DAYS {
        return Err(AppError::BadRequest(format!(
            "days must be between 1 and {}",
            MAX_WINDOW_DAYS
        )));
    }
    Ok(window_days)
}

#[derive(Clone)]
pub struct AnalyticsService {
    youtube: YouTubeService,
    db: Database,
    /// Serve generated rows when storage is unreachable on read paths
    mock_data_fallback: bool,
}

impl AnalyticsService {
    pub fn new(youtube: YouTubeService, db: Database, mock_data_fallback: bool) -> Self {
        Self {
            youtube,
            db,
            mock_data_fallback,
        }
    }

    /// Fetch `[today - window_days, today]` from YouTube and upsert every day.
    ///
    /// Rows outside the window are left alone. Any bad row fails the whole
    /// sync before anything is written.
    pub async fn sync_analytics(
        &self,
        user_id: &str,
        window_days: u32,
    ) -> Result<SyncOutcome, AppError> {
        let window_days = validate_window(window_days)?;
        let (start, end) = window_bounds(Utc::now().date_naive(), window_days);

        let report = self
            .youtube
            .query_report(user_id, start, end)
            .await
            .map_err(|e| match e {
                AppError::YouTubeApi(msg) if msg == AppError::YOUTUBE_TOKEN_ERROR => {
                    AppError::AuthRequired
                }
                AppError::YouTubeApi(msg) => AppError::Sync(msg),
                other => other,
            })?;

        let index = ColumnIndex::from_headers(&report.column_headers)
            .map_err(|e| AppError::Sync(e.to_string()))?;

        let synced_at = format_utc_rfc3339(Utc::now());
        let records = report
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| index.bind_row(user_id, i, row, &synced_at))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| AppError::Sync(e.to_string()))?;

        let records_stored = self.db.upsert_daily_analytics(&records).await?;

        tracing::info!(
            user_id,
            window_days,
            records_stored,
            start = %start,
            end = %end,
            "Analytics sync complete"
        );

        Ok(SyncOutcome {
            records_stored,
            start_date: start,
            end_date: end,
        })
    }

    /// Stored rows for the window plus their summary.
    pub async fn get_stored_analytics(
        &self,
        user_id: &str,
        window_days: u32,
    ) -> Result<StoredAnalytics, AppError> {
        let window_days = validate_window(window_days)?;
        let (start, end) = window_bounds(Utc::now().date_naive(), window_days);
        let (source, records) = self.load_window(user_id, start, end).await?;
        let summary = AnalyticsSummary::from_records(window_days, &records);

        Ok(StoredAnalytics {
            source,
            records,
            summary,
        })
    }

    /// Summary over the last `window_days` days.
    pub async fn get_summary(
        &self,
        user_id: &str,
        window_days: u32,
    ) -> Result<AnalyticsSummary, AppError> {
        Ok(self
            .get_stored_analytics(user_id, window_days)
            .await?
            .summary)
    }

    /// 7-day and 30-day totals with growth. One storage read covers both.
    pub async fn get_dashboard_summary(&self, user_id: &str) -> Result<DashboardReport, AppError> {
        let today = Utc::now().date_naive();
        let (long_start, end) = window_bounds(today, LONG_WINDOW_DAYS);
        let (short_start, _) = window_bounds(today, SHORT_WINDOW_DAYS);

        let (source, records) = self.load_window(user_id, long_start, end).await?;
        let recent: Vec<DailyAnalytics> = records
            .iter()
            .filter(|r| r.date >= short_start)
            .cloned()
            .collect();

        let summary = DashboardSummary::from_windows(
            AnalyticsSummary::from_records(SHORT_WINDOW_DAYS, &recent),
            AnalyticsSummary::from_records(LONG_WINDOW_DAYS, &records),
        );

        Ok(DashboardReport { source, summary })
    }

    /// Read rows from storage, or generate them if storage is unreachable
    /// and the fallback is enabled.
    async fn load_window(
        &self,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<(DataSource, Vec<DailyAnalytics>), AppError> {
        match self.db.get_daily_analytics(user_id, start, end).await {
            Ok(records) => Ok((DataSource::Stored, records)),
            Err(AppError::StorageUnavailable(msg)) if self.mock_data_fallback => {
                tracing::warn!(
                    user_id,
                    error = %msg,
                    "Storage unavailable, serving mock analytics"
                );
                Ok((DataSource::Mock, mock_daily_analytics(user_id, start, end)))
            }
            Err(e) => Err(e),
        }
    }
}

/// Deterministic placeholder rows, one per day in `[start, end]`.
///
/// Values depend only on the date so repeated reads agree.
pub fn mock_daily_analytics(user_id: &str, start: NaiveDate, end: NaiveDate) -> Vec<DailyAnalytics> {
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .map(|date| {
            let seed = u64::from(date.ordinal()) + u64::from(date.weekday().num_days_from_monday());
            let views = 400 + (seed * 37) % 600;
            let mut record = DailyAnalytics::empty(user_id, date);
            record.views = views;
            record.likes = views / 20 + seed % 7;
            record.comments = views / 100 + seed % 3;
            record.shares = seed % 5;
            record.subscribers_gained = 3 + seed % 9;
            record.subscribers_lost = seed % 3;
            record.watch_time_minutes = views as f64 * 2.5;
            record.average_view_duration = 150.0;
            record
        })
        .collect()
}
