//! Derived analytics summaries for dashboard queries.
//!
//! Nothing here is persisted; summaries are recomputed from the stored daily
//! rows on every read.

use serde::Serialize;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::models::DailyAnalytics;

/// Totals over a window of days.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AnalyticsSummary {
    pub window_days: u32,
    /// Number of daily rows that contributed
    pub days_with_data: u32,

    // ─── Totals ──────────────────────────────────────────────────
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_views: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_likes: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_comments: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_shares: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub subscribers_gained: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub subscribers_lost: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub net_subscribers: i64,

    // ─── Derived ─────────────────────────────────────────────────
    /// Watch time in whole hours (rounded)
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub watch_time_hours: u64,
    /// (likes + comments) / views * 100, two decimals; 0 when views == 0
    pub engagement_rate: f64,

    #[serde(skip)]
    watch_time_minutes: f64,
}

impl AnalyticsSummary {
    /// Summarize the given daily rows. The caller picks the rows for the window.
    pub fn from_records(window_days: u32, records: &[DailyAnalytics]) -> Self {
        let mut summary = Self {
            window_days,
            ..Self::default()
        };
        for record in records {
            summary.add(record);
        }
        summary.finish();
        summary
    }

    fn add(&mut self, record: &DailyAnalytics) {
        self.days_with_data += 1;
        self.total_views += record.views;
        self.total_likes += record.likes;
        self.total_comments += record.comments;
        self.total_shares += record.shares;
        self.subscribers_gained += record.subscribers_gained;
        self.subscribers_lost += record.subscribers_lost;
        self.watch_time_minutes += record.watch_time_minutes;
    }

    fn finish(&mut self) {
        self.net_subscribers = self.subscribers_gained as i64 - self.subscribers_lost as i64;
        self.watch_time_hours = (self.watch_time_minutes / 60.0).round() as u64;
        self.engagement_rate =
            round2(engagement_rate(self.total_likes, self.total_comments, self.total_views));
    }

    /// Likes plus comments.
    pub fn engagements(&self) -> u64 {
        self.total_likes + self.total_comments
    }
}

/// (likes + comments) / views as a percentage; 0 when there are no views.
pub fn engagement_rate(likes: u64, comments: u64, views: u64) -> f64 {
    if views == 0 {
        return 0.0;
    }
    (likes + comments) as f64 / views as f64 * 100.0
}

/// Percentage change from `previous` to `current`.
///
/// With no previous value the change is 100 if anything happened now, else 0.
pub fn growth_percent(current: f64, previous: f64) -> f64 {
    if previous <= 0.0 {
        return if current > 0.0 { 100.0 } else { 0.0 };
    }
    round2((current - previous) / previous * 100.0)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Growth of the last 7 days over the "previous" slice.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct GrowthMetrics {
    pub views: f64,
    pub subscribers: f64,
    pub engagement: f64,
}

/// Dashboard rollup: 7-day and 30-day totals plus growth.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DashboardSummary {
    pub last_7_days: AnalyticsSummary,
    pub last_30_days: AnalyticsSummary,
    pub growth: GrowthMetrics,
}

impl DashboardSummary {
    /// Build from the two window summaries.
    ///
    /// "Previous" is the 30-day total minus the 7-day total (days 8..30 as one
    /// block), not a rolling 7-day comparison.
    pub fn from_windows(last_7_days: AnalyticsSummary, last_30_days: AnalyticsSummary) -> Self {
        let prev_views = last_30_days.total_views.saturating_sub(last_7_days.total_views);
        let prev_subs = last_30_days
            .subscribers_gained
            .saturating_sub(last_7_days.subscribers_gained);
        let prev_engagement = last_30_days
            .engagements()
            .saturating_sub(last_7_days.engagements());

        let growth = GrowthMetrics {
            views: growth_percent(last_7_days.total_views as f64, prev_views as f64),
            subscribers: growth_percent(last_7_days.subscribers_gained as f64, prev_subs as f64),
            engagement: growth_percent(last_7_days.engagements() as f64, prev_engagement as f64),
        };

        Self {
            last_7_days,
            last_30_days,
            growth,
        }
    }
}
