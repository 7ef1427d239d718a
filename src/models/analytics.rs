// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-day channel analytics and the mapping from YouTube report rows.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Metrics requested from the YouTube Analytics reports API, in request order.
pub const REPORT_METRICS: [&str; 8] = [
    "views",
    "likes",
    "comments",
    "shares",
    "subscribersGained",
    "subscribersLost",
    "estimatedMinutesWatched",
    "averageViewDuration",
];

/// Daily metrics for one user.
///
/// Document ID: `{user_id}_{YYYY-MM-DD}`. A later sync for the same day
/// overwrites the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyAnalytics {
    pub user_id: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub views: u64,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub comments: u64,
    #[serde(default)]
    pub shares: u64,
    #[serde(default)]
    pub subscribers_gained: u64,
    #[serde(default)]
    pub subscribers_lost: u64,
    #[serde(default)]
    pub watch_time_minutes: f64,
    /// Seconds
    #[serde(default)]
    pub average_view_duration: f64,
    #[serde(default)]
    pub impressions: u64,
    /// Percent
    #[serde(default)]
    pub click_through_rate: f64,
    /// Row as returned by the provider, keyed by column name
    #[serde(default)]
    pub raw_provider_payload: Map<String, Value>,
    /// When this row was last written (RFC3339)
    #[serde(default)]
    pub synced_at: String,
}

impl DailyAnalytics {
    /// Empty record for a day (all metrics zero).
    pub fn empty(user_id: &str, date: NaiveDate) -> Self {
        Self {
            user_id: user_id.to_string(),
            date,
            views: 0,
            likes: 0,
            comments: 0,
            shares: 0,
            subscribers_gained: 0,
            subscribers_lost: 0,
            watch_time_minutes: 0.0,
            average_view_duration: 0.0,
            impressions: 0,
            click_through_rate: 0.0,
            raw_provider_payload: Map::new(),
            synced_at: String::new(),
        }
    }

    /// Storage document ID.
    pub fn doc_id(&self) -> String {
        doc_id(&self.user_id, self.date)
    }

    /// Compare metric values, ignoring `synced_at`.
    pub fn same_metrics(&self, other: &DailyAnalytics) -> bool {
        let mut a = self.clone();
        a.synced_at = other.synced_at.clone();
        &a == other
    }
}

/// Storage document ID for a (user, day) pair.
pub fn doc_id(user_id: &str, date: NaiveDate) -> String {
    format!("{}_{}", urlencoding::encode(user_id), date.format("%Y-%m-%d"))
}

/// Column header of a reports API response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnHeader {
    pub name: String,
    #[serde(default)]
    pub column_type: Option<String>,
    #[serde(default)]
    pub data_type: Option<String>,
}

/// Error binding a report to named fields.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReportError {
    #[error("report has no 'day' column")]
    MissingDayColumn,

    #[error("row {row}: {reason}")]
    BadRow { row: usize, reason: String },
}

/// Maps column names to row positions, built from the response headers.
#[derive(Debug, Clone)]
pub struct ColumnIndex {
    names: Vec<String>,
    positions: HashMap<String, usize>,
}

impl ColumnIndex {
    pub fn from_headers(headers: &[ColumnHeader]) -> Result<Self, ReportError> {
        let names: Vec<String> = headers.iter().map(|h| h.name.clone()).collect();
        let positions: HashMap<String, usize> = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();

        if !positions.contains_key("day") {
            return Err(ReportError::MissingDayColumn);
        }

        for metric in REPORT_METRICS {
            if !positions.contains_key(metric) {
                tracing::warn!(metric, "Report is missing a metric column, defaulting to 0");
            }
        }

        Ok(Self { names, positions })
    }

    fn get<'a>(&self, row: &'a [Value], name: &str) -> Option<&'a Value> {
        self.positions.get(name).and_then(|&i| row.get(i))
    }

    fn count(&self, row: &[Value], name: &str) -> u64 {
        match self.get(row, name) {
            Some(Value::Number(n)) => n
                .as_u64()
                .or_else(|| n.as_f64().map(|f| f.max(0.0).round() as u64))
                .unwrap_or(0),
            Some(Value::String(s)) => s.parse().unwrap_or(0),
            _ => 0,
        }
    }

    fn float(&self, row: &[Value], name: &str) -> f64 {
        match self.get(row, name) {
            Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
            Some(Value::String(s)) => s.parse().unwrap_or(0.0),
            _ => 0.0,
        }
    }

    /// Bind one report row to a daily record.
    pub fn bind_row(
        &self,
        user_id: &str,
        row_number: usize,
        row: &[Value],
        synced_at: &str,
    ) -> Result<DailyAnalytics, ReportError> {
        if row.len() != self.names.len() {
            return Err(ReportError::BadRow {
                row: row_number,
                reason: format!(
                    "expected {} columns, got {}",
                    self.names.len(),
                    row.len()
                ),
            });
        }

        let date = self
            .get(row, "day")
            .and_then(Value::as_str)
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
            .ok_or_else(|| ReportError::BadRow {
                row: row_number,
                reason: "missing or malformed day".to_string(),
            })?;

        let raw_provider_payload: Map<String, Value> = self
            .names
            .iter()
            .cloned()
            .zip(row.iter().cloned())
            .collect();

        Ok(DailyAnalytics {
            user_id: user_id.to_string(),
            date,
            views: self.count(row, "views"),
            likes: self.count(row, "likes"),
            comments: self.count(row, "comments"),
            shares: self.count(row, "shares"),
            subscribers_gained: self.count(row, "subscribersGained"),
            subscribers_lost: self.count(row, "subscribersLost"),
            watch_time_minutes: self.float(row, "estimatedMinutesWatched"),
            average_view_duration: self.float(row, "averageViewDuration"),
            impressions: self.count(row, "impressions"),
            click_through_rate: self.float(row, "impressionsClickThroughRate"),
            raw_provider_payload,
            synced_at: synced_at.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn headers(names: &[&str]) -> Vec<ColumnHeader> {
        names
            .iter()
            .map(|n| ColumnHeader {
                name: n.to_string(),
                column_type: None,
                data_type: None,
            })
            .collect()
    }

    #[test]
    fn test_binds_by_header_name_not_position() {
        let standard = ColumnIndex::from_headers(&headers(&[
            "day",
            "views",
            "likes",
            "comments",
            "shares",
            "subscribersGained",
            "subscribersLost",
            "estimatedMinutesWatched",
            "averageViewDuration",
        ]))
        .unwrap();
        let shuffled = ColumnIndex::from_headers(&headers(&[
            "likes",
            "averageViewDuration",
            "day",
            "subscribersLost",
            "views",
            "estimatedMinutesWatched",
            "comments",
            "subscribersGained",
            "shares",
        ]))
        .unwrap();

        let row_a = vec![
            json!("2026-01-05"),
            json!(120),
            json!(12),
            json!(3),
            json!(1),
            json!(4),
            json!(2),
            json!(300),
            json!(95.5),
        ];
        let row_b = vec![
            json!(12),
            json!(95.5),
            json!("2026-01-05"),
            json!(2),
            json!(120),
            json!(300),
            json!(3),
            json!(4),
            json!(1),
        ];

        let a = standard.bind_row("UC1", 0, &row_a, "t").unwrap();
        let b = shuffled.bind_row("UC1", 0, &row_b, "t").unwrap();

        assert_eq!(a.views, 120);
        assert_eq!(a.likes, 12);
        assert_eq!(a.subscribers_lost, 2);
        assert_eq!(a.watch_time_minutes, 300.0);
        assert_eq!(a.date, NaiveDate::from_ymd_opt(2026, 1, 5).unwrap());
        assert!(a.same_metrics(&b));
    }

    #[test]
    fn test_missing_day_column_rejected() {
        let err = ColumnIndex::from_headers(&headers(&["views", "likes"])).unwrap_err();
        assert_eq!(err, ReportError::MissingDayColumn);
    }

    #[test]
    fn test_missing_metric_defaults_to_zero() {
        let index = ColumnIndex::from_headers(&headers(&["day", "views"])).unwrap();
        let rec = index
            .bind_row("UC1", 0, &[json!("2026-01-05"), json!(7)], "t")
            .unwrap();
        assert_eq!(rec.views, 7);
        assert_eq!(rec.likes, 0);
        assert_eq!(rec.watch_time_minutes, 0.0);
    }

    #[test]
    fn test_short_row_rejected() {
        let index = ColumnIndex::from_headers(&headers(&["day", "views"])).unwrap();
        let err = index.bind_row("UC1", 3, &[json!("2026-01-05")], "t").unwrap_err();
        assert!(matches!(err, ReportError::BadRow { row: 3, .. }));
    }

    #[test]
    fn test_doc_id_is_stable() {
        let rec = DailyAnalytics::empty("UC1", NaiveDate::from_ymd_opt(2026, 2, 9).unwrap());
        assert_eq!(rec.doc_id(), "UC1_2026-02-09");
    }
}
