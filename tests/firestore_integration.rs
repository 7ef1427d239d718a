// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore integration tests.
//!
//! These tests require the Firestore emulator to be running
//! (FIRESTORE_EMULATOR_HOST set); they skip otherwise.

use chrono::{NaiveDate, Utc};
use creator_sync::models::{
    DailyAnalytics, OnboardingProgress, OnboardingStep, Provider, TokenRecord, User,
};
use creator_sync::time_utils::format_utc_rfc3339;

mod common;
use common::test_db;

/// Generate a unique channel ID for test isolation.
fn unique_user_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("UCtest{}", nanos)
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
}

// ═══════════════════════════════════════════════════════════════════════════
// USER AND TOKEN TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_user_upsert_and_get() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_user_id();

    assert!(db.get_user(&user_id).await.unwrap().is_none());

    let user = User {
        user_id: user_id.clone(),
        channel_title: "Emulator Channel".to_string(),
        thumbnail_url: Some("https://img.example/1.jpg".to_string()),
        created_at: "2026-01-15T10:00:00Z".to_string(),
        last_active: "2026-01-15T10:00:00Z".to_string(),
    };
    db.upsert_user(&user).await.unwrap();

    let fetched = db.get_user(&user_id).await.unwrap().unwrap();
    assert_eq!(fetched.channel_title, "Emulator Channel");
    assert_eq!(fetched.thumbnail_url, user.thumbnail_url);
}

#[tokio::test]
async fn test_tokens_set_get_delete() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_user_id();
    let record = TokenRecord {
        user_id: user_id.clone(),
        provider: Provider::YouTube,
        access_token_encrypted: "enc-access".to_string(),
        refresh_token_encrypted: Some("enc-refresh".to_string()),
        expires_at: Some(format_utc_rfc3339(Utc::now())),
        token_type: Some("Bearer".to_string()),
        scopes: vec!["scope-a".to_string()],
        updated_at: format_utc_rfc3339(Utc::now()),
    };

    db.set_tokens(&record).await.unwrap();
    let fetched = db
        .get_tokens(Provider::YouTube, &user_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetched, record);

    db.delete_tokens(Provider::YouTube, &user_id).await.unwrap();
    assert!(db
        .get_tokens(Provider::YouTube, &user_id)
        .await
        .unwrap()
        .is_none());
}

// ═══════════════════════════════════════════════════════════════════════════
// DAILY ANALYTICS TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_daily_upsert_overwrites_and_ranges() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_user_id();

    let mut rows: Vec<DailyAnalytics> = [1, 5, 10]
        .into_iter()
        .map(|d| DailyAnalytics::empty(&user_id, day(d)))
        .collect();
    rows[1].views = 10;
    db.upsert_daily_analytics(&rows).await.unwrap();

    rows[1].views = 99;
    db.upsert_daily_analytics(&rows[1..2]).await.unwrap();

    let fetched = db
        .get_daily_analytics(&user_id, day(2), day(10))
        .await
        .unwrap();
    let dates: Vec<_> = fetched.iter().map(|r| r.date).collect();
    assert_eq!(dates, vec![day(5), day(10)]);
    assert_eq!(fetched[0].views, 99);
}

// ═══════════════════════════════════════════════════════════════════════════
// ONBOARDING AND DELETION TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_onboarding_round_trip_and_delete_user_data() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_user_id();

    let mut progress = OnboardingProgress::new(&user_id);
    progress.complete(OnboardingStep::ConnectAccount, "2026-03-01T00:00:00Z");
    db.set_onboarding(&progress).await.unwrap();
    assert_eq!(
        db.get_onboarding(&user_id).await.unwrap().unwrap(),
        progress
    );

    db.upsert_daily_analytics(&[
        DailyAnalytics::empty(&user_id, day(1)),
        DailyAnalytics::empty(&user_id, day(2)),
    ])
    .await
    .unwrap();

    // Two rows plus onboarding; no profile was ever stored.
    let deleted = db.delete_user_data(&user_id).await.unwrap();
    assert_eq!(deleted, 3);
    assert!(db.get_onboarding(&user_id).await.unwrap().is_none());
    assert!(db
        .get_daily_analytics(&user_id, day(1), day(31))
        .await
        .unwrap()
        .is_empty());

    assert_eq!(db.delete_user_data(&user_id).await.unwrap(), 0);
}
