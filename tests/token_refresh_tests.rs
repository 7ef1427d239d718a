// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Token refresh tests against the fake Google token endpoint.
//!
//! These tests verify that:
//! 1. A valid token is returned without touching the network
//! 2. An expired token is refreshed once and persisted with a later expiry
//! 3. An expired token without a refresh token needs re-authentication
//! 4. A revoked grant clears the stored tokens
//! 5. Concurrent callers share a single refresh

use chrono::Duration;
use creator_sync::error::AppError;
use creator_sync::models::{Provider, TokenState};
use futures_util::future::join_all;

mod common;
use common::{test_cipher, RefreshMode, TestApp};

const USER: &str = "UCrefresh";

#[tokio::test]
async fn test_valid_token_returned_without_network() {
    let app = TestApp::new().await;
    app.seed_tokens(USER, "ya29.current", Some("1//refresh"), Duration::hours(1))
        .await;

    let token = app
        .state
        .youtube_service
        .get_valid_access_token(USER)
        .await
        .unwrap();

    assert_eq!(token, "ya29.current");
    assert_eq!(app.google.calls.total(), 0);
}

#[tokio::test]
async fn test_expired_token_is_refreshed_with_later_expiry() {
    let app = TestApp::new().await;
    let before = app
        .seed_tokens(USER, "ya29.stale", Some("1//refresh"), Duration::minutes(-10))
        .await;

    let token = app
        .state
        .youtube_service
        .get_valid_access_token(USER)
        .await
        .unwrap();

    assert_eq!(token, "ya29.refreshed-1");
    assert_eq!(app.google.calls.refresh(), 1);

    let after = app
        .state
        .db
        .get_tokens(Provider::YouTube, USER)
        .await
        .unwrap()
        .unwrap();
    assert!(after.expiry().unwrap() > before.expiry().unwrap());

    // Google omitted refresh_token; the stored one must survive.
    let cipher = test_cipher(&app.state.config);
    let refresh = cipher
        .decrypt(after.refresh_token_encrypted.as_deref().unwrap(), USER)
        .unwrap();
    assert_eq!(refresh, "1//refresh");
}

#[tokio::test]
async fn test_token_inside_margin_is_refreshed() {
    let app = TestApp::new().await;
    app.seed_tokens(USER, "ya29.almost", Some("1//refresh"), Duration::minutes(2))
        .await;

    let token = app
        .state
        .youtube_service
        .get_valid_access_token(USER)
        .await
        .unwrap();

    assert_eq!(token, "ya29.refreshed-1");
}

#[tokio::test]
async fn test_expired_without_refresh_token_needs_auth() {
    let app = TestApp::new().await;
    app.seed_tokens(USER, "ya29.stale", None, Duration::minutes(-10))
        .await;

    let result = app.state.youtube_service.get_valid_access_token(USER).await;

    assert!(matches!(result, Err(AppError::AuthRequired)));
    assert_eq!(app.google.calls.total(), 0);

    let status = app.state.youtube_service.token_status(USER).await.unwrap();
    assert_eq!(status, TokenState::Expired { refreshable: false });
}

#[tokio::test]
async fn test_missing_record_needs_auth() {
    let app = TestApp::new().await;

    let result = app.state.youtube_service.get_valid_access_token(USER).await;

    assert!(matches!(result, Err(AppError::AuthRequired)));
    assert_eq!(
        app.state.youtube_service.token_status(USER).await.unwrap(),
        TokenState::Unauthenticated
    );
}

#[tokio::test]
async fn test_revoked_grant_clears_tokens() {
    let app = TestApp::new().await;
    app.google.set_refresh_mode(RefreshMode::InvalidGrant);
    app.seed_tokens(USER, "ya29.stale", Some("1//revoked"), Duration::minutes(-10))
        .await;

    let result = app.state.youtube_service.get_valid_access_token(USER).await;

    match result {
        Err(AppError::RefreshFailed(msg)) => assert!(msg.contains("invalid_grant")),
        other => panic!("expected RefreshFailed, got {:?}", other),
    }
    assert!(app
        .state
        .db
        .get_tokens(Provider::YouTube, USER)
        .await
        .unwrap()
        .is_none());

    // Next call fails fast without contacting Google again.
    let again = app.state.youtube_service.get_valid_access_token(USER).await;
    assert!(matches!(again, Err(AppError::AuthRequired)));
    assert_eq!(app.google.calls.refresh(), 1);
}

#[tokio::test]
async fn test_concurrent_callers_share_one_refresh() {
    let app = TestApp::new().await;
    app.seed_tokens(USER, "ya29.stale", Some("1//refresh"), Duration::minutes(-10))
        .await;

    let service = app.state.youtube_service.clone();
    let results = join_all((0..8).map(|_| {
        let service = service.clone();
        async move { service.get_valid_access_token(USER).await }
    }))
    .await;

    for result in results {
        assert_eq!(result.unwrap(), "ya29.refreshed-1");
    }
    assert_eq!(app.google.calls.refresh(), 1);
}

#[tokio::test]
async fn test_refreshed_token_is_cached() {
    let app = TestApp::new().await;
    app.seed_tokens(USER, "ya29.stale", Some("1//refresh"), Duration::minutes(-10))
        .await;

    let first = app.state.youtube_service.get_valid_access_token(USER).await;
    let second = app.state.youtube_service.get_valid_access_token(USER).await;

    assert_eq!(first.unwrap(), second.unwrap());
    assert_eq!(app.google.calls.refresh(), 1);
}
