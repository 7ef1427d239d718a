// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Creator-Sync API Server
//!
//! Syncs YouTube channel analytics for connected creators and serves
//! dashboard summaries.

use creator_sync::{
    config::Config,
    db::Database,
    services::{AnalyticsService, TokenCipher, YouTubeClient, YouTubeService},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(
        port = config.port,
        storage = ?config.storage_backend,
        "Starting Creator-Sync API"
    );

    let db = Database::connect(&config).await?;

    let cipher = TokenCipher::from_key(config.token_encryption_key.as_ref())?;
    tracing::info!("Token cipher initialized");

    // Shared across all YouTubeService clones within this instance
    let token_cache = Arc::new(dashmap::DashMap::new());
    let refresh_locks = Arc::new(dashmap::DashMap::new());
    tracing::info!("Token cache initialized");

    let client = YouTubeClient::new(
        config.google_client_id.clone(),
        config.google_client_secret.clone(),
        config.google.clone(),
    )?;
    let youtube_service =
        YouTubeService::new(client, db.clone(), cipher, token_cache, refresh_locks);
    let analytics_service =
        AnalyticsService::new(youtube_service.clone(), db.clone(), config.mock_data_fallback);

    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        youtube_service,
        analytics_service,
    });

    let app = creator_sync::routes::create_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("creator_sync=debug,info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(format)
        .init();
}
