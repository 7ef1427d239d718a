// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Creator-Sync: YouTube channel analytics backend
//!
//! This crate provides the backend API that keeps a creator's YouTube OAuth
//! tokens fresh, syncs daily channel metrics into storage, and serves
//! summaries to the dashboard.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::Database;
use services::{AnalyticsService, YouTubeService};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub youtube_service: YouTubeService,
    pub analytics_service: AnalyticsService,
}
