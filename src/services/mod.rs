// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod analytics;
pub mod cipher;
pub mod youtube;

pub use analytics::{AnalyticsService, DataSource};
pub use cipher::TokenCipher;
pub use youtube::{OAuthResult, YouTubeClient, YouTubeService};
