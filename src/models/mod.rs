// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod analytics;
pub mod onboarding;
pub mod summary;
pub mod token;
pub mod user;

pub use analytics::DailyAnalytics;
pub use onboarding::{OnboardingProgress, OnboardingStep};
pub use summary::{AnalyticsSummary, DashboardSummary, GrowthMetrics};
pub use token::{Provider, TokenRecord, TokenState};
pub use user::User;
