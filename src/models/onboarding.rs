// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Dashboard tutorial progress, stored per user.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Tutorial steps, in the order they are presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingStep {
    ConnectAccount,
    SyncAnalytics,
    ViewDashboard,
    CreateContent,
    PublishContent,
}

impl OnboardingStep {
    pub const ALL: [OnboardingStep; 5] = [
        OnboardingStep::ConnectAccount,
        OnboardingStep::SyncAnalytics,
        OnboardingStep::ViewDashboard,
        OnboardingStep::CreateContent,
        OnboardingStep::PublishContent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OnboardingStep::ConnectAccount => "connect_account",
            OnboardingStep::SyncAnalytics => "sync_analytics",
            OnboardingStep::ViewDashboard => "view_dashboard",
            OnboardingStep::CreateContent => "create_content",
            OnboardingStep::PublishContent => "publish_content",
        }
    }
}

impl FromStr for OnboardingStep {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OnboardingStep::ALL
            .into_iter()
            .find(|step| step.as_str() == s)
            .ok_or_else(|| format!("unknown onboarding step '{}'", s))
    }
}

/// Tutorial progress for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct OnboardingProgress {
    pub user_id: String,
    /// Completed steps, kept in tutorial order
    #[serde(default)]
    pub completed_steps: Vec<OnboardingStep>,
    /// First step not yet completed; None once everything is done
    pub current_step: Option<OnboardingStep>,
    #[serde(default)]
    pub dismissed: bool,
    #[serde(default)]
    pub updated_at: String,
}

impl OnboardingProgress {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            completed_steps: Vec::new(),
            current_step: Some(OnboardingStep::ALL[0]),
            dismissed: false,
            updated_at: String::new(),
        }
    }

    /// Mark a step complete.
    ///
    /// Returns `false` if it was already complete (nothing changes).
    pub fn complete(&mut self, step: OnboardingStep, now: &str) -> bool {
        if self.completed_steps.contains(&step) {
            return false;
        }
        self.completed_steps.push(step);
        self.completed_steps.sort();
        self.current_step = OnboardingStep::ALL
            .into_iter()
            .find(|s| !self.completed_steps.contains(s));
        self.updated_at = now.to_string();
        true
    }

    pub fn dismiss(&mut self, now: &str) {
        self.dismissed = true;
        self.updated_at = now.to_string();
    }

    pub fn reset(&mut self, now: &str) {
        *self = Self::new(&self.user_id);
        self.updated_at = now.to_string();
    }

    pub fn is_finished(&self) -> bool {
        self.current_step.is_none()
    }
}
