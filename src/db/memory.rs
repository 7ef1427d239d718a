//! In-memory storage backend.
//!
//! Same keys and overwrite semantics as the Firestore backend. Used by tests
//! and by local runs with `STORAGE_BACKEND=memory`.

use crate::error::AppError;
use crate::models::token::token_doc_id;
use crate::models::{DailyAnalytics, OnboardingProgress, Provider, TokenRecord, User};
use chrono::NaiveDate;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Process-local database. Clones share the same maps.
#[derive(Clone, Default)]
pub struct MemoryDb {
    users: Arc<DashMap<String, User>>,
    tokens: Arc<DashMap<String, TokenRecord>>,
    /// Per-user rows, ordered by day
    analytics: Arc<DashMap<String, BTreeMap<NaiveDate, DailyAnalytics>>>,
    onboarding: Arc<DashMap<String, OnboardingProgress>>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        Ok(self.users.get(user_id).map(|u| u.clone()))
    }

    pub async fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        self.users.insert(user.user_id.clone(), user.clone());
        Ok(())
    }

    pub async fn get_tokens(
        &self,
        provider: Provider,
        user_id: &str,
    ) -> Result<Option<TokenRecord>, AppError> {
        Ok(self
            .tokens
            .get(&token_doc_id(provider, user_id))
            .map(|t| t.clone()))
    }

    pub async fn set_tokens(&self, tokens: &TokenRecord) -> Result<(), AppError> {
        self.tokens.insert(tokens.doc_id(), tokens.clone());
        Ok(())
    }

    pub async fn delete_tokens(&self, provider: Provider, user_id: &str) -> Result<(), AppError> {
        self.tokens.remove(&token_doc_id(provider, user_id));
        Ok(())
    }

    pub async fn upsert_daily_analytics(
        &self,
        records: &[DailyAnalytics],
    ) -> Result<usize, AppError> {
        for record in records {
            self.analytics
                .entry(record.user_id.clone())
                .or_default()
                .insert(record.date, record.clone());
        }
        Ok(records.len())
    }

    pub async fn get_daily_analytics(
        &self,
        user_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyAnalytics>, AppError> {
        if from > to {
            return Ok(Vec::new());
        }
        Ok(self
            .analytics
            .get(user_id)
            .map(|rows| rows.range(from..=to).map(|(_, r)| r.clone()).collect())
            .unwrap_or_default())
    }

    pub async fn get_onboarding(
        &self,
        user_id: &str,
    ) -> Result<Option<OnboardingProgress>, AppError> {
        Ok(self.onboarding.get(user_id).map(|p| p.clone()))
    }

    pub async fn set_onboarding(&self, progress: &OnboardingProgress) -> Result<(), AppError> {
        self.onboarding
            .insert(progress.user_id.clone(), progress.clone());
        Ok(())
    }

    pub async fn delete_user_data(&self, user_id: &str) -> Result<usize, AppError> {
        let mut deleted_count = self
            .analytics
            .remove(user_id)
            .map(|(_, rows)| rows.len())
            .unwrap_or(0);
        deleted_count += usize::from(self.onboarding.remove(user_id).is_some());
        deleted_count += usize::from(self.users.remove(user_id).is_some());

        tracing::info!(user_id, deleted_count, "User data deletion complete");
        Ok(deleted_count)
    }
}
