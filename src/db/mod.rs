//! Database layer (Firestore, with an in-memory backend for tests and local runs).

pub mod firestore;
pub mod memory;

pub use self::firestore::FirestoreDb;
pub use memory::MemoryDb;

use crate::config::{Config, StorageBackend};
use crate::error::AppError;
use crate::models::{DailyAnalytics, OnboardingProgress, Provider, TokenRecord, User};
use chrono::NaiveDate;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const TOKENS: &str = "tokens";
    /// Daily analytics rows (keyed by `{user_id}_{YYYY-MM-DD}`)
    pub const DAILY_ANALYTICS: &str = "daily_analytics";
    pub const ONBOARDING: &str = "onboarding";
}

/// Storage handle shared by services. Both backends have identical semantics.
#[derive(Clone)]
pub enum Database {
    Firestore(FirestoreDb),
    Memory(MemoryDb),
}

macro_rules! dispatch {
    ($self:ident, $db:ident => $call:expr) => {
        match $self {
            Database::Firestore($db) => $call.await,
            Database::Memory($db) => $call.await,
        }
    };
}

impl Database {
    /// Connect the backend selected in the config.
    pub async fn connect(config: &Config) -> Result<Self, AppError> {
        match config.storage_backend {
            StorageBackend::Firestore => {
                Ok(Database::Firestore(FirestoreDb::new(&config.gcp_project_id).await?))
            }
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory storage; data is lost on restart");
                Ok(Database::Memory(MemoryDb::new()))
            }
        }
    }

    /// Fresh in-memory database.
    pub fn memory() -> Self {
        Database::Memory(MemoryDb::new())
    }

    /// Disconnected database: every operation fails with `StorageUnavailable`.
    pub fn offline() -> Self {
        Database::Firestore(FirestoreDb::new_mock())
    }

    // ─── Users ───────────────────────────────────────────────────

    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        dispatch!(self, db => db.get_user(user_id))
    }

    pub async fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        dispatch!(self, db => db.upsert_user(user))
    }

    // ─── Tokens ──────────────────────────────────────────────────

    pub async fn get_tokens(
        &self,
        provider: Provider,
        user_id: &str,
    ) -> Result<Option<TokenRecord>, AppError> {
        dispatch!(self, db => db.get_tokens(provider, user_id))
    }

    pub async fn set_tokens(&self, tokens: &TokenRecord) -> Result<(), AppError> {
        dispatch!(self, db => db.set_tokens(tokens))
    }

    pub async fn delete_tokens(&self, provider: Provider, user_id: &str) -> Result<(), AppError> {
        dispatch!(self, db => db.delete_tokens(provider, user_id))
    }

    // ─── Daily Analytics ─────────────────────────────────────────

    /// Insert or overwrite rows keyed by (user, date). Returns rows written.
    pub async fn upsert_daily_analytics(
        &self,
        records: &[DailyAnalytics],
    ) -> Result<usize, AppError> {
        dispatch!(self, db => db.upsert_daily_analytics(records))
    }

    /// Rows for `user_id` with `from <= date <= to`, oldest first.
    pub async fn get_daily_analytics(
        &self,
        user_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyAnalytics>, AppError> {
        dispatch!(self, db => db.get_daily_analytics(user_id, from, to))
    }

    // ─── Onboarding ──────────────────────────────────────────────

    pub async fn get_onboarding(
        &self,
        user_id: &str,
    ) -> Result<Option<OnboardingProgress>, AppError> {
        dispatch!(self, db => db.get_onboarding(user_id))
    }

    pub async fn set_onboarding(&self, progress: &OnboardingProgress) -> Result<(), AppError> {
        dispatch!(self, db => db.set_onboarding(progress))
    }

    // ─── Deletion ────────────────────────────────────────────────

    /// Delete analytics, onboarding and profile for a user.
    /// Tokens are deleted separately by the caller. Returns documents deleted.
    pub async fn delete_user_data(&self, user_id: &str) -> Result<usize, AppError> {
        dispatch!(self, db => db.delete_user_data(user_id))
    }
}
