// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (channel profile storage)
//! - Tokens (encrypted OAuth tokens)
//! - Daily analytics (one document per user per day)
//! - Onboarding progress

use crate::db::collections;
use crate::error::AppError;
use crate::models::analytics::doc_id as analytics_doc_id;
use crate::models::token::token_doc_id;
use crate::models::{DailyAnalytics, OnboardingProgress, Provider, TokenRecord, User};
use chrono::NaiveDate;

// Firestore limits batch/transaction writes to 500 operations.
// We use a safe limit of 400 to allow headroom.
const BATCH_SIZE: usize = 400;

/// Map a Firestore error, separating "cannot reach Firestore" from everything else.
fn db_err(e: firestore::errors::FirestoreError) -> AppError {
    match e {
        firestore::errors::FirestoreError::NetworkError(err) => {
            AppError::StorageUnavailable(err.to_string())
        }
        other => AppError::Database(other.to_string()),
    }
}

/// `db_err` with a prefix saying which step failed.
fn db_err_in(context: &str) -> impl FnOnce(firestore::errors::FirestoreError) -> AppError + '_ {
    move |e| match db_err(e) {
        AppError::StorageUnavailable(msg) => {
            AppError::StorageUnavailable(format!("{}: {}", context, msg))
        }
        AppError::Database(msg) => AppError::Database(format!("{}: {}", context, msg)),
        other => other,
    }
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id).await.map_err(|e| {
            AppError::StorageUnavailable(format!("Failed to connect to Firestore: {}", e))
        })?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::StorageUnavailable(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a disconnected client (offline mode).
    ///
    /// All database operations will return `StorageUnavailable`.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client.as_ref().ok_or_else(|| {
            AppError::StorageUnavailable("Database not connected (offline mode)".to_string())
        })
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Get a user by channel ID.
    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(&urlencoding::encode(user_id))
            .await
            .map_err(db_err)
    }

    /// Create or update a user.
    pub async fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(urlencoding::encode(&user.user_id))
            .object(user)
            .execute()
            .await
            .map_err(db_err)?;
        Ok(())
    }

    // ─── Token Operations ────────────────────────────────────────

    /// Get encrypted tokens for a user.
    pub async fn get_tokens(
        &self,
        provider: Provider,
        user_id: &str,
    ) -> Result<Option<TokenRecord>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::TOKENS)
            .obj()
            .one(&token_doc_id(provider, user_id))
            .await
            .map_err(db_err)
    }

    /// Store encrypted tokens for a user.
    pub async fn set_tokens(&self, tokens: &TokenRecord) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::TOKENS)
            .document_id(tokens.doc_id())
            .object(tokens)
            .execute()
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Delete tokens (for disconnect).
    pub async fn delete_tokens(&self, provider: Provider, user_id: &str) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::TOKENS)
            .document_id(token_doc_id(provider, user_id))
            .execute()
            .await
            .map_err(db_err)?;
        Ok(())
    }

    // ─── Daily Analytics Operations ──────────────────────────────

    /// Upsert daily rows in transactional batches.
    ///
    /// The document ID is derived from (user, date), so re-syncing a day
    /// replaces the earlier document.
    pub async fn upsert_daily_analytics(
        &self,
        records: &[DailyAnalytics],
    ) -> Result<usize, AppError> {
        let client = self.get_client()?;

        for chunk in records.chunks(BATCH_SIZE) {
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(db_err_in("Failed to begin transaction"))?;

            for record in chunk {
                client
                    .fluent()
                    .update()
                    .in_col(collections::DAILY_ANALYTICS)
                    .document_id(record.doc_id())
                    .object(record)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!(
                            "Failed to add analytics row to transaction: {}",
                            e
                        ))
                    })?;
            }

            transaction.commit().await.map_err(db_err)?;
        }

        Ok(records.len())
    }

    /// Get a user's daily rows within `[from, to]`, oldest first.
    pub async fn get_daily_analytics(
        &self,
        user_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyAnalytics>, AppError> {
        let user_id = user_id.to_string();
        // NaiveDate serializes as "YYYY-MM-DD", which sorts lexicographically.
        let from = from.format("%Y-%m-%d").to_string();
        let to = to.format("%Y-%m-%d").to_string();

        self.get_client()?
            .fluent()
            .select()
            .from(collections::DAILY_ANALYTICS)
            .filter(move |q| {
                q.for_all([
                    q.field("user_id").eq(user_id.clone()),
                    q.field("date").greater_than_or_equal(from.clone()),
                    q.field("date").less_than_or_equal(to.clone()),
                ])
            })
            .order_by([("date", firestore::FirestoreQueryDirection::Ascending)])
            .obj()
            .query()
            .await
            .map_err(db_err)
    }

    // ─── Onboarding Operations ───────────────────────────────────

    pub async fn get_onboarding(
        &self,
        user_id: &str,
    ) -> Result<Option<OnboardingProgress>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::ONBOARDING)
            .obj()
            .one(&urlencoding::encode(user_id))
            .await
            .map_err(db_err)
    }

    pub async fn set_onboarding(&self, progress: &OnboardingProgress) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::ONBOARDING)
            .document_id(urlencoding::encode(&progress.user_id))
            .object(progress)
            .execute()
            .await
            .map_err(db_err)?;
        Ok(())
    }

    // ─── Helper Methods ────────────────────────────────────────────

    /// Helper to batch delete documents using transactions.
    async fn batch_delete<T, F>(
        &self,
        items: &[T],
        collection: &str,
        id_extractor: F,
    ) -> Result<(), AppError>
    where
        F: Fn(&T) -> String,
    {
        let client = self.get_client()?;

        for chunk in items.chunks(BATCH_SIZE) {
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(db_err_in("Failed to begin transaction"))?;

            for item in chunk {
                let doc_id = id_extractor(item);
                client
                    .fluent()
                    .delete()
                    .from(collection)
                    .document_id(&doc_id)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!(
                            "Failed to add deletion to transaction for {}: {}",
                            collection, e
                        ))
                    })?;
            }

            transaction
                .commit()
                .await
                .map_err(db_err_in("Failed to commit batch deletion"))?;
        }

        Ok(())
    }

    // ─── User Data Deletion ───────────────────────────────────────

    /// Delete ALL stored data for a user except tokens.
    ///
    /// Deletes:
    /// - `daily_analytics` (query by user_id)
    /// - `onboarding/{user_id}`
    /// - `users/{user_id}`
    ///
    /// Returns the number of documents deleted.
    pub async fn delete_user_data(&self, user_id: &str) -> Result<usize, AppError> {
        let mut deleted_count = 0;

        // 1. Delete all daily analytics rows
        let owner = user_id.to_string();
        let rows: Vec<DailyAnalytics> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::DAILY_ANALYTICS)
            .filter(move |q| q.for_all([q.field("user_id").eq(owner.clone())]))
            .obj()
            .query()
            .await
            .map_err(db_err)?;

        let count = rows.len();
        self.batch_delete(&rows, collections::DAILY_ANALYTICS, |row: &DailyAnalytics| {
            analytics_doc_id(&row.user_id, row.date)
        })
        .await?;

        deleted_count += count;
        tracing::debug!(user_id, count, "Deleted daily analytics");

        // 2. Delete onboarding progress (counted only if it existed)
        if self.get_onboarding(user_id).await?.is_some() {
            self.get_client()?
                .fluent()
                .delete()
                .from(collections::ONBOARDING)
                .document_id(urlencoding::encode(user_id))
                .execute()
                .await
                .map_err(db_err)?;
            deleted_count += 1;
        }

        // 3. Delete user profile
        if self.get_user(user_id).await?.is_some() {
            self.get_client()?
                .fluent()
                .delete()
                .from(collections::USERS)
                .document_id(urlencoding::encode(user_id))
                .execute()
                .await
                .map_err(db_err)?;
            deleted_count += 1;
            tracing::debug!(user_id, "Deleted user profile");
        }

        tracing::info!(user_id, deleted_count, "User data deletion complete");

        Ok(deleted_count)
    }
}
