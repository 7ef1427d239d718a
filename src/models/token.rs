// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth token records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::time_utils::parse_utc_rfc3339;

/// OAuth provider a token belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    YouTube,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::YouTube => "youtube",
        }
    }
}

/// A user's OAuth tokens for one provider (encrypted in storage).
///
/// Document ID: `{provider}_{user_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub user_id: String,
    pub provider: Provider,
    /// Encrypted access token (base64)
    pub access_token_encrypted: String,
    /// Encrypted refresh token (base64); without it the record cannot be renewed
    #[serde(default)]
    pub refresh_token_encrypted: Option<String>,
    /// When the access token expires (RFC3339); None if the provider did not say
    #[serde(default)]
    pub expires_at: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Granted OAuth scopes
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Last write (RFC3339)
    #[serde(default)]
    pub updated_at: String,
}

/// Lifecycle position of a user's token record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum TokenState {
    Unauthenticated,
    Valid,
    Expired { refreshable: bool },
}

/// Storage document ID for a (provider, user) pair.
pub fn token_doc_id(provider: Provider, user_id: &str) -> String {
    format!("{}_{}", provider.as_str(), urlencoding::encode(user_id))
}

impl TokenRecord {
    pub fn doc_id(&self) -> String {
        token_doc_id(self.provider, &self.user_id)
    }

    /// Parsed expiry. Unparseable timestamps count as already expired.
    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        self.expires_at
            .as_deref()
            .map(|raw| parse_utc_rfc3339(raw).unwrap_or(DateTime::<Utc>::MIN_UTC))
    }

    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token_encrypted
            .as_deref()
            .is_some_and(|t| !t.is_empty())
    }

    /// Whether the access token is unusable at `now` (with `margin` slack).
    /// A record without an expiry is treated as valid.
    pub fn is_expired(&self, now: DateTime<Utc>, margin: chrono::Duration) -> bool {
        match self.expiry() {
            Some(expiry) => now + margin >= expiry,
            None => false,
        }
    }

    pub fn state(&self, now: DateTime<Utc>, margin: chrono::Duration) -> TokenState {
        if self.is_expired(now, margin) {
            TokenState::Expired {
                refreshable: self.has_refresh_token(),
            }
        } else {
            TokenState::Valid
        }
    }
}
