//! User model for storage and API.

use serde::{Deserialize, Serialize};

/// User profile stored in Firestore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// YouTube channel ID (also used as document ID and JWT subject)
    pub user_id: String,
    /// Channel title
    pub channel_title: String,
    /// Channel thumbnail URL
    pub thumbnail_url: Option<String>,
    /// When user first connected
    pub created_at: String,
    /// Last sign-in timestamp
    pub last_active: String,
}
