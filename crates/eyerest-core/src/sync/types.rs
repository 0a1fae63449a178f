//! Core types for remote synchronization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Syncable state category. One remote document exists per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncCategory {
    Settings,
    Statistics,
    Achievements,
    #[serde(rename = "timer_state")]
    Timer,
}

impl SyncCategory {
    pub const ALL: [SyncCategory; 4] = [
        SyncCategory::Settings,
        SyncCategory::Statistics,
        SyncCategory::Achievements,
        SyncCategory::Timer,
    ];

    /// Path segment of the category document.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncCategory::Settings => "settings",
            SyncCategory::Statistics => "statistics",
            SyncCategory::Achievements => "achievements",
            SyncCategory::Timer => "timer_state",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == s || (s == "timer" && *c == SyncCategory::Timer))
    }
}

impl std::fmt::Display for SyncCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one remote document: `(user_id, category, "current")`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentKey {
    pub user_id: String,
    pub category: SyncCategory,
}

impl DocumentKey {
    pub fn new(user_id: impl Into<String>, category: SyncCategory) -> Self {
        Self {
            user_id: user_id.into(),
            category,
        }
    }

    pub fn path(&self) -> String {
        format!("users/{}/{}/current", self.user_id, self.category.as_str())
    }
}

/// Serialized copy of one state category exchanged with the remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncDocument {
    pub category: SyncCategory,
    pub payload: serde_json::Value,
    /// Wall-clock time (epoch ms) of the change this document carries.
    pub last_updated: i64,
    /// Writer device; set for timer documents only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
}

/// Current sync status.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncStatus {
    pub signed_in: bool,
    pub enabled: bool,
    /// Whether remote subscriptions are running.
    pub subscribed: bool,
    pub device_id: String,
    pub last_upload_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// Sync error types.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Not signed in")]
    NotAuthenticated,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Remote store returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Local store error: {0}")]
    Store(#[from] StoreError),

    #[error("Remote store error: {0}")]
    Remote(String),
}
