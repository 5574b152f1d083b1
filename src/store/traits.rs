//! Lifecycle persistence contract.
//!
//! The engine records what happened to each item (briefed, actioned,
//! skipped) so later briefings can exclude already-handled mail. Writes
//! during a session are fire-and-forget; `flush` at session end is the
//! durable path and every write is an idempotent upsert keyed by
//! `(user_id, item_id)`.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Terminal-ish lifecycle status of an item. Monotonic within a session:
/// pending → briefed → actioned/skipped, never backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStatus {
    Briefed,
    Actioned,
    Skipped,
}

impl LifecycleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Briefed => "briefed",
            Self::Actioned => "actioned",
            Self::Skipped => "skipped",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "briefed" => Some(Self::Briefed),
            "actioned" => Some(Self::Actioned),
            "skipped" => Some(Self::Skipped),
            _ => None,
        }
    }
}

/// One persisted lifecycle fact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleRecord {
    pub item_id: String,
    pub status: LifecycleStatus,
    /// Which action was taken, when status is `Actioned`.
    pub action: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Persistence collaborator for item lifecycle state.
#[async_trait]
pub trait LifecycleStore: Send + Sync {
    async fn mark_briefed(&self, user_id: &str, item_id: &str) -> Result<(), StoreError>;

    async fn mark_actioned(
        &self,
        user_id: &str,
        item_id: &str,
        action: &str,
    ) -> Result<(), StoreError>;

    async fn mark_skipped(&self, user_id: &str, item_id: &str) -> Result<(), StoreError>;

    /// Upsert a batch of records in one call. Used by the session-end flush.
    async fn mark_batch(
        &self,
        user_id: &str,
        records: &[LifecycleRecord],
    ) -> Result<(), StoreError>;

    /// IDs of every item the user has already handled in any way. Used to
    /// exclude them from the next briefing.
    async fn briefed_ids(&self, user_id: &str) -> Result<HashSet<String>, StoreError>;
}
