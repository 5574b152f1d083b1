//! Per-item session state and the briefing cursor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of one item within the live session. Transitions are monotonic:
/// pending → briefed → actioned/skipped. `mark_*` calls that would move
/// backwards are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailStatus {
    Pending,
    Briefed,
    Actioned,
    Skipped,
}

impl EmailStatus {
    /// Rank in the monotonic ordering. Actioned and Skipped are both
    /// terminal and neither replaces the other.
    pub(crate) fn rank(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Briefed => 1,
            Self::Actioned | Self::Skipped => 2,
        }
    }
}

/// Session-local record for one briefed item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailState {
    pub item_id: String,
    pub topic_index: usize,
    pub item_index: usize,
    pub status: EmailStatus,
    pub action_taken: Option<String>,
    pub briefed_at: Option<DateTime<Utc>>,
    pub actioned_at: Option<DateTime<Utc>>,
}

/// Position within the briefing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Cursor {
    At { topic: usize, item: usize },
    Complete,
}

/// Snapshot of session progress for narration and tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Progress {
    pub briefed: usize,
    pub actioned: usize,
    pub skipped: usize,
    pub remaining: usize,
    pub total: usize,
    /// Label of the topic under the cursor, if any.
    pub current_topic: Option<String>,
    /// Item ID under the cursor, if any.
    pub current_item: Option<String>,
}
