//! Shared types for the briefing pipeline.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PipelineError;
use crate::signals::CompositeScore;

// ── Inbox item ──────────────────────────────────────────────────────

/// One inbox message being triaged. Immutable once fetched; the pipeline
/// owns it until it is handed to the session tracker as a `TopicItem`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    /// Provider-native message ID.
    pub id: String,
    pub subject: String,
    pub sender: String,
    /// Short body preview.
    pub snippet: String,
    pub received_at: DateTime<Utc>,
    pub thread_id: String,
    /// Sender is a known VIP (precomputed by the host or the VIP detector).
    pub is_vip: bool,
    /// The user has already replied somewhere in this thread.
    pub has_been_replied: bool,
}

/// An item plus its composite importance score.
#[derive(Debug, Clone)]
pub struct ScoredItem {
    pub item: Item,
    pub score: CompositeScore,
}

// ── Topics ──────────────────────────────────────────────────────────

/// Priority assigned to a topic during clustering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

/// The briefing-view reference to an item: the ID plus what narration needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicItem {
    pub item_id: String,
    pub subject: String,
    pub sender: String,
    /// One-sentence spoken summary.
    pub summary: String,
    pub is_vip: bool,
    /// Composite importance score.
    pub score: f32,
    pub is_flagged: bool,
}

impl TopicItem {
    /// Build the briefing view of a scored item with the default summary.
    pub fn from_scored(scored: &ScoredItem) -> Self {
        Self::from_scored_with_summary(
            scored,
            format!("{} from {}", scored.item.subject, scored.item.sender),
        )
    }

    pub fn from_scored_with_summary(scored: &ScoredItem, summary: String) -> Self {
        Self {
            item_id: scored.item.id.clone(),
            subject: scored.item.subject.clone(),
            sender: scored.item.sender.clone(),
            summary,
            is_vip: scored.item.is_vip,
            score: scored.score.score,
            is_flagged: scored.score.is_flagged,
        }
    }
}

/// A labeled cluster of items. Created once per clustering pass; the
/// background worker appends new topics but never mutates existing ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    pub id: Uuid,
    pub label: String,
    pub priority: Priority,
    pub items: Vec<TopicItem>,
}

impl Topic {
    pub fn new(label: impl Into<String>, priority: Priority, items: Vec<TopicItem>) -> Self {
        Self {
            id: Uuid::new_v4(),
            label: label.into(),
            priority,
            items,
        }
    }
}

// ── Preprocessing result ────────────────────────────────────────────

/// Output of batch preprocessing: resolved first-batch topics plus the
/// unresolved remainder for background processing.
#[derive(Debug)]
pub struct PreprocessOutcome {
    pub topics: Vec<Topic>,
    pub remaining: Vec<Vec<ScoredItem>>,
    pub total_fetched: usize,
}

/// The assembled briefing returned to the host.
#[derive(Debug)]
pub struct Briefing {
    pub topics: Vec<Topic>,
    /// Unresolved batches for the background worker. Empty on the
    /// heuristic path.
    pub remaining: Vec<Vec<ScoredItem>>,
    pub total_fetched: usize,
}

// ── Item source trait ───────────────────────────────────────────────

/// Filter for an unread fetch.
#[derive(Debug, Clone, Default)]
pub struct FetchFilter {
    /// Only items received after this instant.
    pub after: Option<DateTime<Utc>>,
}

/// Paging parameters for an unread fetch.
#[derive(Debug, Clone)]
pub struct Paging {
    pub page_size: usize,
    pub page_token: Option<String>,
}

/// One page of fetched items.
#[derive(Debug, Clone)]
pub struct Page {
    pub items: Vec<Item>,
    pub next_page_token: Option<String>,
}

/// Ingestion collaborator — pure I/O, no triage logic.
#[async_trait]
pub trait ItemSource: Send + Sync {
    /// Fetch a page of unread items.
    async fn fetch_unread(&self, filter: &FetchFilter, paging: &Paging)
    -> Result<Page, PipelineError>;
}
