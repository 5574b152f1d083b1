//! Session tracker — the cursor state machine over a briefing.
//!
//! All mutable state lives behind one async mutex, so concurrent calls
//! from the reasoning loop and the background worker serialize cleanly.
//! Status writes go to the store fire-and-forget; `flush_to_store` at
//! session end is the durable path and covers any write that was lost.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::pipeline::types::{Topic, TopicItem};
use crate::session::state::{Cursor, EmailState, EmailStatus, Progress};
use crate::store::{LifecycleRecord, LifecycleStatus, LifecycleStore};

/// What the reasoning loop sees at the cursor.
#[derive(Debug, Clone)]
pub struct CursorView {
    pub topic_index: usize,
    pub topic_label: String,
    pub item: TopicItem,
}

struct TrackerInner {
    topics: Vec<Topic>,
    states: HashMap<String, EmailState>,
    cursor: Cursor,
    /// Prior cursor positions, for `go_back`. Only `At` positions are pushed.
    history: Vec<Cursor>,
}

/// Tracks per-item status and the narration cursor for one session.
pub struct SessionTracker {
    user_id: String,
    store: Arc<dyn LifecycleStore>,
    inner: Mutex<TrackerInner>,
}

impl SessionTracker {
    pub fn new(user_id: impl Into<String>, store: Arc<dyn LifecycleStore>, topics: Vec<Topic>) -> Self {
        let mut states = HashMap::new();
        for (ti, topic) in topics.iter().enumerate() {
            for (ii, item) in topic.items.iter().enumerate() {
                states.insert(
                    item.item_id.clone(),
                    EmailState {
                        item_id: item.item_id.clone(),
                        topic_index: ti,
                        item_index: ii,
                        status: EmailStatus::Pending,
                        action_taken: None,
                        briefed_at: None,
                        actioned_at: None,
                    },
                );
            }
        }
        let mut inner = TrackerInner {
            cursor: Cursor::Complete,
            topics,
            states,
            history: Vec::new(),
        };
        // Topics may arrive with empty or pre-handled leading entries; the
        // cursor starts on the first actually pending item.
        inner.cursor = next_pending(&inner, 0, 0);
        Self {
            user_id: user_id.into(),
            store,
            inner: Mutex::new(inner),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    // ── Cursor movement ─────────────────────────────────────────────

    /// The item under the cursor, without moving it.
    pub async fn current(&self) -> Option<CursorView> {
        let inner = self.inner.lock().await;
        view_at(&inner, inner.cursor)
    }

    /// Mark the current item briefed and move to the next pending item.
    /// Returns the new cursor view, or `None` when the briefing is complete.
    pub async fn advance(&self) -> Option<CursorView> {
        let mut inner = self.inner.lock().await;
        let Cursor::At { topic, item } = inner.cursor else {
            return None;
        };

        if let Some(id) = item_id_at(&inner, topic, item)
            && let Some(state) = inner.states.get_mut(&id)
            && state.status == EmailStatus::Pending
        {
            state.status = EmailStatus::Briefed;
            state.briefed_at = Some(Utc::now());
            self.persist(id, LifecycleStatus::Briefed, None);
        }

        let cursor = inner.cursor;
        inner.history.push(cursor);
        inner.cursor = next_pending(&inner, topic, item + 1);
        debug!(cursor = ?inner.cursor, "Cursor advanced");
        view_at(&inner, inner.cursor)
    }

    /// Skip every pending item in the current topic and move to the next
    /// topic with pending items.
    pub async fn skip_topic(&self) -> Option<CursorView> {
        let mut inner = self.inner.lock().await;
        let Cursor::At { topic, .. } = inner.cursor else {
            return None;
        };

        let ids: Vec<String> = inner.topics[topic]
            .items
            .iter()
            .map(|i| i.item_id.clone())
            .collect();
        for id in ids {
            if let Some(state) = inner.states.get_mut(&id)
                && state.status == EmailStatus::Pending
            {
                state.status = EmailStatus::Skipped;
                self.persist(id, LifecycleStatus::Skipped, None);
            }
        }

        let cursor = inner.cursor;
        inner.history.push(cursor);
        inner.cursor = next_pending(&inner, topic + 1, 0);
        info!(topic, cursor = ?inner.cursor, "Topic skipped");
        view_at(&inner, inner.cursor)
    }

    /// Return to the previous cursor position. Statuses are not reverted,
    /// so the cursor may land on an already-handled item; a subsequent
    /// `advance` skips forward past it.
    pub async fn go_back(&self) -> Option<CursorView> {
        let mut inner = self.inner.lock().await;
        let previous = inner.history.pop()?;
        inner.cursor = previous;
        view_at(&inner, inner.cursor)
    }

    // ── Status transitions ──────────────────────────────────────────

    /// Record that an item was briefed. No-op if it already moved further.
    pub async fn mark_briefed(&self, item_id: &str) {
        self.transition(item_id, EmailStatus::Briefed, None).await;
    }

    /// Record that an action was taken on an item.
    pub async fn mark_actioned(&self, item_id: &str, action: &str) {
        self.transition(item_id, EmailStatus::Actioned, Some(action.to_string()))
            .await;
    }

    /// Record that an item was skipped.
    pub async fn mark_skipped(&self, item_id: &str) {
        self.transition(item_id, EmailStatus::Skipped, None).await;
    }

    async fn transition(&self, item_id: &str, status: EmailStatus, action: Option<String>) {
        let mut inner = self.inner.lock().await;
        let Some(state) = inner.states.get_mut(item_id) else {
            warn!(item_id, "Status change for unknown item ignored");
            return;
        };
        // Monotonic: never move backwards, never flip between terminals.
        if status.rank() <= state.status.rank() {
            debug!(item_id, from = ?state.status, to = ?status, "Ignoring backwards status change");
            return;
        }
        state.status = status;
        match status {
            EmailStatus::Briefed => state.briefed_at = Some(Utc::now()),
            EmailStatus::Actioned => {
                state.actioned_at = Some(Utc::now());
                state.action_taken = action.clone();
            }
            _ => {}
        }
        let lifecycle = match status {
            EmailStatus::Briefed => LifecycleStatus::Briefed,
            EmailStatus::Actioned => LifecycleStatus::Actioned,
            EmailStatus::Skipped => LifecycleStatus::Skipped,
            EmailStatus::Pending => return,
        };
        self.persist(item_id.to_string(), lifecycle, action);
    }

    /// Fire-and-forget store write. Failures are logged, never surfaced;
    /// the session-end flush is the durable path.
    fn persist(&self, item_id: String, status: LifecycleStatus, action: Option<String>) {
        let store = self.store.clone();
        let user_id = self.user_id.clone();
        tokio::spawn(async move {
            let result = match status {
                LifecycleStatus::Briefed => store.mark_briefed(&user_id, &item_id).await,
                LifecycleStatus::Actioned => {
                    store
                        .mark_actioned(&user_id, &item_id, action.as_deref().unwrap_or(""))
                        .await
                }
                LifecycleStatus::Skipped => store.mark_skipped(&user_id, &item_id).await,
            };
            if let Err(e) = result {
                warn!(error = %e, item_id, "Failed to persist lifecycle status");
            }
        });
    }

    // ── Topic appends from the background worker ────────────────────

    /// Append topics resolved in the background. Existing topics are never
    /// mutated. A completed cursor is revived onto the first pending item
    /// among the appended topics.
    pub async fn add_topics(&self, topics: Vec<Topic>) {
        if topics.is_empty() {
            return;
        }
        let mut inner = self.inner.lock().await;
        let first_new = inner.topics.len();
        for (offset, topic) in topics.iter().enumerate() {
            for (ii, item) in topic.items.iter().enumerate() {
                inner
                    .states
                    .entry(item.item_id.clone())
                    .or_insert_with(|| EmailState {
                        item_id: item.item_id.clone(),
                        topic_index: first_new + offset,
                        item_index: ii,
                        status: EmailStatus::Pending,
                        action_taken: None,
                        briefed_at: None,
                        actioned_at: None,
                    });
            }
        }
        let added = topics.len();
        inner.topics.extend(topics);
        if inner.cursor == Cursor::Complete {
            inner.cursor = next_pending(&inner, first_new, 0);
        }
        info!(added, total = inner.topics.len(), "Topics appended to session");
    }

    // ── Introspection ───────────────────────────────────────────────

    pub async fn progress(&self) -> Progress {
        let inner = self.inner.lock().await;
        let mut briefed = 0;
        let mut actioned = 0;
        let mut skipped = 0;
        let mut remaining = 0;
        for state in inner.states.values() {
            match state.status {
                EmailStatus::Pending => remaining += 1,
                EmailStatus::Briefed => briefed += 1,
                EmailStatus::Actioned => actioned += 1,
                EmailStatus::Skipped => skipped += 1,
            }
        }
        let (current_topic, current_item) = match inner.cursor {
            Cursor::At { topic, item } => (
                inner.topics.get(topic).map(|t| t.label.clone()),
                inner
                    .topics
                    .get(topic)
                    .and_then(|t| t.items.get(item))
                    .map(|i| i.item_id.clone()),
            ),
            Cursor::Complete => (None, None),
        };
        Progress {
            briefed,
            actioned,
            skipped,
            remaining,
            total: inner.states.len(),
            current_topic,
            current_item,
        }
    }

    /// Write every non-pending status to the store in one batch. Safe to
    /// call more than once; all writes are idempotent upserts.
    pub async fn flush_to_store(&self) -> Result<usize, StoreError> {
        let records: Vec<LifecycleRecord> = {
            let inner = self.inner.lock().await;
            inner
                .states
                .values()
                .filter_map(|state| {
                    let status = match state.status {
                        EmailStatus::Pending => return None,
                        EmailStatus::Briefed => LifecycleStatus::Briefed,
                        EmailStatus::Actioned => LifecycleStatus::Actioned,
                        EmailStatus::Skipped => LifecycleStatus::Skipped,
                    };
                    Some(LifecycleRecord {
                        item_id: state.item_id.clone(),
                        status,
                        action: state.action_taken.clone(),
                        updated_at: state
                            .actioned_at
                            .or(state.briefed_at)
                            .unwrap_or_else(Utc::now),
                    })
                })
                .collect()
        };
        if records.is_empty() {
            return Ok(0);
        }
        self.store.mark_batch(&self.user_id, &records).await?;
        info!(count = records.len(), "Session state flushed to store");
        Ok(records.len())
    }

    // ── Prompt context ──────────────────────────────────────────────

    /// One-paragraph description of where the briefing stands, injected
    /// into the reasoner's context each turn.
    pub async fn build_cursor_context(&self) -> String {
        let inner = self.inner.lock().await;
        match inner.cursor {
            Cursor::At { topic, item } => {
                let t = &inner.topics[topic];
                let entry = &t.items[item];
                format!(
                    "Currently on topic {}/{} \"{}\", email {}/{}: \"{}\" from {} (id: {}). Summary: {}",
                    topic + 1,
                    inner.topics.len(),
                    t.label,
                    item + 1,
                    t.items.len(),
                    entry.subject,
                    entry.sender,
                    entry.item_id,
                    entry.summary,
                )
            }
            Cursor::Complete => {
                "The briefing is complete; every email has been covered.".to_string()
            }
        }
    }

    /// Compact listing of the pending items grouped by topic, for
    /// navigation and disambiguation by the reasoner.
    pub async fn build_compact_reference(&self) -> String {
        let inner = self.inner.lock().await;
        let mut out = String::new();
        for (ti, topic) in inner.topics.iter().enumerate() {
            let pending: Vec<&TopicItem> = topic
                .items
                .iter()
                .filter(|i| {
                    inner
                        .states
                        .get(&i.item_id)
                        .is_some_and(|s| s.status == EmailStatus::Pending)
                })
                .collect();
            if pending.is_empty() {
                continue;
            }
            out.push_str(&format!("Topic {}: {}\n", ti + 1, topic.label));
            for entry in pending {
                out.push_str(&format!(
                    "  - [{}] {} from {}\n",
                    entry.item_id, entry.subject, entry.sender
                ));
            }
        }
        if out.is_empty() {
            out.push_str("No pending emails remain.\n");
        }
        out
    }
}

fn item_id_at(inner: &TrackerInner, topic: usize, item: usize) -> Option<String> {
    inner
        .topics
        .get(topic)
        .and_then(|t| t.items.get(item))
        .map(|i| i.item_id.clone())
}

fn view_at(inner: &TrackerInner, cursor: Cursor) -> Option<CursorView> {
    let Cursor::At { topic, item } = cursor else {
        return None;
    };
    let t = inner.topics.get(topic)?;
    let entry = t.items.get(item)?;
    Some(CursorView {
        topic_index: topic,
        topic_label: t.label.clone(),
        item: entry.clone(),
    })
}

/// First pending item at or after `(topic, item)`, scanning forward only.
fn next_pending(inner: &TrackerInner, mut topic: usize, mut item: usize) -> Cursor {
    while topic < inner.topics.len() {
        let items = &inner.topics[topic].items;
        while item < items.len() {
            let pending = inner
                .states
                .get(&items[item].item_id)
                .is_some_and(|s| s.status == EmailStatus::Pending);
            if pending {
                return Cursor::At { topic, item };
            }
            item += 1;
        }
        topic += 1;
        item = 0;
    }
    Cursor::Complete
}
