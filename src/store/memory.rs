//! In-memory lifecycle store for tests and hosts without persistence.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::StoreError;
use crate::store::traits::{LifecycleRecord, LifecycleStatus, LifecycleStore};

#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<(String, String), LifecycleRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn upsert(&self, user_id: &str, record: LifecycleRecord) -> Result<(), StoreError> {
        let mut records = self
            .records
            .write()
            .map_err(|e| StoreError::Connection(format!("lock poisoned: {e}")))?;
        records.insert((user_id.to_string(), record.item_id.clone()), record);
        Ok(())
    }

    /// All records for a user, for test assertions.
    pub fn records_for(&self, user_id: &str) -> Vec<LifecycleRecord> {
        self.records
            .read()
            .map(|records| {
                records
                    .iter()
                    .filter(|((u, _), _)| u == user_id)
                    .map(|(_, r)| r.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl LifecycleStore for MemoryStore {
    async fn mark_briefed(&self, user_id: &str, item_id: &str) -> Result<(), StoreError> {
        self.upsert(
            user_id,
            LifecycleRecord {
                item_id: item_id.to_string(),
                status: LifecycleStatus::Briefed,
                action: None,
                updated_at: Utc::now(),
            },
        )
    }

    async fn mark_actioned(
        &self,
        user_id: &str,
        item_id: &str,
        action: &str,
    ) -> Result<(), StoreError> {
        self.upsert(
            user_id,
            LifecycleRecord {
                item_id: item_id.to_string(),
                status: LifecycleStatus::Actioned,
                action: Some(action.to_string()),
                updated_at: Utc::now(),
            },
        )
    }

    async fn mark_skipped(&self, user_id: &str, item_id: &str) -> Result<(), StoreError> {
        self.upsert(
            user_id,
            LifecycleRecord {
                item_id: item_id.to_string(),
                status: LifecycleStatus::Skipped,
                action: None,
                updated_at: Utc::now(),
            },
        )
    }

    async fn mark_batch(
        &self,
        user_id: &str,
        records: &[LifecycleRecord],
    ) -> Result<(), StoreError> {
        for record in records {
            self.upsert(user_id, record.clone())?;
        }
        Ok(())
    }

    async fn briefed_ids(&self, user_id: &str) -> Result<HashSet<String>, StoreError> {
        let records = self
            .records
            .read()
            .map_err(|e| StoreError::Connection(format!("lock poisoned: {e}")))?;
        Ok(records
            .keys()
            .filter(|(u, _)| u == user_id)
            .map(|(_, item)| item.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upsert_replaces_earlier_status() {
        let store = MemoryStore::new();
        store.mark_briefed("u1", "m1").await.unwrap();
        store.mark_actioned("u1", "m1", "archive_email").await.unwrap();

        let records = store.records_for("u1");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, LifecycleStatus::Actioned);
        assert_eq!(records[0].action.as_deref(), Some("archive_email"));
    }

    #[tokio::test]
    async fn briefed_ids_covers_all_statuses() {
        let store = MemoryStore::new();
        store.mark_briefed("u1", "a").await.unwrap();
        store.mark_actioned("u1", "b", "mark_read").await.unwrap();
        store.mark_skipped("u1", "c").await.unwrap();
        store.mark_briefed("other", "d").await.unwrap();

        let ids = store.briefed_ids("u1").await.unwrap();
        assert_eq!(ids.len(), 3);
        assert!(!ids.contains("d"));
    }
}
