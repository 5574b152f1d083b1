//! libSQL lifecycle store — local file or in-memory database.
//!
//! All writes are upserts keyed by `(user_id, item_id)`, so a missed
//! fire-and-forget write followed by the session-end flush never
//! duplicates a row or reorders statuses.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::store::traits::{LifecycleRecord, LifecycleStatus, LifecycleStore};

/// libSQL-backed lifecycle store.
///
/// Holds a single connection reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlStore {
    /// Open (or create) a local database file and initialize the schema.
    pub async fn new_local(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Connection(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Connection(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| StoreError::Connection(format!("Failed to create connection: {e}")))?;

        let store = Self {
            db: Arc::new(db),
            conn,
        };
        store.init_schema().await?;
        info!(path = %path.display(), "Lifecycle database opened");
        Ok(store)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, StoreError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                StoreError::Connection(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| StoreError::Connection(format!("Failed to create connection: {e}")))?;

        let store = Self {
            db: Arc::new(db),
            conn,
        };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        self.conn
            .execute(
                "CREATE TABLE IF NOT EXISTS email_lifecycle (
                    user_id TEXT NOT NULL,
                    item_id TEXT NOT NULL,
                    status TEXT NOT NULL,
                    action TEXT,
                    updated_at TEXT NOT NULL,
                    PRIMARY KEY (user_id, item_id)
                )",
                (),
            )
            .await
            .map_err(|e| StoreError::Query(format!("init_schema: {e}")))?;
        Ok(())
    }

    async fn upsert(
        &self,
        user_id: &str,
        item_id: &str,
        status: LifecycleStatus,
        action: Option<&str>,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT INTO email_lifecycle (user_id, item_id, status, action, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(user_id, item_id) DO UPDATE SET
                     status = excluded.status,
                     action = excluded.action,
                     updated_at = excluded.updated_at",
                params![
                    user_id,
                    item_id,
                    status.as_str(),
                    action.map(String::from),
                    updated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| StoreError::Query(format!("upsert lifecycle: {e}")))?;

        debug!(user_id, item_id, status = status.as_str(), "Lifecycle row upserted");
        Ok(())
    }
}

#[async_trait]
impl LifecycleStore for LibSqlStore {
    async fn mark_briefed(&self, user_id: &str, item_id: &str) -> Result<(), StoreError> {
        self.upsert(user_id, item_id, LifecycleStatus::Briefed, None, Utc::now())
            .await
    }

    async fn mark_actioned(
        &self,
        user_id: &str,
        item_id: &str,
        action: &str,
    ) -> Result<(), StoreError> {
        self.upsert(
            user_id,
            item_id,
            LifecycleStatus::Actioned,
            Some(action),
            Utc::now(),
        )
        .await
    }

    async fn mark_skipped(&self, user_id: &str, item_id: &str) -> Result<(), StoreError> {
        self.upsert(user_id, item_id, LifecycleStatus::Skipped, None, Utc::now())
            .await
    }

    async fn mark_batch(
        &self,
        user_id: &str,
        records: &[LifecycleRecord],
    ) -> Result<(), StoreError> {
        for record in records {
            self.upsert(
                user_id,
                &record.item_id,
                record.status,
                record.action.as_deref(),
                record.updated_at,
            )
            .await?;
        }
        Ok(())
    }

    async fn briefed_ids(
        &self,
        user_id: &str,
    ) -> Result<std::collections::HashSet<String>, StoreError> {
        let mut rows = self
            .conn
            .query(
                "SELECT item_id FROM email_lifecycle WHERE user_id = ?1",
                params![user_id],
            )
            .await
            .map_err(|e| StoreError::Query(format!("briefed_ids: {e}")))?;

        let mut ids = std::collections::HashSet::new();
        loop {
            match rows.next().await {
                Ok(Some(row)) => {
                    let id: String = row
                        .get(0)
                        .map_err(|e| StoreError::Query(format!("briefed_ids row: {e}")))?;
                    ids.insert(id);
                }
                Ok(None) => break,
                Err(e) => return Err(StoreError::Query(format!("briefed_ids: {e}"))),
            }
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn marks_round_trip() {
        let store = LibSqlStore::new_memory().await.unwrap();
        store.mark_briefed("u1", "a").await.unwrap();
        store.mark_actioned("u1", "b", "archive_email").await.unwrap();
        store.mark_skipped("u1", "c").await.unwrap();

        let ids = store.briefed_ids("u1").await.unwrap();
        assert_eq!(ids.len(), 3);
        assert!(store.briefed_ids("other").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn double_flush_is_idempotent() {
        let store = LibSqlStore::new_memory().await.unwrap();
        let records = vec![
            LifecycleRecord {
                item_id: "a".into(),
                status: LifecycleStatus::Briefed,
                action: None,
                updated_at: Utc::now(),
            },
            LifecycleRecord {
                item_id: "b".into(),
                status: LifecycleStatus::Actioned,
                action: Some("mark_read".into()),
                updated_at: Utc::now(),
            },
        ];
        store.mark_batch("u1", &records).await.unwrap();
        store.mark_batch("u1", &records).await.unwrap();

        let ids = store.briefed_ids("u1").await.unwrap();
        assert_eq!(ids.len(), 2);
    }

    #[tokio::test]
    async fn upsert_overwrites_status() {
        let store = LibSqlStore::new_memory().await.unwrap();
        store.mark_briefed("u1", "a").await.unwrap();
        store.mark_actioned("u1", "a", "draft_reply").await.unwrap();

        let mut rows = store
            .conn
            .query(
                "SELECT status, action FROM email_lifecycle WHERE user_id = ?1 AND item_id = ?2",
                params!["u1", "a"],
            )
            .await
            .unwrap();
        let row = rows.next().await.unwrap().unwrap();
        assert_eq!(row.get::<String>(0).unwrap(), "actioned");
        assert_eq!(row.get::<String>(1).unwrap(), "draft_reply");
    }

    #[tokio::test]
    async fn local_file_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lifecycle.db");
        {
            let store = LibSqlStore::new_local(&path).await.unwrap();
            store.mark_briefed("u1", "a").await.unwrap();
        }
        let store = LibSqlStore::new_local(&path).await.unwrap();
        assert!(store.briefed_ids("u1").await.unwrap().contains("a"));
    }
}
