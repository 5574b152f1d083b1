//! Background batch worker — resolves the remaining preprocessing batches
//! after the briefing has already started, appending topics to the live
//! session as each batch completes.

use std::sync::{Arc, Weak};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::llm::Reasoner;
use crate::pipeline::preprocess::{BatchPreprocessor, fallback_topics};
use crate::pipeline::types::ScoredItem;
use crate::session::SessionTracker;

/// Handle for the spawned worker. Dropping it does NOT stop the worker;
/// call `shutdown` for a graceful stop between batches.
pub struct WorkerHandle {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl WorkerHandle {
    /// Signal the worker to stop after the batch currently in flight.
    /// Topics from a finished batch are always applied whole; a batch is
    /// never half-applied.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Wait for the worker to exit.
    pub async fn join(self) {
        if let Err(e) = self.handle.await {
            warn!(error = %e, "Background batch worker task panicked");
        }
    }
}

/// Spawns a task that resolves `batches` sequentially against the
/// preprocessor and appends the resulting topics to the session.
///
/// The worker holds only a `Weak` reference to the tracker: if the
/// session ends and drops it, resolved topics are discarded and the
/// worker exits instead of keeping the session alive.
pub struct BackgroundBatchWorker;

impl BackgroundBatchWorker {
    pub fn spawn(
        batches: Vec<Vec<ScoredItem>>,
        preprocessor: Arc<BatchPreprocessor<dyn Reasoner>>,
        tracker: Weak<SessionTracker>,
    ) -> WorkerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            Self::run(batches, preprocessor, tracker, shutdown_rx).await;
        });
        WorkerHandle {
            shutdown: shutdown_tx,
            handle,
        }
    }

    async fn run(
        batches: Vec<Vec<ScoredItem>>,
        preprocessor: Arc<BatchPreprocessor<dyn Reasoner>>,
        tracker: Weak<SessionTracker>,
        shutdown: watch::Receiver<bool>,
    ) {
        let total = batches.len();
        info!(batches = total, "Background batch worker started");

        for (index, batch) in batches.into_iter().enumerate() {
            if *shutdown.borrow() {
                info!(resolved = index, total, "Worker shutting down between batches");
                return;
            }

            let topics = match preprocessor.resolve_batch(&batch).await {
                Ok(topics) => topics,
                Err(e) => {
                    warn!(error = %e, batch = index, "Batch resolution failed, using fallback topics");
                    fallback_topics(&batch)
                }
            };

            let Some(tracker) = tracker.upgrade() else {
                debug!(batch = index, "Session gone, discarding resolved batch and stopping");
                return;
            };
            tracker.add_topics(topics).await;
            debug!(batch = index + 1, total, "Batch applied to session");
        }
        info!(total, "Background batch worker finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::llm::{
        CompletionRequest, CompletionResponse, ToolCompletionRequest, ToolCompletionResponse,
    };
    use crate::pipeline::preprocess::PreprocessConfig;
    use crate::pipeline::types::Item;
    use crate::signals::CompositeScore;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use chrono::Utc;

    /// Always fails, so every batch takes the fallback path.
    struct DownReasoner;

    #[async_trait]
    impl Reasoner for DownReasoner {
        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            Err(LlmError::RequestFailed {
                reason: "down".into(),
            })
        }

        async fn complete_with_tools(
            &self,
            _request: ToolCompletionRequest,
        ) -> Result<ToolCompletionResponse, LlmError> {
            Err(LlmError::RequestFailed {
                reason: "down".into(),
            })
        }
    }

    fn scored(id: &str) -> ScoredItem {
        ScoredItem {
            item: Item {
                id: id.into(),
                subject: format!("subject {id}"),
                sender: "x@x.com".into(),
                snippet: String::new(),
                received_at: Utc::now(),
                thread_id: id.into(),
                is_vip: false,
                has_been_replied: false,
            },
            score: CompositeScore::zero(),
        }
    }

    fn preprocessor() -> Arc<BatchPreprocessor<dyn Reasoner>> {
        let reasoner: Arc<dyn Reasoner> = Arc::new(DownReasoner);
        Arc::new(BatchPreprocessor::new(
            reasoner,
            PreprocessConfig {
                batch_size: 25,
                vip_list: vec![],
                sender_preferences: vec![],
                knowledge_snippets: vec![],
            },
        ))
    }

    #[tokio::test]
    async fn resolved_batches_append_to_session() {
        let tracker = Arc::new(SessionTracker::new(
            "u1",
            Arc::new(MemoryStore::new()),
            vec![],
        ));
        let batches = vec![vec![scored("a")], vec![scored("b")]];

        let handle =
            BackgroundBatchWorker::spawn(batches, preprocessor(), Arc::downgrade(&tracker));
        handle.join().await;

        // Fallback produces one topic per batch.
        assert_eq!(tracker.progress().await.total, 2);
    }

    #[tokio::test]
    async fn dropped_session_stops_the_worker() {
        let tracker = Arc::new(SessionTracker::new(
            "u1",
            Arc::new(MemoryStore::new()),
            vec![],
        ));
        let weak = Arc::downgrade(&tracker);
        drop(tracker);

        let handle = BackgroundBatchWorker::spawn(vec![vec![scored("a")]], preprocessor(), weak);
        // Must exit cleanly without a live session to append to.
        handle.join().await;
    }

    #[tokio::test]
    async fn shutdown_before_start_resolves_nothing() {
        let tracker = Arc::new(SessionTracker::new(
            "u1",
            Arc::new(MemoryStore::new()),
            vec![],
        ));
        let (tx, rx) = watch::channel(true);
        let _ = tx;
        BackgroundBatchWorker::run(
            vec![vec![scored("a")]],
            preprocessor(),
            Arc::downgrade(&tracker),
            rx,
        )
        .await;
        assert_eq!(tracker.progress().await.total, 0);
    }
}
