//! Session registry — at most one live briefing session per user.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::agent::ReasoningLoop;

#[derive(Default)]
pub struct SessionManager {
    sessions: RwLock<HashMap<String, Arc<ReasoningLoop>>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session for a user, replacing any existing one. The
    /// replaced session's state is flushed before it is dropped.
    pub async fn insert(&self, user_id: &str, session: Arc<ReasoningLoop>) {
        let previous = self
            .sessions
            .write()
            .await
            .insert(user_id.to_string(), session);
        if let Some(old) = previous {
            warn!(user_id, "Replacing live session");
            old.finish().await;
        }
        info!(user_id, "Session registered");
    }

    pub async fn get(&self, user_id: &str) -> Option<Arc<ReasoningLoop>> {
        self.sessions.read().await.get(user_id).cloned()
    }

    /// Remove a session, flushing its state to the store first.
    pub async fn remove(&self, user_id: &str) -> Option<Arc<ReasoningLoop>> {
        let session = self.sessions.write().await.remove(user_id);
        if let Some(session) = &session {
            session.finish().await;
            info!(user_id, "Session removed");
        }
        session
    }

    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{
        CompletionRequest, CompletionResponse, Reasoner, ToolCompletionRequest,
        ToolCompletionResponse,
    };
    use crate::error::LlmError;
    use crate::session::SessionTracker;
    use crate::store::MemoryStore;
    use crate::tools::ToolRegistry;
    use async_trait::async_trait;

    struct Silent;

    #[async_trait]
    impl Reasoner for Silent {
        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            Ok(CompletionResponse { content: "".into() })
        }
        async fn complete_with_tools(
            &self,
            _request: ToolCompletionRequest,
        ) -> Result<ToolCompletionResponse, LlmError> {
            Ok(ToolCompletionResponse {
                content: Some("".into()),
                tool_calls: vec![],
            })
        }
    }

    fn session(user: &str) -> Arc<ReasoningLoop> {
        let tracker = Arc::new(SessionTracker::new(
            user,
            Arc::new(MemoryStore::new()),
            vec![],
        ));
        Arc::new(ReasoningLoop::new(
            tracker,
            Arc::new(Silent),
            Arc::new(ToolRegistry::new(vec![])),
        ))
    }

    #[tokio::test]
    async fn insert_get_remove_round_trip() {
        let manager = SessionManager::new();
        manager.insert("u1", session("u1")).await;
        assert!(manager.get("u1").await.is_some());
        assert_eq!(manager.count().await, 1);

        manager.remove("u1").await;
        assert!(manager.get("u1").await.is_none());
    }

    #[tokio::test]
    async fn insert_replaces_existing_session() {
        let manager = SessionManager::new();
        manager.insert("u1", session("u1")).await;
        manager.insert("u1", session("u1")).await;
        assert_eq!(manager.count().await, 1);
    }
}
