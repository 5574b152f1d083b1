//! Batched LLM preprocessing — presort, split, resolve batch 1 synchronously,
//! hand the rest to the background worker.
//!
//! Failure policy: a malformed LLM response degrades to a deterministic
//! single-cluster grouping and never reaches the caller; a failed LLM call
//! surfaces as an error so the pipeline can fall back to the heuristic path
//! for the whole fetch.

use std::cmp::Reverse;
use std::collections::HashMap;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::BriefingConfig;
use crate::error::LlmError;
use crate::llm::{ChatMessage, CompletionRequest, Reasoner};
use crate::pipeline::types::{PreprocessOutcome, Priority, ScoredItem, Topic, TopicItem};

/// Max tokens for a batch clustering call.
const CLUSTER_MAX_TOKENS: u32 = 2048;

/// Temperature for clustering (deterministic-ish).
const CLUSTER_TEMPERATURE: f32 = 0.1;

/// Prompt inputs beyond the items themselves.
#[derive(Debug, Clone, Default)]
pub struct PreprocessConfig {
    pub batch_size: usize,
    pub vip_list: Vec<String>,
    pub sender_preferences: Vec<String>,
    pub knowledge_snippets: Vec<String>,
}

impl PreprocessConfig {
    pub fn from_briefing(config: &BriefingConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            vip_list: config.vip.vip_list.clone(),
            sender_preferences: config.sender_preferences.clone(),
            knowledge_snippets: config.knowledge_snippets.clone(),
        }
    }
}

/// Presorts, batches, and resolves batches through the external reasoner.
pub struct BatchPreprocessor<R: Reasoner + ?Sized> {
    reasoner: std::sync::Arc<R>,
    config: PreprocessConfig,
}

impl<R: Reasoner + ?Sized> BatchPreprocessor<R> {
    pub fn new(reasoner: std::sync::Arc<R>, config: PreprocessConfig) -> Self {
        Self { reasoner, config }
    }

    /// Run the batched path: batch 1 resolved synchronously, the rest
    /// returned unresolved for async consumption.
    pub async fn run(&self, items: Vec<ScoredItem>) -> Result<PreprocessOutcome, LlmError> {
        let total_fetched = items.len();
        let mut batches = self.split_batches(self.presort(items));
        if batches.is_empty() {
            return Ok(PreprocessOutcome {
                topics: Vec::new(),
                remaining: Vec::new(),
                total_fetched,
            });
        }

        let first = batches.remove(0);
        let topics = self.resolve_batch(&first).await?;
        debug!(
            topics = topics.len(),
            remaining_batches = batches.len(),
            total_fetched,
            "Resolved first preprocessing batch"
        );

        Ok(PreprocessOutcome {
            topics,
            remaining: batches,
            total_fetched,
        })
    }

    /// Stable presort: VIPs first, then threads the user already replied to,
    /// then newest first.
    pub fn presort(&self, mut items: Vec<ScoredItem>) -> Vec<ScoredItem> {
        items.sort_by_key(|s| {
            (
                !s.item.is_vip,
                !s.item.has_been_replied,
                Reverse(s.item.received_at),
            )
        });
        items
    }

    /// Split into fixed-size batches, preserving presort order.
    pub fn split_batches(&self, items: Vec<ScoredItem>) -> Vec<Vec<ScoredItem>> {
        let size = self.config.batch_size.max(1);
        let mut batches = Vec::new();
        let mut current = Vec::with_capacity(size);
        for item in items {
            current.push(item);
            if current.len() == size {
                batches.push(std::mem::take(&mut current));
            }
        }
        if !current.is_empty() {
            batches.push(current);
        }
        batches
    }

    /// Resolve one batch through the reasoner. Transport errors propagate;
    /// parse failures degrade to the deterministic fallback grouping.
    pub async fn resolve_batch(&self, batch: &[ScoredItem]) -> Result<Vec<Topic>, LlmError> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let request = CompletionRequest::new(vec![
            ChatMessage::system(build_cluster_system_prompt()),
            ChatMessage::user(self.build_cluster_user_prompt(batch)),
        ])
        .with_temperature(CLUSTER_TEMPERATURE)
        .with_max_tokens(CLUSTER_MAX_TOKENS);

        let response = self.reasoner.complete(request).await?;

        match parse_cluster_response(&response.content, batch) {
            Ok(topics) => Ok(topics),
            Err(e) => {
                warn!(
                    error = %e,
                    raw_response_len = response.content.len(),
                    "Failed to parse clustering response, using fallback grouping"
                );
                Ok(fallback_topics(batch))
            }
        }
    }

    fn build_cluster_user_prompt(&self, batch: &[ScoredItem]) -> String {
        let mut prompt = String::with_capacity(1024);

        if !self.config.vip_list.is_empty() {
            prompt.push_str(&format!("VIP senders: {}\n", self.config.vip_list.join(", ")));
        }
        if !self.config.sender_preferences.is_empty() {
            prompt.push_str("Sender preferences:\n");
            for pref in &self.config.sender_preferences {
                prompt.push_str(&format!("- {pref}\n"));
            }
        }
        if !self.config.knowledge_snippets.is_empty() {
            prompt.push_str("Context:\n");
            for snippet in &self.config.knowledge_snippets {
                prompt.push_str(&format!("- {snippet}\n"));
            }
        }

        prompt.push_str("\nMessages:\n");
        for scored in batch {
            let snippet_preview: String = scored.item.snippet.chars().take(200).collect();
            prompt.push_str(&format!(
                "[{}] from: {} | subject: {} | {}\n",
                scored.item.id, scored.item.sender, scored.item.subject, snippet_preview
            ));
        }
        prompt
    }
}

// ── Prompt + response parsing ───────────────────────────────────────

fn build_cluster_system_prompt() -> String {
    "You are an inbox triage engine. Group the listed messages into topics for a spoken briefing.\n\n\
     Respond with ONLY a JSON object:\n\
     {\"topics\": [{\"label\": \"...\", \"priority\": \"high|medium|low\", \"items\": [{\"id\": \"...\", \"summary\": \"...\"}]}]}\n\n\
     Rules:\n\
     - Every message ID must appear in exactly one topic\n\
     - Labels are short spoken phrases (max 6 words)\n\
     - Summaries are one sentence, natural when read aloud\n\
     - Order topics most important first"
        .to_string()
}

#[derive(Debug, Deserialize)]
struct ClusterResponse {
    topics: Vec<ClusterTopic>,
}

#[derive(Debug, Deserialize)]
struct ClusterTopic {
    label: String,
    #[serde(default)]
    priority: String,
    items: Vec<ClusterEntry>,
}

#[derive(Debug, Deserialize)]
struct ClusterEntry {
    id: String,
    #[serde(default)]
    summary: String,
}

/// Parse the clustering response, keeping the one-topic-per-item invariant:
/// unknown IDs are dropped, unmentioned items are appended to a catch-all.
fn parse_cluster_response(raw: &str, batch: &[ScoredItem]) -> Result<Vec<Topic>, String> {
    let json_str = extract_json_object(raw);
    let response: ClusterResponse =
        serde_json::from_str(&json_str).map_err(|e| format!("JSON parse error: {e}"))?;
    if response.topics.is_empty() {
        return Err("response contained no topics".into());
    }

    let by_id: HashMap<&str, &ScoredItem> =
        batch.iter().map(|s| (s.item.id.as_str(), s)).collect();
    let mut seen: HashMap<&str, bool> = batch.iter().map(|s| (s.item.id.as_str(), false)).collect();

    let mut topics = Vec::new();
    for cluster in response.topics {
        let mut items = Vec::new();
        for entry in cluster.items {
            let Some(scored) = by_id.get(entry.id.as_str()) else {
                warn!(id = %entry.id, "Clustering response referenced unknown item, dropping");
                continue;
            };
            if seen.insert(scored.item.id.as_str(), true) == Some(true) {
                continue; // already placed in an earlier topic
            }
            let summary = if entry.summary.is_empty() {
                format!("{} from {}", scored.item.subject, scored.item.sender)
            } else {
                entry.summary
            };
            items.push(TopicItem::from_scored_with_summary(scored, summary));
        }
        if !items.is_empty() {
            topics.push(Topic::new(cluster.label, parse_priority(&cluster.priority), items));
        }
    }

    let leftover: Vec<&ScoredItem> = batch
        .iter()
        .filter(|s| !seen.get(s.item.id.as_str()).copied().unwrap_or(false))
        .collect();
    if !leftover.is_empty() {
        debug!(count = leftover.len(), "Appending items the reasoner left unclustered");
        topics.push(Topic::new(
            "Also in your inbox",
            Priority::Low,
            leftover.iter().map(|s| TopicItem::from_scored(s)).collect(),
        ));
    }

    Ok(topics)
}

fn parse_priority(raw: &str) -> Priority {
    match raw {
        "high" => Priority::High,
        "low" => Priority::Low,
        _ => Priority::Medium,
    }
}

/// Deterministic single-cluster grouping used when parsing fails: priority
/// from VIP presence, `"{subject} from {sender}"` summaries.
pub fn fallback_topics(batch: &[ScoredItem]) -> Vec<Topic> {
    if batch.is_empty() {
        return Vec::new();
    }
    let priority = if batch.iter().any(|s| s.item.is_vip) {
        Priority::High
    } else {
        Priority::Medium
    };
    vec![Topic::new(
        "Latest messages",
        priority,
        batch.iter().map(TopicItem::from_scored).collect(),
    )]
}

/// Extract a JSON object from reasoner output (handles markdown wrapping).
pub(crate) fn extract_json_object(text: &str) -> String {
    let trimmed = text.trim();

    if trimmed.starts_with('{') {
        return trimmed.to_string();
    }

    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            return after[..end].trim().to_string();
        }
    }

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        if let Some(end) = after.find("```") {
            let inner = after[..end].trim();
            if inner.starts_with('{') {
                return inner.to_string();
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}'))
        && end > start
    {
        return trimmed[start..=end].to_string();
    }

    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::llm::{
        CompletionRequest, CompletionResponse, Reasoner, ToolCompletionRequest,
        ToolCompletionResponse,
    };
    use crate::pipeline::types::Item;
    use crate::signals::CompositeScore;
    use chrono::{Duration, Utc};
    use std::sync::Arc;

    struct MockReasoner {
        response: Result<String, String>,
    }

    #[async_trait::async_trait]
    impl Reasoner for MockReasoner {
        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            match &self.response {
                Ok(content) => Ok(CompletionResponse {
                    content: content.clone(),
                }),
                Err(reason) => Err(LlmError::RequestFailed {
                    reason: reason.clone(),
                }),
            }
        }

        async fn complete_with_tools(
            &self,
            _request: ToolCompletionRequest,
        ) -> Result<ToolCompletionResponse, LlmError> {
            unimplemented!("clustering only uses plain completion")
        }
    }

    fn scored(id: &str, vip: bool, replied: bool, age_minutes: i64) -> ScoredItem {
        ScoredItem {
            item: Item {
                id: id.into(),
                subject: format!("subject {id}"),
                sender: "sender@x.com".into(),
                snippet: "snippet".into(),
                received_at: Utc::now() - Duration::minutes(age_minutes),
                thread_id: format!("t-{id}"),
                is_vip: vip,
                has_been_replied: replied,
            },
            score: CompositeScore::zero(),
        }
    }

    fn preprocessor(response: Result<String, String>) -> BatchPreprocessor<MockReasoner> {
        BatchPreprocessor::new(
            Arc::new(MockReasoner { response }),
            PreprocessConfig {
                batch_size: 25,
                ..Default::default()
            },
        )
    }

    #[test]
    fn presort_orders_vip_then_replied_then_newest() {
        let p = preprocessor(Ok(String::new()));
        let sorted = p.presort(vec![
            scored("old", false, false, 120),
            scored("new", false, false, 5),
            scored("replied", false, true, 300),
            scored("vip", true, false, 600),
        ]);
        let ids: Vec<&str> = sorted.iter().map(|s| s.item.id.as_str()).collect();
        assert_eq!(ids, vec!["vip", "replied", "new", "old"]);
    }

    #[test]
    fn thirty_items_batch_size_25_splits_into_25_and_5() {
        let p = preprocessor(Ok(String::new()));
        let items: Vec<ScoredItem> = (0..30)
            .map(|i| scored(&format!("i{i}"), false, false, i))
            .collect();
        let batches = p.split_batches(items);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].len(), 25);
        assert_eq!(batches[1].len(), 5);
    }

    #[tokio::test]
    async fn run_resolves_first_batch_and_returns_rest() {
        let response = r#"{"topics": [{"label": "All mail", "priority": "medium", "items": []}]}"#;
        let p = preprocessor(Ok(response.into()));
        let items: Vec<ScoredItem> = (0..30)
            .map(|i| scored(&format!("i{i}"), false, false, i))
            .collect();

        let outcome = p.run(items).await.unwrap();
        assert_eq!(outcome.total_fetched, 30);
        assert_eq!(outcome.remaining.len(), 1);
        assert_eq!(outcome.remaining[0].len(), 5);
        // Empty LLM topic list with 25 unmentioned items → catch-all topic.
        assert_eq!(outcome.topics.len(), 1);
        assert_eq!(outcome.topics[0].items.len(), 25);
    }

    #[tokio::test]
    async fn transport_failure_propagates() {
        let p = preprocessor(Err("connection refused".into()));
        let result = p.run(vec![scored("a", false, false, 1)]).await;
        assert!(matches!(result, Err(LlmError::RequestFailed { .. })));
    }

    #[tokio::test]
    async fn parse_failure_falls_back_without_error() {
        let p = preprocessor(Ok("I could not cluster these, sorry!".into()));
        let outcome = p
            .run(vec![scored("a", true, false, 1), scored("b", false, false, 2)])
            .await
            .unwrap();
        assert_eq!(outcome.topics.len(), 1);
        assert_eq!(outcome.topics[0].label, "Latest messages");
        assert_eq!(outcome.topics[0].priority, Priority::High); // VIP present
        assert_eq!(outcome.topics[0].items[0].summary, "subject a from sender@x.com");
    }

    #[test]
    fn parse_places_every_item_exactly_once() {
        let batch = vec![
            scored("a", false, false, 1),
            scored("b", false, false, 2),
            scored("c", false, false, 3),
        ];
        let raw = r#"{"topics": [
            {"label": "First", "priority": "high", "items": [{"id": "a", "summary": "s1"}, {"id": "ghost"}]},
            {"label": "Second", "priority": "low", "items": [{"id": "a"}, {"id": "b", "summary": "s2"}]}
        ]}"#;
        let topics = parse_cluster_response(raw, &batch).unwrap();

        // "a" stays in First despite the duplicate mention; "ghost" dropped;
        // "c" lands in the catch-all.
        assert_eq!(topics.len(), 3);
        assert_eq!(topics[0].items.len(), 1);
        assert_eq!(topics[0].items[0].item_id, "a");
        assert_eq!(topics[1].items[0].item_id, "b");
        assert_eq!(topics[2].label, "Also in your inbox");
        assert_eq!(topics[2].items[0].item_id, "c");

        let total: usize = topics.iter().map(|t| t.items.len()).sum();
        assert_eq!(total, batch.len());
    }

    #[test]
    fn parse_handles_markdown_wrapping() {
        let batch = vec![scored("a", false, false, 1)];
        let raw = "Here you go:\n```json\n{\"topics\": [{\"label\": \"X\", \"items\": [{\"id\": \"a\"}]}]}\n```";
        let topics = parse_cluster_response(raw, &batch).unwrap();
        assert_eq!(topics.len(), 1);
        assert_eq!(topics[0].priority, Priority::Medium); // default
    }

    #[test]
    fn extract_json_embedded_in_text() {
        let input = "My grouping: {\"topics\": []} done.";
        let result = extract_json_object(input);
        assert!(result.starts_with('{'));
        assert!(result.ends_with('}'));
    }
}
