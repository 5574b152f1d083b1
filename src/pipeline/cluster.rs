//! Heuristic clustering — groups scored items into labeled topics without
//! the LLM. Used as the primary strategy when no reasoner is configured and
//! as the fallback when the LLM path fails.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::pipeline::types::{Item, Priority, ScoredItem, Topic, TopicItem};
use crate::signals::Severity;

/// Pluggable pairwise similarity in [0, 1].
pub type SimilarityFn = Arc<dyn Fn(&Item, &Item) -> f32 + Send + Sync>;

/// Token-overlap similarity over normalized subjects; same-thread items are
/// always similar.
pub fn default_similarity() -> SimilarityFn {
    Arc::new(|a: &Item, b: &Item| {
        if a.thread_id == b.thread_id {
            return 1.0;
        }
        let ta = subject_tokens(&a.subject);
        let tb = subject_tokens(&b.subject);
        if ta.is_empty() || tb.is_empty() {
            return 0.0;
        }
        let intersection = ta.intersection(&tb).count() as f32;
        let union = ta.union(&tb).count() as f32;
        intersection / union
    })
}

fn subject_tokens(subject: &str) -> HashSet<String> {
    subject
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 2 && !matches!(*t, "re" | "fwd" | "fw" | "the" | "and" | "for"))
        .map(String::from)
        .collect()
}

/// Greedy threshold clustering with an unclustered catch-all topic.
pub struct HeuristicClusterer {
    similarity: SimilarityFn,
    threshold: f32,
    max_topics: usize,
}

impl HeuristicClusterer {
    pub fn new(threshold: f32, max_topics: usize) -> Self {
        Self {
            similarity: default_similarity(),
            threshold,
            max_topics,
        }
    }

    pub fn with_similarity(mut self, similarity: SimilarityFn) -> Self {
        self.similarity = similarity;
        self
    }

    /// Cluster scored items into ordered topics.
    pub fn cluster(&self, items: &[ScoredItem]) -> Vec<Topic> {
        if items.is_empty() {
            return Vec::new();
        }

        // Greedy pass: each item joins the first cluster whose seed it
        // resembles, otherwise becomes a new seed.
        let mut clusters: Vec<Vec<&ScoredItem>> = Vec::new();
        for scored in items {
            let joined = clusters.iter_mut().find(|cluster| {
                (self.similarity)(&cluster[0].item, &scored.item) >= self.threshold
            });
            match joined {
                Some(cluster) => cluster.push(scored),
                None => clusters.push(vec![scored]),
            }
        }

        // Singletons are pooled into the catch-all.
        let (real, singletons): (Vec<_>, Vec<_>) =
            clusters.into_iter().partition(|c| c.len() > 1);

        let mut topics: Vec<Topic> = real.into_iter().map(|c| self.build_topic(&c)).collect();
        if !singletons.is_empty() {
            let pooled: Vec<&ScoredItem> = singletons.into_iter().flatten().collect();
            let mut topic = self.build_topic(&pooled);
            topic.label = "Everything else".to_string();
            topics.push(topic);
        }

        // Sort by (flagged count desc, max score desc, size desc).
        topics.sort_by(|a, b| {
            let flagged = |t: &Topic| t.items.iter().filter(|i| i.is_flagged).count();
            let max_score = |t: &Topic| {
                t.items
                    .iter()
                    .map(|i| i.score)
                    .fold(0.0_f32, f32::max)
            };
            flagged(b)
                .cmp(&flagged(a))
                .then(
                    max_score(b)
                        .partial_cmp(&max_score(a))
                        .unwrap_or(std::cmp::Ordering::Equal),
                )
                .then(b.items.len().cmp(&a.items.len()))
        });

        if topics.len() > self.max_topics {
            debug!(
                dropped = topics.len() - self.max_topics,
                "Truncating topics to max_topics"
            );
            topics.truncate(self.max_topics);
        }
        topics
    }

    fn build_topic(&self, cluster: &[&ScoredItem]) -> Topic {
        let max_severity = cluster
            .iter()
            .map(|s| s.score.severity)
            .max()
            .unwrap_or(Severity::None);
        let priority = match max_severity {
            Severity::Critical | Severity::High => Priority::High,
            Severity::Medium => Priority::Medium,
            _ => Priority::Low,
        };
        let label = cluster
            .first()
            .map(|s| clean_label(&s.item.subject))
            .unwrap_or_else(|| "Inbox".to_string());
        let items = cluster.iter().map(|s| TopicItem::from_scored(s)).collect();
        Topic::new(label, priority, items)
    }
}

/// Strip reply/forward prefixes for a speakable topic label.
fn clean_label(subject: &str) -> String {
    let mut label = subject.trim();
    loop {
        // Byte-indexed, case-insensitive on the original string; the rest
        // of the subject may be arbitrary Unicode.
        let stripped = ["re:", "fwd:", "fw:"].iter().find_map(|prefix| {
            label
                .get(..prefix.len())
                .filter(|head| head.eq_ignore_ascii_case(prefix))
                .map(|_| &label[prefix.len()..])
        });
        match stripped {
            Some(rest) => label = rest.trim_start(),
            None => break,
        }
    }
    if label.is_empty() {
        "Inbox".to_string()
    } else {
        label.to_string()
    }
}
