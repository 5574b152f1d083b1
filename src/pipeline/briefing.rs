//! Briefing pipeline — fetch → filter → score → cluster into ordered topics.
//!
//! Every external boundary degrades instead of aborting: a fetch failure
//! yields a smaller briefing, a store failure skips the handled-items
//! filter, an LLM failure falls back to heuristic clustering.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::config::BriefingConfig;
use crate::llm::Reasoner;
use crate::pipeline::cluster::HeuristicClusterer;
use crate::pipeline::preprocess::{BatchPreprocessor, PreprocessConfig};
use crate::pipeline::types::{
    Briefing, FetchFilter, Item, ItemSource, Paging, ScoredItem,
};
use crate::signals::{
    CalendarEvent, CalendarProximityDetector, KeywordMatcher, SenderProfile, SignalInputs,
    SignalResult, SignalScorer, ThreadStats, ThreadVelocityDetector, VipDetector,
};
use crate::store::LifecycleStore;

/// Per-briefing inputs supplied by the host.
#[derive(Debug, Clone, Default)]
pub struct BriefingRequest {
    pub user_id: String,
    /// Only consider items received after this instant.
    pub after: Option<DateTime<Utc>>,
    /// Sender interaction profiles, keyed by lowercase email.
    pub sender_profiles: HashMap<String, SenderProfile>,
    /// Upcoming calendar events for proximity scoring.
    pub calendar_events: Vec<CalendarEvent>,
}

/// Assembles a prioritized briefing from raw inbox items.
pub struct BriefingPipeline {
    source: Arc<dyn ItemSource>,
    store: Arc<dyn LifecycleStore>,
    preprocessor: Option<Arc<BatchPreprocessor<dyn Reasoner>>>,
    clusterer: HeuristicClusterer,
    scorer: SignalScorer,
    keywords: KeywordMatcher,
    vip: VipDetector,
    velocity: ThreadVelocityDetector,
    calendar: CalendarProximityDetector,
    config: BriefingConfig,
}

impl BriefingPipeline {
    pub fn new(
        source: Arc<dyn ItemSource>,
        store: Arc<dyn LifecycleStore>,
        config: BriefingConfig,
    ) -> Self {
        Self {
            source,
            store,
            preprocessor: None,
            clusterer: HeuristicClusterer::new(config.similarity_threshold, config.max_topics),
            scorer: SignalScorer::new(config.scorer.clone()),
            keywords: KeywordMatcher::with_defaults(),
            vip: VipDetector::new(config.vip.clone()),
            velocity: ThreadVelocityDetector::new(),
            calendar: CalendarProximityDetector::new(),
            config,
        }
    }

    /// Wire in the external reasoner. The LLM-batched path is used only when
    /// a reasoner is present and an API key is configured.
    pub fn with_reasoner(mut self, reasoner: Arc<dyn Reasoner>) -> Self {
        let preprocess_config = PreprocessConfig::from_briefing(&self.config);
        self.preprocessor = Some(Arc::new(BatchPreprocessor::new(reasoner, preprocess_config)));
        self
    }

    pub fn with_keywords(mut self, keywords: KeywordMatcher) -> Self {
        self.keywords = keywords;
        self
    }

    /// The preprocessor, for handing to the background batch worker.
    pub fn preprocessor(&self) -> Option<Arc<BatchPreprocessor<dyn Reasoner>>> {
        self.preprocessor.clone()
    }

    /// Build a briefing for one session.
    pub async fn build(&self, request: &BriefingRequest) -> Briefing {
        let items = self.fetch_all(request).await;
        let filtered = self.filter_items(&request.user_id, items).await;
        let scored = self.score_items(&filtered, request);
        let total = scored.len();

        if let Some(preprocessor) = &self.preprocessor
            && self.config.llm_enabled()
        {
            match preprocessor.run(scored.clone()).await {
                Ok(outcome) => {
                    info!(
                        topics = outcome.topics.len(),
                        remaining_batches = outcome.remaining.len(),
                        total_fetched = outcome.total_fetched,
                        "Briefing assembled via LLM-batched path"
                    );
                    return Briefing {
                        topics: outcome.topics,
                        remaining: outcome.remaining,
                        total_fetched: outcome.total_fetched,
                    };
                }
                Err(e) => {
                    warn!(error = %e, "LLM preprocessing failed, falling back to heuristic clustering");
                }
            }
        }

        let topics = self.clusterer.cluster(&scored);
        info!(
            topics = topics.len(),
            total_fetched = total,
            "Briefing assembled via heuristic path"
        );
        Briefing {
            topics,
            remaining: Vec::new(),
            total_fetched: total,
        }
    }

    /// Paginate the source until `max_emails` or no more pages. A failed
    /// page fetch keeps whatever was collected so far.
    async fn fetch_all(&self, request: &BriefingRequest) -> Vec<Item> {
        let filter = FetchFilter {
            after: request.after,
        };
        let mut paging = Paging {
            page_size: self.config.page_size,
            page_token: None,
        };
        let mut items = Vec::new();

        loop {
            let page = match self.source.fetch_unread(&filter, &paging).await {
                Ok(page) => page,
                Err(e) => {
                    warn!(error = %e, fetched = items.len(), "Item fetch failed, continuing with partial briefing");
                    break;
                }
            };
            items.extend(page.items);
            if items.len() >= self.config.max_emails {
                items.truncate(self.config.max_emails);
                break;
            }
            match page.next_page_token {
                Some(token) => paging.page_token = Some(token),
                None => break,
            }
        }
        items
    }

    /// Drop previously-handled and muted items.
    async fn filter_items(&self, user_id: &str, items: Vec<Item>) -> Vec<Item> {
        let handled = match self.store.briefed_ids(user_id).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, "Could not load handled item IDs, skipping exclusion filter");
                Default::default()
            }
        };
        let muted: Vec<String> = self
            .config
            .muted_senders
            .iter()
            .map(|s| s.to_lowercase())
            .collect();

        items
            .into_iter()
            .filter(|item| !handled.contains(&item.id))
            .filter(|item| !muted.contains(&item.sender.to_lowercase()))
            .collect()
    }

    /// Run all four detectors over each item. A detector with nothing to say
    /// counts as an absent signal, so it never drags the composite down.
    fn score_items(&self, items: &[Item], request: &BriefingRequest) -> Vec<ScoredItem> {
        let now = Utc::now();
        let mut thread_counts: HashMap<&str, u32> = HashMap::new();
        for item in items {
            *thread_counts.entry(item.thread_id.as_str()).or_default() += 1;
        }

        items
            .iter()
            .map(|item| {
                let mut item = item.clone();

                let keyword = present(self.keywords.detect(&item));

                let vip = request
                    .sender_profiles
                    .get(&item.sender.to_lowercase())
                    .map(|profile| {
                        let assessment = self.vip.assess(profile, now);
                        item.is_vip = item.is_vip || assessment.is_vip;
                        assessment.result
                    })
                    .and_then(present);

                let stats = ThreadStats {
                    messages_in_window: thread_counts
                        .get(item.thread_id.as_str())
                        .copied()
                        .unwrap_or(0),
                    window_hours: 24,
                };
                let velocity = present(self.velocity.detect(&stats));

                let calendar = present(self.calendar.detect(
                    &item.sender,
                    &request.calendar_events,
                    now,
                ));

                let score = self.scorer.score(&SignalInputs {
                    keyword,
                    vip,
                    velocity,
                    calendar,
                });
                ScoredItem { item, score }
            })
            .collect()
    }
}

/// A detector result with nothing to report is treated as an absent signal.
fn present(result: SignalResult) -> Option<SignalResult> {
    if result.raw_score > 0.0 || !result.reasons.is_empty() {
        Some(result)
    } else {
        None
    }
}
