//! Configuration types.

use secrecy::SecretString;

/// Top-level briefing configuration.
#[derive(Debug, Clone)]
pub struct BriefingConfig {
    /// Maximum items fetched per briefing.
    pub max_emails: usize,
    /// Page size for the item source.
    pub page_size: usize,
    /// Items per preprocessing batch.
    pub batch_size: usize,
    /// Maximum topics in the assembled briefing.
    pub max_topics: usize,
    /// Similarity threshold for heuristic clustering.
    pub similarity_threshold: f32,
    /// Senders whose items are excluded from the briefing entirely.
    pub muted_senders: Vec<String>,
    /// Learned sender preference snippets, embedded in the clustering prompt.
    pub sender_preferences: Vec<String>,
    /// Domain knowledge snippets, embedded in the clustering prompt.
    pub knowledge_snippets: Vec<String>,
    /// API key for the external reasoning service. When absent, the
    /// pipeline uses the heuristic clustering path only.
    pub reasoner_api_key: Option<SecretString>,
    /// Composite scorer weights and thresholds.
    pub scorer: ScorerConfig,
    /// VIP detection thresholds.
    pub vip: VipConfig,
}

impl BriefingConfig {
    /// Whether the LLM-batched preprocessing path is available.
    pub fn llm_enabled(&self) -> bool {
        self.reasoner_api_key.is_some()
    }
}

impl Default for BriefingConfig {
    fn default() -> Self {
        Self {
            max_emails: 100,
            page_size: 50,
            batch_size: 25,
            max_topics: 8,
            similarity_threshold: 0.35,
            muted_senders: Vec::new(),
            sender_preferences: Vec::new(),
            knowledge_snippets: Vec::new(),
            reasoner_api_key: None,
            scorer: ScorerConfig::default(),
            vip: VipConfig::default(),
        }
    }
}

/// Weights and thresholds for the composite signal scorer.
#[derive(Debug, Clone)]
pub struct ScorerConfig {
    pub keyword_weight: f32,
    pub vip_weight: f32,
    pub velocity_weight: f32,
    pub calendar_weight: f32,
    /// Composite score at or above this is flagged.
    pub flag_threshold: f32,
    pub critical_threshold: f32,
    pub high_threshold: f32,
    pub medium_threshold: f32,
    pub low_threshold: f32,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            keyword_weight: 0.8,
            vip_weight: 0.7,
            velocity_weight: 0.9,
            calendar_weight: 0.6,
            flag_threshold: 0.3,
            critical_threshold: 0.9,
            high_threshold: 0.7,
            medium_threshold: 0.5,
            low_threshold: 0.3,
        }
    }
}

/// Thresholds and boosts for VIP detection.
#[derive(Debug, Clone)]
pub struct VipConfig {
    /// Explicit VIP email addresses.
    pub vip_list: Vec<String>,
    /// Interaction count for the high tier.
    pub high_interaction_threshold: u32,
    /// Interaction count for the medium tier.
    pub medium_interaction_threshold: u32,
    /// Weight for explicit list membership.
    pub explicit_weight: f32,
    /// Weight for the high interaction tier.
    pub high_tier_weight: f32,
    /// Weight for the medium interaction tier.
    pub medium_tier_weight: f32,
    /// Days since last interaction that still count as recent.
    pub recency_days: i64,
    /// Additive boost for a recent interaction.
    pub recency_boost: f32,
    /// Additive boost for an executive job title.
    pub title_boost: f32,
    /// Job title keywords that trigger the title boost.
    pub executive_titles: Vec<String>,
}

impl Default for VipConfig {
    fn default() -> Self {
        Self {
            vip_list: Vec::new(),
            high_interaction_threshold: 50,
            medium_interaction_threshold: 20,
            explicit_weight: 0.8,
            high_tier_weight: 0.6,
            medium_tier_weight: 0.4,
            recency_days: 7,
            recency_boost: 0.2,
            title_boost: 0.3,
            executive_titles: vec![
                "ceo".into(),
                "cto".into(),
                "cfo".into(),
                "coo".into(),
                "founder".into(),
                "president".into(),
                "vp".into(),
                "director".into(),
            ],
        }
    }
}
