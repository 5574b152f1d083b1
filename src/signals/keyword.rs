//! Keyword matcher — static pattern table over item fields.

use regex::{Regex, RegexBuilder};

use crate::error::ConfigError;
use crate::pipeline::types::Item;
use crate::signals::SignalResult;

/// Which item fields a pattern is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchField {
    Subject,
    Snippet,
    Sender,
}

impl MatchField {
    fn extract<'a>(&self, item: &'a Item) -> &'a str {
        match self {
            Self::Subject => &item.subject,
            Self::Snippet => &item.snippet,
            Self::Sender => &item.sender,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Subject => "subject",
            Self::Snippet => "snippet",
            Self::Sender => "sender",
        }
    }
}

/// How matched pattern weights are combined into one raw score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CombineMode {
    /// Raw score = max matched weight.
    #[default]
    Max,
    /// Raw score = sum of matched weights, capped at 1.0.
    Sum,
}

/// One entry in the pattern table.
#[derive(Debug, Clone)]
pub struct KeywordPattern {
    /// Literal keyword or regex source.
    pub pattern: String,
    pub is_regex: bool,
    /// Matching is case-insensitive unless set.
    pub case_sensitive: bool,
    pub weight: f32,
    /// Category carried into the reason text (e.g. "urgency", "finance").
    pub category: String,
    pub fields: Vec<MatchField>,
}

impl KeywordPattern {
    pub fn keyword(pattern: &str, weight: f32, category: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            is_regex: false,
            case_sensitive: false,
            weight,
            category: category.to_string(),
            fields: vec![MatchField::Subject, MatchField::Snippet],
        }
    }

    pub fn regex(pattern: &str, weight: f32, category: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            is_regex: true,
            case_sensitive: false,
            weight,
            category: category.to_string(),
            fields: vec![MatchField::Subject, MatchField::Snippet],
        }
    }

    pub fn on_fields(mut self, fields: Vec<MatchField>) -> Self {
        self.fields = fields;
        self
    }
}

/// Default pattern table — urgency, deadlines, money, and security noise.
pub fn default_patterns() -> Vec<KeywordPattern> {
    vec![
        KeywordPattern::keyword("urgent", 0.9, "urgency"),
        KeywordPattern::keyword("asap", 0.9, "urgency"),
        KeywordPattern::keyword("action required", 0.8, "urgency"),
        KeywordPattern::keyword("deadline", 0.7, "deadline"),
        KeywordPattern::regex(r"due\s+(today|tomorrow)", 0.8, "deadline"),
        KeywordPattern::keyword("invoice", 0.6, "finance"),
        KeywordPattern::keyword("payment", 0.6, "finance"),
        KeywordPattern::keyword("contract", 0.5, "legal"),
        KeywordPattern::keyword("security alert", 0.9, "security"),
        KeywordPattern::regex(r"password\s+(reset|expir)", 0.7, "security"),
        KeywordPattern::keyword("interview", 0.6, "scheduling"),
        KeywordPattern::keyword("reschedule", 0.5, "scheduling"),
    ]
}

struct CompiledPattern {
    regex: Regex,
    source: KeywordPattern,
}

/// Matches a pattern table against configured item fields.
pub struct KeywordMatcher {
    patterns: Vec<CompiledPattern>,
    combine: CombineMode,
}

impl KeywordMatcher {
    pub fn new(patterns: Vec<KeywordPattern>, combine: CombineMode) -> Result<Self, ConfigError> {
        let mut compiled = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            let source = if pattern.is_regex {
                pattern.pattern.clone()
            } else {
                regex::escape(&pattern.pattern)
            };
            let regex = RegexBuilder::new(&source)
                .case_insensitive(!pattern.case_sensitive)
                .build()
                .map_err(|e| ConfigError::InvalidPattern {
                    pattern: pattern.pattern.clone(),
                    message: e.to_string(),
                })?;
            compiled.push(CompiledPattern {
                regex,
                source: pattern,
            });
        }
        Ok(Self {
            patterns: compiled,
            combine,
        })
    }

    /// Matcher over the default pattern table.
    pub fn with_defaults() -> Self {
        Self::new(default_patterns(), CombineMode::Max)
            .expect("default keyword patterns compile")
    }

    /// Match the pattern table against one item.
    pub fn detect(&self, item: &Item) -> SignalResult {
        let mut matched_weights = Vec::new();
        let mut reasons = Vec::new();

        for compiled in &self.patterns {
            for field in &compiled.source.fields {
                if compiled.regex.is_match(field.extract(item)) {
                    matched_weights.push(compiled.source.weight);
                    reasons.push(format!(
                        "{}: matched \"{}\" in {}",
                        compiled.source.category,
                        compiled.source.pattern,
                        field.name()
                    ));
                    break; // one reason per pattern, not per field
                }
            }
        }

        let raw_score = match self.combine {
            CombineMode::Max => matched_weights.iter().cloned().fold(0.0_f32, f32::max),
            CombineMode::Sum => matched_weights.iter().sum::<f32>().min(1.0),
        };

        SignalResult::new(raw_score, reasons)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn item(subject: &str, snippet: &str, sender: &str) -> Item {
        Item {
            id: "i1".into(),
            subject: subject.into(),
            sender: sender.into(),
            snippet: snippet.into(),
            received_at: Utc::now(),
            thread_id: "t1".into(),
            is_vip: false,
            has_been_replied: false,
        }
    }

    #[test]
    fn case_insensitive_by_default() {
        let matcher = KeywordMatcher::with_defaults();
        let result = matcher.detect(&item("URGENT: server down", "", "ops@x.com"));
        assert!((result.raw_score - 0.9).abs() < 1e-6);
        assert!(result.reasons[0].contains("urgency"));
        assert!(result.reasons[0].contains("subject"));
    }

    #[test]
    fn no_match_scores_zero() {
        let matcher = KeywordMatcher::with_defaults();
        let result = matcher.detect(&item("lunch plans", "pizza on friday?", "bob@x.com"));
        assert_eq!(result.raw_score, 0.0);
        assert!(result.reasons.is_empty());
    }

    #[test]
    fn max_combine_takes_highest_weight() {
        let matcher = KeywordMatcher::with_defaults();
        // "deadline" (0.7) and "urgent" (0.9) both match.
        let result = matcher.detect(&item("urgent deadline", "", "x@x.com"));
        assert!((result.raw_score - 0.9).abs() < 1e-6);
        assert_eq!(result.reasons.len(), 2);
    }

    #[test]
    fn sum_combine_caps_at_one() {
        let patterns = vec![
            KeywordPattern::keyword("alpha", 0.7, "a"),
            KeywordPattern::keyword("beta", 0.7, "b"),
        ];
        let matcher = KeywordMatcher::new(patterns, CombineMode::Sum).unwrap();
        let result = matcher.detect(&item("alpha beta", "", "x@x.com"));
        assert!((result.raw_score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn regex_pattern_matches() {
        let matcher = KeywordMatcher::with_defaults();
        let result = matcher.detect(&item("report due tomorrow", "", "x@x.com"));
        assert!((result.raw_score - 0.8).abs() < 1e-6);
        assert!(result.reasons[0].contains("deadline"));
    }

    #[test]
    fn case_sensitive_flag_respected() {
        let mut pattern = KeywordPattern::keyword("URGENT", 0.9, "urgency");
        pattern.case_sensitive = true;
        let matcher = KeywordMatcher::new(vec![pattern], CombineMode::Max).unwrap();
        assert_eq!(matcher.detect(&item("urgent", "", "x@x.com")).raw_score, 0.0);
        assert!(matcher.detect(&item("URGENT", "", "x@x.com")).raw_score > 0.0);
    }

    #[test]
    fn sender_field_matching() {
        let pattern =
            KeywordPattern::keyword("noreply", 0.4, "automated").on_fields(vec![MatchField::Sender]);
        let matcher = KeywordMatcher::new(vec![pattern], CombineMode::Max).unwrap();
        let result = matcher.detect(&item("hi", "", "noreply@news.com"));
        assert!(result.raw_score > 0.0);
        assert!(result.reasons[0].contains("sender"));
    }

    #[test]
    fn invalid_regex_is_a_config_error() {
        let pattern = KeywordPattern::regex("([unclosed", 0.5, "broken");
        assert!(KeywordMatcher::new(vec![pattern], CombineMode::Max).is_err());
    }
}
