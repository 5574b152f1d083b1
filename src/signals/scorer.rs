//! Composite signal scorer.
//!
//! Combines the four detector outputs into one importance score via a
//! weighted average over the signals that are actually present — an absent
//! signal contributes neither to the numerator nor the denominator, so it
//! never drags the composite down.

use serde::{Deserialize, Serialize};

use crate::config::ScorerConfig;
use crate::signals::{SignalKind, SignalResult};

/// Severity tier derived from the composite score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    None,
    Low,
    Medium,
    High,
    Critical,
}

/// Per-slot contribution report. Reported for every slot, present or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalBreakdown {
    pub signal: String,
    pub raw_score: f32,
    pub weight: f32,
    /// Share of the composite contributed by this slot.
    pub contribution: f32,
    pub is_present: bool,
}

/// Composite importance score. Derived, recomputed on demand, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeScore {
    pub score: f32,
    pub is_flagged: bool,
    pub severity: Severity,
    pub breakdown: Vec<SignalBreakdown>,
    /// All detector reasons, each tagged with its originating signal name.
    pub reasons: Vec<String>,
}

impl CompositeScore {
    /// Score for an item with no signals at all.
    pub fn zero() -> Self {
        SignalScorer::new(ScorerConfig::default()).score(&SignalInputs::default())
    }
}

/// Detector outputs for one item. Absent slots are `None`.
#[derive(Debug, Clone, Default)]
pub struct SignalInputs {
    pub keyword: Option<SignalResult>,
    pub vip: Option<SignalResult>,
    pub velocity: Option<SignalResult>,
    pub calendar: Option<SignalResult>,
}

/// Combines detector outputs into a composite score and severity tier.
#[derive(Debug, Clone)]
pub struct SignalScorer {
    config: ScorerConfig,
}

impl SignalScorer {
    pub fn new(config: ScorerConfig) -> Self {
        Self { config }
    }

    /// Score an item from whichever signals are present.
    pub fn score(&self, inputs: &SignalInputs) -> CompositeScore {
        let slots: [(SignalKind, f32, Option<&SignalResult>); 4] = [
            (SignalKind::Keyword, self.config.keyword_weight, inputs.keyword.as_ref()),
            (SignalKind::Vip, self.config.vip_weight, inputs.vip.as_ref()),
            (SignalKind::Velocity, self.config.velocity_weight, inputs.velocity.as_ref()),
            (SignalKind::Calendar, self.config.calendar_weight, inputs.calendar.as_ref()),
        ];

        let total_weight: f32 = slots
            .iter()
            .filter(|(_, _, result)| result.is_some())
            .map(|(_, weight, _)| weight)
            .sum();

        let mut breakdown = Vec::with_capacity(4);
        let mut reasons = Vec::new();
        let mut weighted_sum = 0.0_f32;

        for (kind, weight, result) in &slots {
            match result {
                Some(signal) => {
                    let contribution = if total_weight > 0.0 {
                        signal.raw_score * weight / total_weight
                    } else {
                        0.0
                    };
                    weighted_sum += contribution;
                    breakdown.push(SignalBreakdown {
                        signal: kind.name().to_string(),
                        raw_score: signal.raw_score,
                        weight: *weight,
                        contribution,
                        is_present: true,
                    });
                    for reason in &signal.reasons {
                        reasons.push(format!("[{}] {}", kind.name(), reason));
                    }
                }
                None => breakdown.push(SignalBreakdown {
                    signal: kind.name().to_string(),
                    raw_score: 0.0,
                    weight: 0.0,
                    contribution: 0.0,
                    is_present: false,
                }),
            }
        }

        let score = weighted_sum.min(1.0);

        CompositeScore {
            score,
            is_flagged: score >= self.config.flag_threshold,
            severity: self.severity_for(score),
            breakdown,
            reasons,
        }
    }

    fn severity_for(&self, score: f32) -> Severity {
        if score >= self.config.critical_threshold {
            Severity::Critical
        } else if score >= self.config.high_threshold {
            Severity::High
        } else if score >= self.config.medium_threshold {
            Severity::Medium
        } else if score >= self.config.low_threshold {
            Severity::Low
        } else {
            Severity::None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scorer() -> SignalScorer {
        SignalScorer::new(ScorerConfig::default())
    }

    fn signal(raw: f32) -> SignalResult {
        SignalResult::new(raw, vec![format!("test_reason: raw {raw}")])
    }

    #[test]
    fn zero_signals_scores_zero() {
        let score = scorer().score(&SignalInputs::default());
        assert_eq!(score.score, 0.0);
        assert_eq!(score.severity, Severity::None);
        assert!(!score.is_flagged);
        assert!(score.reasons.is_empty());
        assert_eq!(score.breakdown.len(), 4);
        assert!(score.breakdown.iter().all(|b| !b.is_present));
    }

    #[test]
    fn all_signals_at_max_caps_at_one() {
        let inputs = SignalInputs {
            keyword: Some(signal(1.0)),
            vip: Some(signal(1.0)),
            velocity: Some(signal(1.0)),
            calendar: Some(signal(1.0)),
        };
        let score = scorer().score(&inputs);
        assert!((score.score - 1.0).abs() < 1e-6);
        assert_eq!(score.severity, Severity::Critical);
    }

    #[test]
    fn absent_signals_do_not_penalize() {
        // {keyword: 0.5} alone must equal 0.5 regardless of other weights.
        let inputs = SignalInputs {
            keyword: Some(signal(0.5)),
            ..Default::default()
        };
        let score = scorer().score(&inputs);
        assert!((score.score - 0.5).abs() < 1e-6);
    }

    #[test]
    fn weighted_average_over_present_signals() {
        // keyword 0.8 * 1.0 + vip 0.7 * 0.0 over weight 1.5
        let inputs = SignalInputs {
            keyword: Some(signal(1.0)),
            vip: Some(signal(0.0)),
            ..Default::default()
        };
        let score = scorer().score(&inputs);
        let expected = 0.8 / 1.5;
        assert!((score.score - expected).abs() < 1e-6);
    }

    #[test]
    fn contributions_sum_to_score() {
        let inputs = SignalInputs {
            keyword: Some(signal(0.9)),
            velocity: Some(signal(0.4)),
            calendar: Some(signal(0.7)),
            ..Default::default()
        };
        let score = scorer().score(&inputs);
        let sum: f32 = score.breakdown.iter().map(|b| b.contribution).sum();
        assert!((sum - score.score).abs() < 1e-5);
    }

    #[test]
    fn severity_boundaries_are_exact() {
        let s = scorer();
        assert_eq!(s.severity_for(0.9), Severity::Critical);
        assert_eq!(s.severity_for(0.89999), Severity::High);
        assert_eq!(s.severity_for(0.7), Severity::High);
        assert_eq!(s.severity_for(0.69999), Severity::Medium);
        assert_eq!(s.severity_for(0.5), Severity::Medium);
        assert_eq!(s.severity_for(0.3), Severity::Low);
        assert_eq!(s.severity_for(0.29999), Severity::None);
    }

    #[test]
    fn flag_threshold_applies() {
        let inputs = SignalInputs {
            vip: Some(signal(0.3)),
            ..Default::default()
        };
        let score = scorer().score(&inputs);
        assert!(score.is_flagged);

        let inputs = SignalInputs {
            vip: Some(signal(0.29)),
            ..Default::default()
        };
        assert!(!scorer().score(&inputs).is_flagged);
    }

    #[test]
    fn reasons_tagged_with_signal_name() {
        let inputs = SignalInputs {
            vip: Some(SignalResult::new(0.8, vec!["explicit_vip: on list".into()])),
            keyword: Some(SignalResult::new(0.6, vec!["urgent: matched".into()])),
            ..Default::default()
        };
        let score = scorer().score(&inputs);
        assert!(score.reasons.iter().any(|r| r.starts_with("[vip]")));
        assert!(score.reasons.iter().any(|r| r.starts_with("[keyword]")));
    }

    #[test]
    fn breakdown_reports_absent_slots_as_zeros() {
        let inputs = SignalInputs {
            keyword: Some(signal(0.5)),
            ..Default::default()
        };
        let score = scorer().score(&inputs);
        let vip = score.breakdown.iter().find(|b| b.signal == "vip").unwrap();
        assert!(!vip.is_present);
        assert_eq!(vip.raw_score, 0.0);
        assert_eq!(vip.weight, 0.0);
        assert_eq!(vip.contribution, 0.0);
    }
}
