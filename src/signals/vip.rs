//! VIP detector — list membership, interaction history, recency, job title.

use chrono::{DateTime, Duration, Utc};

use crate::config::VipConfig;
use crate::signals::SignalResult;

/// What the engine knows about a sender, supplied by the host.
#[derive(Debug, Clone, Default)]
pub struct SenderProfile {
    pub email: String,
    pub interaction_count: u32,
    pub last_interaction_at: Option<DateTime<Utc>>,
    pub job_title: Option<String>,
}

/// VIP detection output: the signal plus the derived boolean.
#[derive(Debug, Clone)]
pub struct VipAssessment {
    pub result: SignalResult,
    pub is_vip: bool,
}

/// Scores a sender's importance from several additive cues, capped at 1.0.
pub struct VipDetector {
    config: VipConfig,
}

impl VipDetector {
    pub fn new(config: VipConfig) -> Self {
        Self { config }
    }

    /// Assess a sender. `now` is injected so recency is testable.
    pub fn assess(&self, profile: &SenderProfile, now: DateTime<Utc>) -> VipAssessment {
        let mut score = 0.0_f32;
        let mut reasons = Vec::new();
        let email_lower = profile.email.to_lowercase();

        if self
            .config
            .vip_list
            .iter()
            .any(|vip| vip.to_lowercase() == email_lower)
        {
            score += self.config.explicit_weight;
            reasons.push(format!("explicit_vip: {} is on the VIP list", profile.email));
        }

        // Interaction tiers are mutually exclusive; the higher tier wins.
        if profile.interaction_count >= self.config.high_interaction_threshold {
            score += self.config.high_tier_weight;
            reasons.push(format!(
                "high_interaction: {} interactions",
                profile.interaction_count
            ));
        } else if profile.interaction_count >= self.config.medium_interaction_threshold {
            score += self.config.medium_tier_weight;
            reasons.push(format!(
                "medium_interaction: {} interactions",
                profile.interaction_count
            ));
        }

        if let Some(last) = profile.last_interaction_at
            && now.signed_duration_since(last) <= Duration::days(self.config.recency_days)
        {
            score += self.config.recency_boost;
            reasons.push(format!(
                "recent_interaction: last contact within {} days",
                self.config.recency_days
            ));
        }

        if let Some(ref title) = profile.job_title {
            let title_lower = title.to_lowercase();
            if self
                .config
                .executive_titles
                .iter()
                .any(|t| title_lower.contains(t.as_str()))
            {
                score += self.config.title_boost;
                reasons.push(format!("job_title: {title}"));
            }
        }

        let result = SignalResult::new(score, reasons);
        let is_vip = result.raw_score >= 0.5;
        VipAssessment { result, is_vip }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector(vip_list: Vec<String>) -> VipDetector {
        VipDetector::new(VipConfig {
            vip_list,
            ..Default::default()
        })
    }

    #[test]
    fn all_cues_together_cap_at_one() {
        let detector = detector(vec!["v@corp.com".into()]);
        let profile = SenderProfile {
            email: "v@corp.com".into(),
            interaction_count: 60,
            last_interaction_at: Some(Utc::now()),
            job_title: Some("CEO".into()),
        };
        let assessment = detector.assess(&profile, Utc::now());

        assert!(assessment.is_vip);
        // 0.8 + 0.6 + 0.2 + 0.3 would be 1.9 — must cap.
        assert!(assessment.result.raw_score <= 1.0);
        for kind in [
            "explicit_vip",
            "high_interaction",
            "recent_interaction",
            "job_title",
        ] {
            assert!(
                assessment.result.reasons.iter().any(|r| r.starts_with(kind)),
                "missing reason kind {kind}"
            );
        }
    }

    #[test]
    fn interaction_tiers_are_exclusive() {
        let detector = detector(vec![]);
        let profile = SenderProfile {
            email: "x@x.com".into(),
            interaction_count: 60,
            ..Default::default()
        };
        let assessment = detector.assess(&profile, Utc::now());
        assert!((assessment.result.raw_score - 0.6).abs() < 1e-6);
        assert!(
            !assessment
                .result
                .reasons
                .iter()
                .any(|r| r.starts_with("medium_interaction"))
        );
    }

    #[test]
    fn medium_tier_applies_between_thresholds() {
        let detector = detector(vec![]);
        let profile = SenderProfile {
            email: "x@x.com".into(),
            interaction_count: 25,
            ..Default::default()
        };
        let assessment = detector.assess(&profile, Utc::now());
        assert!((assessment.result.raw_score - 0.4).abs() < 1e-6);
        assert!(!assessment.is_vip);
    }

    #[test]
    fn stale_interaction_gets_no_recency_boost() {
        let detector = detector(vec![]);
        let profile = SenderProfile {
            email: "x@x.com".into(),
            interaction_count: 0,
            last_interaction_at: Some(Utc::now() - Duration::days(30)),
            job_title: None,
        };
        let assessment = detector.assess(&profile, Utc::now());
        assert_eq!(assessment.result.raw_score, 0.0);
    }

    #[test]
    fn explicit_list_is_case_insensitive() {
        let detector = detector(vec!["Boss@Corp.COM".into()]);
        let profile = SenderProfile {
            email: "boss@corp.com".into(),
            ..Default::default()
        };
        let assessment = detector.assess(&profile, Utc::now());
        assert!((assessment.result.raw_score - 0.8).abs() < 1e-6);
        assert!(assessment.is_vip);
    }

    #[test]
    fn executive_title_substring_matches() {
        let detector = detector(vec![]);
        let profile = SenderProfile {
            email: "x@x.com".into(),
            job_title: Some("VP of Engineering".into()),
            ..Default::default()
        };
        let assessment = detector.assess(&profile, Utc::now());
        assert!((assessment.result.raw_score - 0.3).abs() < 1e-6);
    }

    #[test]
    fn unknown_sender_scores_zero() {
        let detector = detector(vec![]);
        let assessment = detector.assess(&SenderProfile::default(), Utc::now());
        assert_eq!(assessment.result.raw_score, 0.0);
        assert!(!assessment.is_vip);
        assert!(assessment.result.reasons.is_empty());
    }
}
