//! Importance signals — independent detectors plus the composite scorer.
//!
//! Each detector is a stateless pure function of an item and its own config,
//! producing the same `raw score + reasons` shape. The scorer combines
//! whichever signals are present into one composite importance score.

pub mod calendar;
pub mod keyword;
pub mod scorer;
pub mod velocity;
pub mod vip;

pub use calendar::{CalendarEvent, CalendarProximityDetector};
pub use keyword::{CombineMode, KeywordMatcher, KeywordPattern, MatchField};
pub use scorer::{CompositeScore, Severity, SignalBreakdown, SignalInputs, SignalScorer};
pub use velocity::{ThreadStats, ThreadVelocityDetector};
pub use vip::{SenderProfile, VipAssessment, VipDetector};

/// Output of a single detector.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignalResult {
    /// Raw importance in [0, 1].
    pub raw_score: f32,
    /// Human-readable reasons, each prefixed with its reason kind.
    pub reasons: Vec<String>,
}

impl SignalResult {
    pub fn new(raw_score: f32, reasons: Vec<String>) -> Self {
        Self {
            raw_score: raw_score.clamp(0.0, 1.0),
            reasons,
        }
    }

    /// A zero signal with no reasons.
    pub fn none() -> Self {
        Self::default()
    }
}

/// The four named signal slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Keyword,
    Vip,
    Velocity,
    Calendar,
}

impl SignalKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Keyword => "keyword",
            Self::Vip => "vip",
            Self::Velocity => "velocity",
            Self::Calendar => "calendar",
        }
    }
}
