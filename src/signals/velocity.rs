//! Thread velocity detector — how fast a thread is moving.

use crate::signals::SignalResult;

/// Message activity in a thread over a recent window.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadStats {
    pub messages_in_window: u32,
    pub window_hours: u32,
}

/// Buckets thread activity into a raw score. The exact buckets are a
/// swappable heuristic; the contract is just `raw score + reasons`.
#[derive(Debug, Clone, Default)]
pub struct ThreadVelocityDetector;

impl ThreadVelocityDetector {
    pub fn new() -> Self {
        Self
    }

    pub fn detect(&self, stats: &ThreadStats) -> SignalResult {
        let raw_score = match stats.messages_in_window {
            n if n >= 10 => 1.0,
            n if n >= 5 => 0.7,
            n if n >= 3 => 0.4,
            2 => 0.2,
            _ => 0.0,
        };

        let reasons = if raw_score > 0.0 {
            vec![format!(
                "active_thread: {} messages in the last {}h",
                stats.messages_in_window,
                stats.window_hours.max(1)
            )]
        } else {
            Vec::new()
        };

        SignalResult::new(raw_score, reasons)
    }
}
