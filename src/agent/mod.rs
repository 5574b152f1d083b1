//! Conversational reasoning over a briefing session.

pub mod intent;
pub mod prompts;
pub mod reasoning_loop;

use async_trait::async_trait;

pub use intent::{ConfirmIntent, DisambigOption, classify_confirmation, match_option};
pub use reasoning_loop::{ReasoningLoop, TurnOutcome};

/// Host-side voice output control. The engine never produces audio; it
/// only tells the host to stop speaking on interrupt.
#[async_trait]
pub trait SpeechControl: Send + Sync {
    /// Stop any in-flight narration immediately.
    async fn stop(&self);
}
