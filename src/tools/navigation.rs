//! In-process navigation tools. These act directly on the session
//! tracker and never touch the mailbox.

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::tools::{ToolContext, ToolHandler, ToolResult};

fn empty_schema() -> Value {
    json!({"type": "object", "properties": {}, "required": []})
}

/// Advance to the next pending email.
pub struct NextEmailTool;

#[async_trait]
impl ToolHandler for NextEmailTool {
    fn name(&self) -> &str {
        "next_email"
    }

    fn description(&self) -> &str {
        "Move to the next email in the briefing."
    }

    fn parameters_schema(&self) -> Value {
        empty_schema()
    }

    async fn invoke(&self, _args: Value, ctx: &ToolContext) -> ToolResult {
        match ctx.tracker.advance().await {
            Some(view) => ToolResult::ok(format!(
                "Now on \"{}\" from {} (topic: {}). Summary: {}",
                view.item.subject, view.item.sender, view.topic_label, view.item.summary
            )),
            None => ToolResult::ok("That was the last email; the briefing is complete."),
        }
    }
}

/// Skip everything left in the current topic.
pub struct SkipTopicTool;

#[async_trait]
impl ToolHandler for SkipTopicTool {
    fn name(&self) -> &str {
        "skip_topic"
    }

    fn description(&self) -> &str {
        "Skip the rest of the current topic and move to the next one."
    }

    fn parameters_schema(&self) -> Value {
        empty_schema()
    }

    async fn invoke(&self, _args: Value, ctx: &ToolContext) -> ToolResult {
        match ctx.tracker.skip_topic().await {
            Some(view) => ToolResult::ok(format!(
                "Skipped. Next topic: \"{}\", starting with \"{}\" from {}.",
                view.topic_label, view.item.subject, view.item.sender
            )),
            None => ToolResult::ok("Skipped. No more topics remain; the briefing is complete."),
        }
    }
}

/// Return to the previous email.
pub struct GoBackTool;

#[async_trait]
impl ToolHandler for GoBackTool {
    fn name(&self) -> &str {
        "go_back"
    }

    fn description(&self) -> &str {
        "Go back to the previous email in the briefing."
    }

    fn parameters_schema(&self) -> Value {
        empty_schema()
    }

    async fn invoke(&self, _args: Value, ctx: &ToolContext) -> ToolResult {
        match ctx.tracker.go_back().await {
            Some(view) => ToolResult::ok(format!(
                "Back on \"{}\" from {}. Summary: {}",
                view.item.subject, view.item.sender, view.item.summary
            )),
            None => ToolResult::failed("There is no earlier email to go back to."),
        }
    }
}

/// Report how far through the briefing the user is.
pub struct SessionProgressTool;

#[async_trait]
impl ToolHandler for SessionProgressTool {
    fn name(&self) -> &str {
        "session_progress"
    }

    fn description(&self) -> &str {
        "Report briefing progress: how many emails are done and how many remain."
    }

    fn parameters_schema(&self) -> Value {
        empty_schema()
    }

    async fn invoke(&self, _args: Value, ctx: &ToolContext) -> ToolResult {
        let progress = ctx.tracker.progress().await;
        let mut message = format!(
            "{} of {} emails covered ({} briefed, {} actioned, {} skipped); {} remaining.",
            progress.total - progress.remaining,
            progress.total,
            progress.briefed,
            progress.actioned,
            progress.skipped,
            progress.remaining,
        );
        if let Some(topic) = &progress.current_topic {
            message.push_str(&format!(" Currently on topic \"{topic}\"."));
        }
        ToolResult::ok(message)
    }
}

/// The default navigation tool set for a briefing session.
pub fn navigation_tools() -> Vec<std::sync::Arc<dyn ToolHandler>> {
    vec![
        std::sync::Arc::new(NextEmailTool),
        std::sync::Arc::new(SkipTopicTool),
        std::sync::Arc::new(GoBackTool),
        std::sync::Arc::new(SessionProgressTool),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::{Priority, Topic, TopicItem};
    use crate::session::SessionTracker;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    fn entry(id: &str) -> TopicItem {
        TopicItem {
            item_id: id.into(),
            subject: format!("subject {id}"),
            sender: "x@x.com".into(),
            summary: format!("summary {id}"),
            is_vip: false,
            score: 0.0,
            is_flagged: false,
        }
    }

    fn ctx() -> ToolContext {
        let topics = vec![
            Topic::new("alpha", Priority::High, vec![entry("a1"), entry("a2")]),
            Topic::new("beta", Priority::Low, vec![entry("b1")]),
        ];
        ToolContext {
            user_id: "u1".into(),
            tracker: Arc::new(SessionTracker::new(
                "u1",
                Arc::new(MemoryStore::new()),
                topics,
            )),
        }
    }

    #[tokio::test]
    async fn next_email_advances_the_cursor() {
        let ctx = ctx();
        let result = NextEmailTool.invoke(json!({}), &ctx).await;
        assert!(result.success);
        assert!(result.message.contains("subject a2"));
    }

    #[tokio::test]
    async fn skip_topic_jumps_to_next_topic() {
        let ctx = ctx();
        let result = SkipTopicTool.invoke(json!({}), &ctx).await;
        assert!(result.success);
        assert!(result.message.contains("beta"));
    }

    #[tokio::test]
    async fn go_back_without_history_fails_gracefully() {
        let ctx = ctx();
        let result = GoBackTool.invoke(json!({}), &ctx).await;
        assert!(!result.success);
    }

    #[tokio::test]
    async fn progress_reports_counts() {
        let ctx = ctx();
        NextEmailTool.invoke(json!({}), &ctx).await;
        let result = SessionProgressTool.invoke(json!({}), &ctx).await;
        assert!(result.message.contains("1 of 3"));
        assert!(result.message.contains("2 remaining"));
    }
}
