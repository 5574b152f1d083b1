//! Tools exposed to the reasoner during a briefing session.
//!
//! Navigation tools run in-process against the session tracker. Mailbox
//! mutations (archive, flag, mute, draft, mark read) are executed by
//! host-provided handlers registered alongside them; the engine records
//! their lifecycle effects. `email_tool_definitions` gives hosts the
//! schemas those handlers are expected to declare.

pub mod navigation;
pub mod registry;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::llm::ToolDefinition;
use crate::session::SessionTracker;

pub use registry::ToolRegistry;

/// Mailbox tools whose successful calls are recorded against item
/// lifecycle.
pub const EMAIL_TOOLS: &[&str] = &[
    "archive_email",
    "flag_email",
    "mark_read",
    "mute_sender",
    "draft_reply",
];

/// Tools whose success means the current email is dealt with, so the
/// cursor should advance past it.
pub const ADVANCING_TOOLS: &[&str] = &["archive_email", "mark_read"];

/// Tool call the reasoner uses to ask the user which email they meant.
pub const CLARIFICATION_TOOL: &str = "request_clarification";

/// Tool call the reasoner uses to end the briefing session.
pub const END_BRIEFING_TOOL: &str = "end_briefing";

/// How destructive a tool is; high-risk tools require spoken confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Outcome of a tool invocation.
#[derive(Debug, Clone, Serialize)]
pub struct ToolResult {
    pub success: bool,
    pub message: String,
    /// The action ran; the loop should get the user's verbal ack and must
    /// not invoke this tool again for it.
    pub requires_confirmation: bool,
    pub risk_level: RiskLevel,
}

impl ToolResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            requires_confirmation: false,
            risk_level: RiskLevel::Low,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            requires_confirmation: false,
            risk_level: RiskLevel::Low,
        }
    }

    pub fn needs_confirmation(message: impl Into<String>, risk_level: RiskLevel) -> Self {
        Self {
            success: true,
            message: message.into(),
            requires_confirmation: true,
            risk_level,
        }
    }
}

/// Everything a tool needs to act on the live session.
#[derive(Clone)]
pub struct ToolContext {
    pub user_id: String,
    pub tracker: Arc<SessionTracker>,
}

/// An in-process tool the reasoning loop can invoke directly.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters_schema(&self) -> Value;

    async fn invoke(&self, args: Value, ctx: &ToolContext) -> ToolResult;
}

/// Schemas the host's mailbox tool handlers are expected to declare.
pub fn email_tool_definitions() -> Vec<ToolDefinition> {
    let item_id_schema = json!({
        "type": "object",
        "properties": {
            "item_id": {
                "type": "string",
                "description": "ID of the email to act on; defaults to the current email"
            }
        },
        "required": []
    });
    vec![
        ToolDefinition {
            name: "archive_email".into(),
            description: "Archive an email, removing it from the inbox.".into(),
            parameters: item_id_schema.clone(),
        },
        ToolDefinition {
            name: "flag_email".into(),
            description: "Flag an email for later follow-up.".into(),
            parameters: item_id_schema.clone(),
        },
        ToolDefinition {
            name: "mark_read".into(),
            description: "Mark an email as read without replying.".into(),
            parameters: item_id_schema,
        },
        ToolDefinition {
            name: "mute_sender".into(),
            description: "Mute a sender so their mail is excluded from future briefings.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "sender": { "type": "string", "description": "Email address to mute" }
                },
                "required": ["sender"]
            }),
        },
        ToolDefinition {
            name: "draft_reply".into(),
            description: "Draft a reply to an email for the user to review.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "item_id": { "type": "string" },
                    "body": { "type": "string", "description": "Reply body text" }
                },
                "required": ["body"]
            }),
        },
    ]
}

/// Definition of the clarification tool the loop intercepts to enter
/// disambiguation.
pub fn clarification_tool_definition() -> ToolDefinition {
    ToolDefinition {
        name: CLARIFICATION_TOOL.into(),
        description: "Ask the user to choose between several emails when a reference is ambiguous."
            .into(),
        parameters: json!({
            "type": "object",
            "properties": {
                "question": { "type": "string", "description": "What to ask the user" },
                "options": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "label": { "type": "string" },
                            "item_id": { "type": "string" }
                        },
                        "required": ["label"]
                    }
                }
            },
            "required": ["question", "options"]
        }),
    }
}

/// Definition of the session-ending tool the loop intercepts.
pub fn end_briefing_tool_definition() -> ToolDefinition {
    ToolDefinition {
        name: END_BRIEFING_TOOL.into(),
        description: "End the briefing session when the user is done.".into(),
        parameters: json!({
            "type": "object",
            "properties": {
                "farewell": { "type": "string", "description": "Closing line to speak" }
            },
            "required": []
        }),
    }
}
