//! Turn-based reasoning loop over a briefing session.
//!
//! One turn = one user utterance in, one spoken response out, plus any
//! email actions taken. Confirmation and disambiguation replies are
//! resolved deterministically before the reasoner is consulted, so a
//! "yes" never costs an LLM round trip. Turns never overlap: a second
//! utterance while one is in flight gets a busy response instead of
//! queueing.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::agent::SpeechControl;
use crate::agent::intent::{ConfirmIntent, DisambigOption, classify_confirmation, match_option};
use crate::agent::prompts;
use crate::llm::{ChatMessage, Reasoner, ToolCall, ToolCompletionRequest, ToolDefinition};
use crate::session::SessionTracker;
use crate::tools::{
    ADVANCING_TOOLS, CLARIFICATION_TOOL, EMAIL_TOOLS, END_BRIEFING_TOOL, RiskLevel, ToolContext,
    ToolRegistry, clarification_tool_definition, end_briefing_tool_definition,
};

/// Reasoner rounds allowed within one turn before giving up on tools.
const MAX_ROUNDS: usize = 3;

/// What one turn produced.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// Text for the host to speak.
    pub response_text: String,
    /// Email tool calls executed during this turn.
    pub actions_taken: Vec<ToolCall>,
    /// The session should end after this response.
    pub should_end: bool,
}

impl TurnOutcome {
    fn spoken(text: String) -> Self {
        Self {
            response_text: text,
            actions_taken: Vec::new(),
            should_end: false,
        }
    }
}

/// An already-executed risky action waiting for the user's verbal ack.
/// Confirming never re-invokes the tool; it only acknowledges.
#[derive(Debug, Clone)]
struct PendingConfirmation {
    tool_name: String,
    description: String,
}

/// An ambiguous reference waiting for the user's choice.
#[derive(Debug, Clone)]
struct Disambiguation {
    options: Vec<DisambigOption>,
}

#[derive(Default)]
struct SessionState {
    messages: Vec<ChatMessage>,
    pending_confirmation: Option<PendingConfirmation>,
    disambiguation: Option<Disambiguation>,
    is_speaking: bool,
    last_spoken_text: Option<String>,
}

/// Per-session conversational loop.
pub struct ReasoningLoop {
    tracker: Arc<SessionTracker>,
    reasoner: Arc<dyn Reasoner>,
    tools: Arc<ToolRegistry>,
    speech: Option<Arc<dyn SpeechControl>>,
    state: Mutex<SessionState>,
    /// Held for the duration of a turn. `try_lock` failure means a turn
    /// is already in flight.
    turn_guard: Mutex<()>,
}

impl ReasoningLoop {
    pub fn new(
        tracker: Arc<SessionTracker>,
        reasoner: Arc<dyn Reasoner>,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        Self {
            tracker,
            reasoner,
            tools,
            speech: None,
            state: Mutex::new(SessionState::default()),
            turn_guard: Mutex::new(()),
        }
    }

    pub fn with_speech(mut self, speech: Arc<dyn SpeechControl>) -> Self {
        self.speech = Some(speech);
        self
    }

    pub fn tracker(&self) -> Arc<SessionTracker> {
        self.tracker.clone()
    }

    /// Handle one user utterance.
    pub async fn process_user_input(&self, input: &str) -> TurnOutcome {
        let Ok(_guard) = self.turn_guard.try_lock() else {
            debug!("Turn rejected, another turn is in flight");
            return TurnOutcome::spoken(prompts::busy_response());
        };

        if input.trim().is_empty() {
            return TurnOutcome::spoken(prompts::didnt_catch());
        }

        // A pending confirmation resolves without the reasoner. The risky
        // action already ran when the tool was first invoked, so confirm
        // acknowledges and cancel acknowledges the cancellation; neither
        // touches the tool again.
        {
            let mut state = self.state.lock().await;
            if let Some(pending) = state.pending_confirmation.take() {
                let text = match classify_confirmation(input) {
                    ConfirmIntent::Confirm => {
                        info!(tool = %pending.tool_name, "Action confirmed");
                        prompts::confirmation_ack(&pending.description)
                    }
                    ConfirmIntent::Cancel => {
                        info!(tool = %pending.tool_name, "Action cancelled by user");
                        prompts::cancellation_ack()
                    }
                    ConfirmIntent::Unclear => {
                        let text = prompts::unclear_confirmation(&pending.description);
                        state.pending_confirmation = Some(pending);
                        return TurnOutcome::spoken(text);
                    }
                };
                state.messages.push(ChatMessage::user(input));
                state.messages.push(ChatMessage::assistant(&text));
                state.last_spoken_text = Some(text.clone());
                return TurnOutcome::spoken(text);
            }
        }

        // A pending disambiguation maps the reply onto an option, then the
        // chosen option flows through the normal reasoning path.
        let selection = {
            let mut state = self.state.lock().await;
            match state.disambiguation.take() {
                Some(disambig) => match match_option(input, &disambig.options) {
                    Some(index) => Some(disambig.options[index].clone()),
                    None => {
                        let labels: Vec<String> =
                            disambig.options.iter().map(|o| o.label.clone()).collect();
                        state.disambiguation = Some(disambig);
                        return TurnOutcome::spoken(prompts::disambiguation_reprompt(&labels));
                    }
                },
                None => None,
            }
        };
        if let Some(option) = selection {
            let synthesized = match &option.item_id {
                Some(id) => format!("I meant the email with id {id} (\"{}\")", option.label),
                None => format!("I meant: {}", option.label),
            };
            return self.run_reasoning(&synthesized).await;
        }

        self.run_reasoning(input).await
    }

    /// The user no longer wants to hear the current narration.
    /// Output-only cancellation: session state is untouched.
    pub async fn interrupt(&self) {
        {
            let mut state = self.state.lock().await;
            state.is_speaking = false;
        }
        if let Some(speech) = &self.speech {
            speech.stop().await;
        }
        debug!("Narration interrupted");
    }

    /// Mark that the host started or finished speaking the last response.
    pub async fn set_speaking(&self, speaking: bool) {
        self.state.lock().await.is_speaking = speaking;
    }

    /// Flush session lifecycle state to the store. Called at session end.
    pub async fn finish(&self) -> usize {
        match self.tracker.flush_to_store().await {
            Ok(count) => count,
            Err(e) => {
                warn!(error = %e, "Session-end flush failed");
                0
            }
        }
    }

    // ── Reasoning rounds ────────────────────────────────────────────

    async fn run_reasoning(&self, input: &str) -> TurnOutcome {
        let cursor_context = self.tracker.build_cursor_context().await;
        let reference = self.tracker.build_compact_reference().await;

        let mut transcript = {
            let mut state = self.state.lock().await;
            state.messages.push(ChatMessage::user(input));
            state.messages.clone()
        };
        let mut messages = vec![ChatMessage::system(system_prompt(
            &cursor_context,
            &reference,
        ))];
        messages.append(&mut transcript);
        // Everything pushed past this point (interim assistant text, tool
        // results) is folded back into the durable transcript on return, so
        // later turns see which tools ran.
        let exchange_start = messages.len();

        let tool_definitions = self.tool_definitions();
        let mut actions: Vec<ToolCall> = Vec::new();

        for round in 0..MAX_ROUNDS {
            let request = ToolCompletionRequest::new(messages.clone(), tool_definitions.clone());
            let response = match self.reasoner.complete_with_tools(request).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(error = %e, round, "Reasoner call failed");
                    let exchange = messages.split_off(exchange_start);
                    return self
                        .finalize(prompts::didnt_catch(), exchange, actions, false)
                        .await;
                }
            };

            if response.tool_calls.is_empty() {
                let text = response
                    .content
                    .filter(|c| !c.trim().is_empty())
                    .unwrap_or_else(prompts::didnt_catch);
                let exchange = messages.split_off(exchange_start);
                return self.finalize(text, exchange, actions, false).await;
            }

            if let Some(content) = &response.content
                && !content.trim().is_empty()
            {
                messages.push(ChatMessage::assistant(content));
            }

            // Tool calls run sequentially so conversation-history ordering
            // stays deterministic.
            for call in response.tool_calls {
                debug!(tool = %call.name, "Tool call requested");

                if call.name == CLARIFICATION_TOOL {
                    let exchange = messages.split_off(exchange_start);
                    return self.enter_disambiguation(&call, exchange, actions).await;
                }
                if call.name == END_BRIEFING_TOOL {
                    let farewell = call
                        .arguments
                        .get("farewell")
                        .and_then(Value::as_str)
                        .unwrap_or("That's everything. Talk to you later.")
                        .to_string();
                    let flushed = self.finish().await;
                    info!(flushed, "Briefing session ending");
                    let exchange = messages.split_off(exchange_start);
                    return self.finalize(farewell, exchange, actions, true).await;
                }

                let Some(handler) = self.tools.get(&call.name) else {
                    warn!(tool = %call.name, "Unknown tool requested");
                    messages.push(ChatMessage::tool_result(
                        &call.id,
                        &call.name,
                        format!("Unknown tool: {}", call.name),
                    ));
                    continue;
                };

                let ctx = self.tool_context();
                let result = handler.invoke(call.arguments.clone(), &ctx).await;

                // The executor already acted; a confirmation-gated result
                // only needs the user's verbal ack, and suppresses any
                // further action this turn.
                if result.requires_confirmation {
                    if EMAIL_TOOLS.contains(&call.name.as_str()) {
                        self.record_email_action(&call).await;
                        actions.push(call.clone());
                    }
                    messages.push(ChatMessage::tool_result(
                        &call.id,
                        &call.name,
                        &result.message,
                    ));
                    let exchange = messages.split_off(exchange_start);
                    return self
                        .enter_confirmation(
                            call,
                            result.message,
                            result.risk_level,
                            exchange,
                            actions,
                        )
                        .await;
                }

                if result.success && EMAIL_TOOLS.contains(&call.name.as_str()) {
                    self.record_email_action(&call).await;
                    actions.push(call.clone());
                }

                messages.push(ChatMessage::tool_result(
                    &call.id,
                    &call.name,
                    &result.message,
                ));
            }
        }

        warn!("Reasoner exhausted tool rounds without a spoken response");
        let exchange = messages.split_off(exchange_start);
        self.finalize(prompts::didnt_catch(), exchange, actions, false)
            .await
    }

    async fn enter_confirmation(
        &self,
        call: ToolCall,
        description: String,
        risk: RiskLevel,
        exchange: Vec<ChatMessage>,
        actions: Vec<ToolCall>,
    ) -> TurnOutcome {
        let text = prompts::confirmation_prompt(&description, risk);
        let mut state = self.state.lock().await;
        state.messages.extend(exchange);
        state.pending_confirmation = Some(PendingConfirmation {
            tool_name: call.name,
            description,
        });
        state.messages.push(ChatMessage::assistant(&text));
        state.last_spoken_text = Some(text.clone());
        TurnOutcome {
            response_text: text,
            actions_taken: actions,
            should_end: false,
        }
    }

    async fn enter_disambiguation(
        &self,
        call: &ToolCall,
        exchange: Vec<ChatMessage>,
        actions: Vec<ToolCall>,
    ) -> TurnOutcome {
        let question = call
            .arguments
            .get("question")
            .and_then(Value::as_str)
            .unwrap_or("Which email did you mean?")
            .to_string();
        let options: Vec<DisambigOption> = call
            .arguments
            .get("options")
            .and_then(Value::as_array)
            .map(|opts| {
                opts.iter()
                    .filter_map(|o| {
                        let label = o.get("label")?.as_str()?.to_string();
                        let item_id = o.get("item_id").and_then(Value::as_str).map(String::from);
                        Some(DisambigOption { label, item_id })
                    })
                    .collect()
            })
            .unwrap_or_default();

        if options.is_empty() {
            return self.finalize(question, exchange, actions, false).await;
        }

        let labels: Vec<String> = options.iter().map(|o| o.label.clone()).collect();
        let text = prompts::disambiguation_prompt(&question, &labels);
        let mut state = self.state.lock().await;
        state.messages.extend(exchange);
        state.disambiguation = Some(Disambiguation { options });
        state.messages.push(ChatMessage::assistant(&text));
        state.last_spoken_text = Some(text.clone());
        TurnOutcome {
            response_text: text,
            actions_taken: actions,
            should_end: false,
        }
    }

    async fn finalize(
        &self,
        text: String,
        exchange: Vec<ChatMessage>,
        actions: Vec<ToolCall>,
        should_end: bool,
    ) -> TurnOutcome {
        let mut state = self.state.lock().await;
        state.messages.extend(exchange);
        state.messages.push(ChatMessage::assistant(&text));
        state.last_spoken_text = Some(text.clone());
        state.is_speaking = true;
        TurnOutcome {
            response_text: text,
            actions_taken: actions,
            should_end,
        }
    }

    /// Reflect an executed email action in the session lifecycle. Acting
    /// on the current email also advances the cursor past it.
    async fn record_email_action(&self, call: &ToolCall) {
        let current = self.tracker.current().await;
        let target = call
            .arguments
            .get("item_id")
            .and_then(Value::as_str)
            .map(String::from)
            .or_else(|| current.as_ref().map(|v| v.item.item_id.clone()));

        let Some(item_id) = target else {
            warn!(tool = %call.name, "Email action with no target item");
            return;
        };
        self.tracker.mark_actioned(&item_id, &call.name).await;

        let on_current = current.as_ref().is_some_and(|v| v.item.item_id == item_id);
        if on_current && ADVANCING_TOOLS.contains(&call.name.as_str()) {
            self.tracker.advance().await;
        }
    }

    fn tool_context(&self) -> ToolContext {
        ToolContext {
            user_id: self.tracker.user_id().to_string(),
            tracker: self.tracker.clone(),
        }
    }

    fn tool_definitions(&self) -> Vec<ToolDefinition> {
        let mut definitions = self.tools.definitions();
        definitions.push(clarification_tool_definition());
        definitions.push(end_briefing_tool_definition());
        definitions
    }
}

fn system_prompt(cursor_context: &str, reference: &str) -> String {
    format!(
        "You are a voice assistant walking the user through their email briefing. \
         Keep responses short and speakable: one or two sentences, no markdown, no lists. \
         Use the navigation tools to move through the briefing and the email tools to act on mail. \
         When the user refers to an email ambiguously, call request_clarification with the candidates. \
         When the user is done, call end_briefing.\n\n\
         {cursor_context}\n\nPending emails:\n{reference}"
    )
}
