//! Automatic tool execution.
//!
//! After each assistant turn the [`ToolLoop`] decides whether the client should run
//! the requested tools and ask the model again:
//!
//! ```text
//! response ──▶ assistant turn appended ──▶ tool calls?
//!                                            │ no ─────────────────▶ Finished
//!                                            │ yes, not executable ─▶ Finished (caller handles them)
//!                                            ▼ yes
//!                              round limit reached? ── yes ──▶ Error::RecursionLimit
//!                                            ▼ no
//!                      run calls in order, append one tool message each
//!                                            ▼
//!                              too many handler errors? ── yes ──▶ Error::Tool
//!                                            ▼ no
//!                                        Continue ──▶ next request
//! ```
//!
//! Problems local to one call never abort the loop; they are reported to the model
//! as the tool's output so it can correct itself.

use crate::tools::ToolRegistry;
use crate::types::{AggregateResult, LlmOptions, Message, StreamEvent, ToolCall};
use crate::{Error, Result};
use serde_json::Value;

/// How one tool call went
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolStatus {
    Success,
    UnknownTool,
    InvalidArguments,
    /// The handler returned an error
    Failed,
}

/// The text fed back to the model for one call
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutcome {
    pub call_id: String,
    pub name: String,
    pub content: String,
    pub status: ToolStatus,
}

impl ToolOutcome {
    pub fn is_error(&self) -> bool {
        self.status != ToolStatus::Success
    }

    /// Tool-role message answering the call
    pub fn to_message(&self) -> Message {
        Message::tool_result(&self.call_id, &self.content)
    }

    pub fn to_event(&self) -> StreamEvent {
        StreamEvent::ToolResult {
            call_id: self.call_id.clone(),
            name: self.name.clone(),
            result: self.content.clone(),
        }
    }
}

/// Run one call against the registry. Never fails: every problem becomes the
/// outcome's content.
pub async fn execute_tool_call(registry: &ToolRegistry, call: &ToolCall) -> ToolOutcome {
    let outcome = |status, content: String| ToolOutcome {
        call_id: call.id.clone(),
        name: call.name.clone(),
        content,
        status,
    };

    let Some(tool) = registry.get(&call.name) else {
        log::warn!("Model requested unknown tool '{}'", call.name);
        return outcome(
            ToolStatus::UnknownTool,
            format!("error: unknown tool '{}'", call.name),
        );
    };

    let arguments = match call.arguments() {
        Ok(arguments) => arguments.clone(),
        Err(Error::Schema { message, .. }) => {
            return outcome(
                ToolStatus::InvalidArguments,
                format!("error: invalid arguments for tool '{}': {}", call.name, message),
            );
        }
        Err(e) => {
            return outcome(
                ToolStatus::InvalidArguments,
                format!("error: invalid arguments for tool '{}': {}", call.name, e),
            );
        }
    };

    log::debug!("Executing tool '{}' ({})", call.name, call.id);
    match tool.execute(arguments).await {
        Ok(Value::String(text)) => outcome(ToolStatus::Success, text),
        Ok(value) => outcome(ToolStatus::Success, value.to_string()),
        Err(e) => {
            log::warn!("Tool '{}' failed: {}", call.name, e);
            outcome(ToolStatus::Failed, format!("error: {}", e))
        }
    }
}

/// Run calls one at a time, in order
pub async fn execute_tool_calls(registry: &ToolRegistry, calls: &[ToolCall]) -> Vec<ToolOutcome> {
    let mut outcomes = Vec::with_capacity(calls.len());
    for call in calls {
        outcomes.push(execute_tool_call(registry, call).await);
    }
    outcomes
}

/// What the driver should do after a turn
#[derive(Debug, Clone, PartialEq)]
pub enum LoopStep {
    /// The turn is final
    Finished,
    /// Tools ran; their outcomes were appended, request again
    Continue(Vec<ToolOutcome>),
}

/// Round and error accounting for one request
#[derive(Debug, Clone)]
pub struct ToolLoop {
    enabled: bool,
    max_rounds: u32,
    max_errors: u32,
    rounds: u32,
    errors: u32,
}

impl ToolLoop {
    pub fn new(enabled: bool, max_rounds: u32, max_errors: u32) -> Self {
        Self {
            enabled,
            max_rounds: max_rounds.max(1),
            max_errors,
            rounds: 0,
            errors: 0,
        }
    }

    pub fn from_options(options: &LlmOptions) -> Self {
        Self::new(
            options.auto_execute_tools,
            options.max_tool_rounds,
            options.max_tool_errors,
        )
    }

    /// Rounds executed so far
    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    /// Handler failures so far
    pub fn errors(&self) -> u32 {
        self.errors
    }

    /// Record `result` in `conversation` and run its tool calls if this client
    /// is responsible for them.
    ///
    /// # Errors
    ///
    /// - [`Error::RecursionLimit`] when the model still wants tools after
    ///   `max_tool_rounds` rounds
    /// - [`Error::Tool`] when handler failures exceed `max_tool_errors`
    pub async fn advance(
        &mut self,
        registry: &ToolRegistry,
        conversation: &mut Vec<Message>,
        result: &AggregateResult,
    ) -> Result<LoopStep> {
        conversation.push(Message::assistant_turn(result));

        if !self.enabled || !result.has_tool_calls() || !registry.has_handlers() {
            return Ok(LoopStep::Finished);
        }
        if let Some(call) = result
            .tool_calls
            .iter()
            .find(|call| is_caller_handled(registry, &call.name))
        {
            log::debug!(
                "Tool '{}' has no local handler; returning calls to the caller",
                call.name
            );
            return Ok(LoopStep::Finished);
        }

        if self.rounds >= self.max_rounds {
            return Err(Error::RecursionLimit {
                rounds: self.rounds,
                conversation: conversation.clone(),
            });
        }
        self.rounds += 1;

        let outcomes = execute_tool_calls(registry, &result.tool_calls).await;
        conversation.extend(outcomes.iter().map(ToolOutcome::to_message));

        self.errors += outcomes
            .iter()
            .filter(|o| o.status == ToolStatus::Failed)
            .count() as u32;
        if self.errors > self.max_errors {
            return Err(Error::tool(format!(
                "{} tool invocations failed, more than the allowed {}",
                self.errors, self.max_errors
            )));
        }

        log::debug!(
            "Tool round {}/{} executed {} calls",
            self.rounds,
            self.max_rounds,
            outcomes.len()
        );
        Ok(LoopStep::Continue(outcomes))
    }
}

/// Offered to the model but without a local handler
fn is_caller_handled(registry: &ToolRegistry, name: &str) -> bool {
    registry.get(name).is_none() && registry.specs().iter().any(|spec| spec.name == name)
}
