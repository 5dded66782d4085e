use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use super::{AGENT_STEP, ANNOUNCE, NodeContext, PROGRESS, TOOL_EXEC, WRAP_UP};
use crate::agent::graph::{END, Node, Router};
use crate::agent::llm::CallOptions;
use crate::agent::message::{
    ChatMessage, Role, assistant_message, status_message, system_message, tool_message,
    tool_result_message,
};
use crate::agent::state::{RunState, StateUpdate};
use crate::agent::tool::{ToolCall, ToolResult};
use crate::error::AgentError;

/// Tool result recorded for calls left pending when the loop was capped.
pub const SKIPPED_CALL: &str = "Not executed: the step limit was reached before this call ran.";

fn is_model_turn(message: &ChatMessage) -> bool {
    message.role == Role::Assistant && !message.synthetic
}

/// Last model-authored assistant turn; status lines are skipped.
fn last_assistant(state: &RunState) -> Option<&ChatMessage> {
    state.messages.iter().rev().find(|m| is_model_turn(m))
}

/// Tool calls of the last assistant turn.
fn pending_calls(state: &RunState) -> &[ToolCall] {
    last_assistant(state).map_or(&[], |m| m.tool_calls.as_slice())
}

/// One model turn over the transcript with every tool bound.
#[derive(Debug, Clone)]
pub struct AgentStep {
    ctx: NodeContext,
}

impl AgentStep {
    /// Creates the node.
    pub const fn new(ctx: NodeContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Node<RunState> for AgentStep {
    fn name(&self) -> &'static str {
        AGENT_STEP
    }

    async fn run(&self, state: &RunState) -> Result<StateUpdate, AgentError> {
        let mut messages = Vec::with_capacity(state.messages.len() + 1);
        messages.push(system_message(&self.ctx.prompts.agent));
        messages.extend(state.messages.iter().filter(|m| !m.synthetic).cloned());

        let opts = CallOptions::new(self.ctx.prompts.agent.as_str()).model(&state.model);
        let turn = self
            .ctx
            .llm
            .converse(messages, &opts, self.ctx.registry.definitions())
            .await?;

        let iterations = state.iterations + 1;
        debug!(iterations, tool_calls = turn.tool_calls.len(), "agent step");

        let answer = turn.tool_calls.is_empty().then(|| turn.content.clone());
        Ok(StateUpdate {
            messages: vec![assistant_message(&turn.content, turn.tool_calls)],
            iterations: Some(iterations),
            answer,
            ..StateUpdate::default()
        })
    }
}

/// Status line naming the tools about to run.
#[derive(Debug, Clone, Copy, Default)]
pub struct Announce;

#[async_trait]
impl Node<RunState> for Announce {
    fn name(&self) -> &'static str {
        ANNOUNCE
    }

    async fn run(&self, state: &RunState) -> Result<StateUpdate, AgentError> {
        let names: Vec<&str> = pending_calls(state).iter().map(|c| c.name.as_str()).collect();
        Ok(StateUpdate {
            messages: vec![status_message(&format!("Fetching data: {}", names.join(", ")))],
            ..StateUpdate::default()
        })
    }
}

/// Executes the pending tool calls in order.
///
/// Every call yields exactly one tool message; failures become the message
/// text so the model can react on its next step.
#[derive(Debug, Clone)]
pub struct ToolExec {
    ctx: NodeContext,
}

impl ToolExec {
    /// Creates the node.
    pub const fn new(ctx: NodeContext) -> Self {
        Self { ctx }
    }

    async fn execute(&self, call: &ToolCall) -> ToolResult {
        let outcome = match call.parse_arguments() {
            Ok(args) => self.ctx.registry.invoke(&call.name, &args).await,
            Err(e) => Err(e),
        };
        let (content, is_error) = match outcome {
            Ok(value) => (value.to_string(), false),
            Err(e @ crate::error::ToolError::UnknownTool { .. }) => (format!("Error: {e}"), true),
            Err(e) => (format!("Error from {}: {e}", call.name), true),
        };
        ToolResult {
            tool_call_id: call.id.clone(),
            content,
            is_error,
        }
    }
}

#[async_trait]
impl Node<RunState> for ToolExec {
    fn name(&self) -> &'static str {
        TOOL_EXEC
    }

    async fn run(&self, state: &RunState) -> Result<StateUpdate, AgentError> {
        let mut messages = Vec::new();
        for call in pending_calls(state) {
            let result = self.execute(call).await;
            debug!(tool = %call.name, is_error = result.is_error, "agent tool call");
            messages.push(tool_result_message(result));
        }
        Ok(StateUpdate {
            messages,
            ..StateUpdate::default()
        })
    }
}

/// Status line summarizing the tool results just received.
#[derive(Debug, Clone, Copy, Default)]
pub struct Progress;

#[async_trait]
impl Node<RunState> for Progress {
    fn name(&self) -> &'static str {
        PROGRESS
    }

    async fn run(&self, state: &RunState) -> Result<StateUpdate, AgentError> {
        let calls = pending_calls(state);
        let results: Vec<&ChatMessage> = state
            .messages
            .iter()
            .rev()
            .take_while(|m| !is_model_turn(m))
            .filter(|m| m.role == Role::Tool)
            .collect();
        let failed: Vec<&str> = calls
            .iter()
            .filter(|c| {
                results
                    .iter()
                    .any(|m| m.tool_call_id.as_deref() == Some(c.id.as_str()) && m.is_error)
            })
            .map(|c| c.name.as_str())
            .collect();

        let mut line = format!(
            "Received {} of {} tool results",
            calls.len() - failed.len(),
            calls.len()
        );
        if !failed.is_empty() {
            let _ = write!(line, "; failed: {}", failed.join(", "));
        }
        info!(step = state.iterations, "{line}");

        Ok(StateUpdate {
            messages: vec![status_message(&line)],
            ..StateUpdate::default()
        })
    }
}

/// Ends a turn stopped by the step cap.
///
/// The answer is the capped turn's own text when it wrote any, otherwise a
/// notice naming the cap. Each requested call gets a [`SKIPPED_CALL`] result
/// so the transcript stays well formed for the next turn.
#[derive(Debug, Clone, Copy, Default)]
pub struct WrapUp;

#[async_trait]
impl Node<RunState> for WrapUp {
    fn name(&self) -> &'static str {
        WRAP_UP
    }

    async fn run(&self, state: &RunState) -> Result<StateUpdate, AgentError> {
        let partial = last_assistant(state).map_or("", |m| m.content.trim());
        let answer = if partial.is_empty() {
            format!(
                "Stopped after {} agent steps before the research was finished. Try a narrower question.",
                state.iterations
            )
        } else {
            partial.to_string()
        };
        let calls = pending_calls(state);
        info!(
            step = state.iterations,
            skipped = calls.len(),
            "agent step limit reached"
        );

        Ok(StateUpdate {
            messages: calls
                .iter()
                .map(|c| tool_message(&c.id, SKIPPED_CALL))
                .collect(),
            answer: Some(answer),
            ..StateUpdate::default()
        })
    }
}

/// Routes after an agent step.
///
/// A turn without tool calls is final. Otherwise the cap is checked first:
/// once `max_iterations` steps have run, the requested calls are skipped.
pub fn route_after_agent_step(max_iterations: usize) -> Router<RunState> {
    Arc::new(move |state: &RunState| {
        if pending_calls(state).is_empty() {
            END
        } else if state.iterations >= max_iterations {
            WRAP_UP
        } else {
            ANNOUNCE
        }
    })
}
