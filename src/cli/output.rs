//! Output formatting for CLI commands.

use std::time::Duration;

use serde::Serialize;

use crate::agent::orchestrator::{ChatOutcome, RunOutcome};
use crate::agent::Role;

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
}

impl OutputFormat {
    /// Parses a format name; unknown names fall back to text.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }

    /// Serializes `value` as pretty JSON.
    pub fn to_json<T: Serialize + ?Sized>(self, value: &T) -> String {
        serde_json::to_string_pretty(value)
            .unwrap_or_else(|e| format!("{{\"error\": \"serialization failed: {e}\"}}"))
    }
}

/// Renders a pipeline outcome as text: the answer plus a short footer.
#[must_use]
pub fn format_run_outcome(outcome: &RunOutcome) -> String {
    let subtasks: usize = outcome.planned_tasks.iter().map(|p| p.sub_tasks.len()).sum();
    let mut output = outcome.answer.trim_end().to_string();
    output.push_str(&format!(
        "\n\n---\nTasks: {} | Subtasks: {} | Tool calls: {} | Time: {:.1}s",
        outcome.tasks.len(),
        subtasks,
        outcome.tool_contexts.len(),
        Duration::from_millis(outcome.elapsed_ms).as_secs_f64()
    ));
    if outcome.research_incomplete {
        output.push_str("\nResearch incomplete: some subtasks hit the iteration cap.");
    }
    output.push('\n');
    output
}

/// Renders an agent turn as text.
///
/// Status lines of this turn are shown before the answer when `verbose`.
#[must_use]
pub fn format_chat_outcome(outcome: &ChatOutcome, verbose: bool) -> String {
    let mut output = String::new();
    if verbose {
        let turn_start = outcome
            .messages
            .iter()
            .rposition(|m| m.role == Role::User)
            .unwrap_or(0);
        for message in outcome.messages[turn_start..].iter().filter(|m| m.synthetic) {
            output.push_str(&format!("> {}\n", message.content));
        }
        if !output.is_empty() {
            output.push('\n');
        }
    }
    output.push_str(outcome.answer.trim_end());
    output.push_str(&format!("\n\n---\nSteps: {}", outcome.iterations));
    if outcome.capped {
        output.push_str(" (step limit reached)");
    }
    output.push('\n');
    output
}
