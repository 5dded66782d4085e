//! Graph nodes for both topologies.
//!
//! Pipeline: [`PlanTasks`] → [`PlanSubtasks`] → [`ExecuteSubtasks`] →
//! [`GenerateAnswer`], with [`route_after_planning`] skipping straight to the
//! answer when no tasks were planned.
//!
//! Agent loop: [`AgentStep`] → [`Announce`] → [`ToolExec`] → [`Progress`] →
//! [`AgentStep`], bounded by [`route_after_agent_step`].

mod execute_subtasks;
mod generate_answer;
mod plan_subtasks;
mod plan_tasks;
mod react;

use std::sync::Arc;

pub use execute_subtasks::ExecuteSubtasks;
pub use generate_answer::GenerateAnswer;
pub use plan_subtasks::PlanSubtasks;
pub use plan_tasks::{PlanTasks, route_after_planning};
pub use react::{
    AgentStep, Announce, Progress, SKIPPED_CALL, ToolExec, WrapUp, route_after_agent_step,
};

use super::config::AgentConfig;
use super::llm::{CallOptions, LlmService};
use super::prompt::PromptSet;
use crate::tools::ToolRegistry;

/// Node name: task planning.
pub const PLAN_TASKS: &str = "plan_tasks";
/// Node name: subtask planning.
pub const PLAN_SUBTASKS: &str = "plan_subtasks";
/// Node name: subtask execution.
pub const EXECUTE_SUBTASKS: &str = "execute_subtasks";
/// Node name: answer synthesis.
pub const GENERATE_ANSWER: &str = "generate_answer";
/// Node name: one agent turn.
pub const AGENT_STEP: &str = "agent_step";
/// Node name: status line before tools run.
pub const ANNOUNCE: &str = "announce";
/// Node name: tool execution.
pub const TOOL_EXEC: &str = "tool_exec";
/// Node name: status line after tools ran.
pub const PROGRESS: &str = "progress";
/// Node name: closes a turn ended by the step cap.
pub const WRAP_UP: &str = "wrap_up";

/// Services shared by every node of a graph.
///
/// Immutable and cheap to clone; concurrent runs share one instance.
#[derive(Debug, Clone)]
pub struct NodeContext {
    /// LLM call service.
    pub llm: LlmService,
    /// Tool registry.
    pub registry: Arc<ToolRegistry>,
    /// System prompts.
    pub prompts: Arc<PromptSet>,
    /// Limits and token budgets.
    pub config: Arc<AgentConfig>,
}

impl NodeContext {
    /// Options for a planning or tool-selection call.
    fn planning_options(&self, system_prompt: &str, model: &str) -> CallOptions {
        CallOptions::new(system_prompt)
            .model(model)
            .max_tokens(self.config.planning_max_tokens)
    }
}

/// Renumbers ids from 1 when any id repeats.
fn ensure_unique_ids<T>(items: &mut [T], id: impl Fn(&mut T) -> &mut i64) -> bool {
    let mut seen = std::collections::HashSet::new();
    let duplicated = items.iter_mut().any(|item| !seen.insert(*id(item)));
    if duplicated {
        for (n, item) in (1..).zip(items.iter_mut()) {
            *id(item) = n;
        }
    }
    duplicated
}
