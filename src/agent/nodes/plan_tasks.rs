use async_trait::async_trait;
use tracing::{info, warn};

use super::{GENERATE_ANSWER, NodeContext, PLAN_SUBTASKS, PLAN_TASKS, ensure_unique_ids};
use crate::agent::graph::Node;
use crate::agent::prompt::build_plan_tasks_prompt;
use crate::agent::state::{RunState, StateUpdate, TaskList};
use crate::error::AgentError;

/// Decomposes the query into research tasks.
#[derive(Debug, Clone)]
pub struct PlanTasks {
    ctx: NodeContext,
}

impl PlanTasks {
    /// Creates the node.
    pub const fn new(ctx: NodeContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Node<RunState> for PlanTasks {
    fn name(&self) -> &'static str {
        PLAN_TASKS
    }

    async fn run(&self, state: &RunState) -> Result<StateUpdate, AgentError> {
        let opts = self
            .ctx
            .planning_options(&self.ctx.prompts.planning, &state.model);
        let plan: TaskList = self
            .ctx
            .llm
            .complete_structured(&build_plan_tasks_prompt(&state.query), &opts)
            .await?;

        let mut tasks: Vec<_> = plan
            .tasks
            .into_iter()
            .filter(|t| !t.description.trim().is_empty())
            .collect();
        if ensure_unique_ids(&mut tasks, |t| &mut t.id) {
            warn!("planner returned duplicate task ids; renumbered");
        }
        info!(tasks = tasks.len(), "planned tasks");

        Ok(StateUpdate {
            tasks: Some(tasks),
            ..StateUpdate::default()
        })
    }
}

/// Skips subtask work entirely when the plan is empty.
pub fn route_after_planning(state: &RunState) -> &'static str {
    if state.tasks.is_empty() {
        GENERATE_ANSWER
    } else {
        PLAN_SUBTASKS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::state::Task;

    #[test]
    fn test_route_empty_plan_goes_to_answer() {
        let state = RunState::new("hello", None);
        assert_eq!(route_after_planning(&state), GENERATE_ANSWER);
    }

    #[test]
    fn test_route_with_tasks_goes_to_subtasks() {
        let mut state = RunState::new("AAPL price", None);
        state.tasks.push(Task {
            id: 1,
            description: "Get AAPL price".to_string(),
            done: false,
        });
        assert_eq!(route_after_planning(&state), PLAN_SUBTASKS);
    }
}
