use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use super::{NodeContext, PLAN_SUBTASKS, ensure_unique_ids};
use crate::agent::graph::Node;
use crate::agent::prompt::build_plan_subtasks_prompt;
use crate::agent::state::{PlannedTask, RunState, StateUpdate, SubTask, SubTaskList};
use crate::error::AgentError;

/// Plans subtasks for every task concurrently.
///
/// Tasks are independent. A task whose planning call fails keeps an empty
/// subtask list instead of failing the run. Output order matches task order
/// regardless of completion order.
#[derive(Debug, Clone)]
pub struct PlanSubtasks {
    ctx: NodeContext,
}

impl PlanSubtasks {
    /// Creates the node.
    pub const fn new(ctx: NodeContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Node<RunState> for PlanSubtasks {
    fn name(&self) -> &'static str {
        PLAN_SUBTASKS
    }

    async fn run(&self, state: &RunState) -> Result<StateUpdate, AgentError> {
        let semaphore = Arc::new(Semaphore::new(self.ctx.config.max_concurrency.max(1)));
        let system_prompt = self
            .ctx
            .prompts
            .subtask_planning_with_tools(&self.ctx.registry.describe());

        let mut handles = Vec::with_capacity(state.tasks.len());
        for task in &state.tasks {
            let sem = Arc::clone(&semaphore);
            let llm = self.ctx.llm.clone();
            let opts = self.ctx.planning_options(&system_prompt, &state.model);
            let prompt = build_plan_subtasks_prompt(&task.description);

            let handle = tokio::spawn(async move {
                let _permit = sem.acquire().await.map_err(|e| AgentError::Orchestration {
                    message: format!("Semaphore acquire failed: {e}"),
                })?;
                llm.complete_structured::<SubTaskList>(&prompt, &opts).await
            });
            handles.push(handle);
        }

        let mut planned = Vec::with_capacity(handles.len());
        for (task, handle) in state.tasks.iter().zip(handles) {
            let outcome = match handle.await {
                Ok(result) => result,
                Err(e) => Err(AgentError::Orchestration {
                    message: format!("Task join failed: {e}"),
                }),
            };
            let sub_tasks = match outcome {
                Ok(list) => tidy_subtasks(task.id, list.sub_tasks),
                Err(e) => {
                    warn!(task_id = task.id, error = %e, "subtask planning failed");
                    Vec::new()
                }
            };
            debug!(task_id = task.id, subtasks = sub_tasks.len(), "planned subtasks");
            planned.push(PlannedTask {
                task: task.clone(),
                sub_tasks,
            });
        }

        Ok(StateUpdate {
            planned_tasks: Some(planned),
            ..StateUpdate::default()
        })
    }
}

fn tidy_subtasks(task_id: i64, sub_tasks: Vec<SubTask>) -> Vec<SubTask> {
    let mut sub_tasks: Vec<_> = sub_tasks
        .into_iter()
        .filter(|s| !s.description.trim().is_empty())
        .collect();
    if ensure_unique_ids(&mut sub_tasks, |s| &mut s.id) {
        warn!(task_id, "planner returned duplicate subtask ids; renumbered");
    }
    sub_tasks
}
