use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::{EXECUTE_SUBTASKS, NodeContext};
use crate::agent::graph::Node;
use crate::agent::llm::CallOptions;
use crate::agent::prompt::{
    build_subtask_execution_prompt, build_tool_summary_prompt, fallback_summary,
};
use crate::agent::state::{RunState, StateUpdate, SubTask, SubtaskRef, Task, ToolContext};
use crate::agent::tool::ToolCall;
use crate::error::AgentError;

/// Runs the bounded tool loop for every subtask, in plan order.
///
/// Each subtask keeps its own running log of summaries and errors; nothing
/// leaks between subtasks. Tool and summarizer failures are written to that
/// log and never abort the run.
#[derive(Debug, Clone)]
pub struct ExecuteSubtasks {
    ctx: NodeContext,
}

/// Evidence and cap status from one subtask.
struct SubtaskOutcome {
    contexts: Vec<ToolContext>,
    exhausted: bool,
}

impl ExecuteSubtasks {
    /// Creates the node.
    pub const fn new(ctx: NodeContext) -> Self {
        Self { ctx }
    }

    async fn run_subtask(
        &self,
        task: &Task,
        subtask: &SubTask,
        model: &str,
    ) -> Result<SubtaskOutcome, AgentError> {
        let opts = self
            .ctx
            .planning_options(&self.ctx.prompts.subtask_execution, model);
        let max_iterations = self.ctx.config.max_subtask_iterations;
        let mut log: Vec<String> = Vec::new();
        let mut contexts = Vec::new();

        for iteration in 0..max_iterations {
            let prompt = build_subtask_execution_prompt(&task.description, &subtask.description, &log);
            let turn = self
                .ctx
                .llm
                .complete_with_tools(&prompt, &opts, self.ctx.registry.definitions())
                .await?;

            if turn.tool_calls.is_empty() {
                debug!(task_id = task.id, subtask_id = subtask.id, iteration, "subtask satisfied");
                return Ok(SubtaskOutcome {
                    contexts,
                    exhausted: false,
                });
            }

            for call in &turn.tool_calls {
                match self.invoke_call(call, model).await {
                    Ok((args, result, summary)) => {
                        log.push(format!("Output of {}: {summary}", call.name));
                        contexts.push(ToolContext {
                            tool_name: call.name.clone(),
                            args,
                            result,
                            summary,
                            task_id: Some(task.id),
                        });
                    }
                    Err(line) => {
                        warn!(task_id = task.id, subtask_id = subtask.id, "{line}");
                        log.push(line);
                    }
                }
            }
        }

        info!(
            task_id = task.id,
            subtask_id = subtask.id,
            max_iterations,
            "subtask stopped at iteration cap"
        );
        Ok(SubtaskOutcome {
            contexts,
            exhausted: true,
        })
    }

    /// Resolves, validates and runs one call. The error side is the log line.
    async fn invoke_call(
        &self,
        call: &ToolCall,
        model: &str,
    ) -> Result<(Map<String, Value>, Value, String), String> {
        if self.ctx.registry.get(&call.name).is_none() {
            return Err(format!("Error: Tool not found: {}", call.name));
        }
        let args = call
            .parse_arguments()
            .map_err(|e| format!("Error from {}: {e}", call.name))?;
        let result = self
            .ctx
            .registry
            .invoke(&call.name, &args)
            .await
            .map_err(|e| format!("Error from {}: {e}", call.name))?;
        let summary = self.summarize(&call.name, &args, &result, model).await;
        Ok((args, result, summary))
    }

    async fn summarize(
        &self,
        tool: &str,
        args: &Map<String, Value>,
        result: &Value,
        model: &str,
    ) -> String {
        let prompt =
            build_tool_summary_prompt(tool, args, result, self.ctx.config.summary_preview_chars);
        let opts = CallOptions::new(self.ctx.prompts.tool_summary.as_str()).model(model);
        match self.ctx.llm.complete_text(&prompt, &opts).await {
            Ok(summary) if !summary.trim().is_empty() => summary.trim().to_string(),
            Ok(_) => fallback_summary(tool, args),
            Err(e) => {
                warn!(tool, error = %e, "tool summary failed");
                fallback_summary(tool, args)
            }
        }
    }
}

#[async_trait]
impl Node<RunState> for ExecuteSubtasks {
    fn name(&self) -> &'static str {
        EXECUTE_SUBTASKS
    }

    async fn run(&self, state: &RunState) -> Result<StateUpdate, AgentError> {
        let mut update = StateUpdate::default();

        for planned in &state.planned_tasks {
            for subtask in &planned.sub_tasks {
                let outcome = self.run_subtask(&planned.task, subtask, &state.model).await?;
                update.tool_contexts.extend(outcome.contexts);
                if outcome.exhausted {
                    update.exhausted_subtasks.push(SubtaskRef {
                        task_id: planned.task.id,
                        subtask_id: subtask.id,
                    });
                }
            }
        }

        info!(
            tool_contexts = update.tool_contexts.len(),
            exhausted = update.exhausted_subtasks.len(),
            "subtasks executed"
        );
        Ok(update)
    }
}
