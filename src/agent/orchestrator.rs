//! Run invocation surface.
//!
//! The [`Orchestrator`] owns two compiled graphs built from the same engine:
//! the research pipeline ([`Orchestrator::run`]) and the checkpointed agent
//! loop ([`Orchestrator::chat`]). Both are immutable after construction, so
//! one orchestrator serves any number of concurrent runs.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio_stream::wrappers::ReceiverStream;
use tracing::info;

use super::checkpoint::MemoryCheckpointer;
use super::config::AgentConfig;
use super::graph::{CompiledGraph, END, GraphEvent, RunConfig, START, StateGraph};
use super::llm::LlmService;
use super::message::{ChatMessage, Role, tool_message, user_message};
use super::nodes::{
    AGENT_STEP, ANNOUNCE, AgentStep, Announce, EXECUTE_SUBTASKS, ExecuteSubtasks,
    GENERATE_ANSWER, GenerateAnswer, NodeContext, PLAN_SUBTASKS, PLAN_TASKS, PROGRESS,
    PlanSubtasks, PlanTasks, Progress, SKIPPED_CALL, TOOL_EXEC, ToolExec, WRAP_UP, WrapUp,
    route_after_agent_step, route_after_planning,
};
use super::prompt::PromptSet;
use super::provider::LlmProvider;
use super::state::{PlannedTask, RunState, Task, ToolContext};
use crate::error::AgentError;
use crate::tools::ToolRegistry;

/// Longest accepted query, in bytes.
pub const MAX_QUERY_LEN: usize = 10_000;

/// Nodes per agent-loop iteration.
const NODES_PER_AGENT_ITERATION: usize = 4;

/// Input of one run.
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    /// User query.
    pub query: String,
    /// Model override; the configured model when `None` or blank.
    pub model: Option<String>,
}

impl RunRequest {
    /// Creates a request using the configured model.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            model: None,
        }
    }

    /// Sets the model override.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// Result of a pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    /// Final answer. Never empty.
    pub answer: String,
    /// Planned tasks.
    pub tasks: Vec<Task>,
    /// Tasks with their subtasks.
    pub planned_tasks: Vec<PlannedTask>,
    /// Evidence in invocation order.
    pub tool_contexts: Vec<ToolContext>,
    /// `true` if any subtask stopped at its iteration cap.
    pub research_incomplete: bool,
    /// Wall-clock duration in milliseconds.
    pub elapsed_ms: u64,
}

/// Result of one agent-loop turn.
#[derive(Debug, Clone, Serialize)]
pub struct ChatOutcome {
    /// Final answer of this turn. Never empty.
    pub answer: String,
    /// Full transcript of the thread, including status lines.
    pub messages: Vec<ChatMessage>,
    /// Agent steps taken in this turn.
    pub iterations: usize,
    /// `true` if the step cap ended the turn while tools were still requested.
    pub capped: bool,
}

/// Entry point for both topologies.
pub struct Orchestrator {
    pipeline: CompiledGraph<RunState>,
    agent: CompiledGraph<RunState>,
    registry: Arc<ToolRegistry>,
    config: Arc<AgentConfig>,
}

impl Orchestrator {
    /// Builds both graphs.
    ///
    /// Loads prompt templates from [`AgentConfig::prompt_dir`], falling back
    /// to compiled-in defaults.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::GraphCompile`] if a graph fails validation.
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        registry: ToolRegistry,
        config: AgentConfig,
    ) -> Result<Self, AgentError> {
        let prompts = PromptSet::load(config.prompt_dir.as_deref());
        let ctx = NodeContext {
            llm: LlmService::new(provider, config.model.clone()),
            registry: Arc::new(registry),
            prompts: Arc::new(prompts),
            config: Arc::new(config),
        };

        Ok(Self {
            pipeline: build_pipeline(&ctx)?,
            agent: build_agent_loop(&ctx, Arc::new(MemoryCheckpointer::new()))?,
            registry: Arc::clone(&ctx.registry),
            config: Arc::clone(&ctx.config),
        })
    }

    /// Tool registry shared by every run.
    #[must_use]
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Runs the research pipeline for one query.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Orchestration`] for empty or over-long queries,
    /// and propagates LLM failures from planning or answer generation.
    pub async fn run(&self, request: RunRequest) -> Result<RunOutcome, AgentError> {
        validate_query(&request.query)?;
        let start = Instant::now();
        let state = RunState::new(request.query, Some(self.model_for(request.model.as_deref())));
        let run_config = RunConfig::default().with_recursion_limit(self.config.recursion_limit);

        let state = self.pipeline.invoke(state, &run_config).await?;
        info!(
            tasks = state.tasks.len(),
            tool_contexts = state.tool_contexts.len(),
            incomplete = state.research_incomplete(),
            "pipeline run complete"
        );

        Ok(RunOutcome {
            research_incomplete: state.research_incomplete(),
            answer: state.answer,
            tasks: state.tasks,
            planned_tasks: state.planned_tasks,
            tool_contexts: state.tool_contexts,
            elapsed_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        })
    }

    /// Runs one agent-loop turn on `thread_id`.
    ///
    /// The thread's transcript is resumed from its checkpoint, the query is
    /// appended as a user message and the step counter starts from zero.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Orchestration`] for empty or over-long queries,
    /// [`AgentError::Checkpoint`] for a blank thread id, and propagates LLM
    /// failures.
    pub async fn chat(&self, thread_id: &str, request: RunRequest) -> Result<ChatOutcome, AgentError> {
        let (state, run_config) = self.prepare_chat(thread_id, request).await?;
        let state = self.agent.invoke(state, &run_config).await?;
        Ok(self.finish_chat(thread_id, state))
    }

    /// Like [`Orchestrator::chat`], yielding the state after every node.
    ///
    /// Checkpoints are written as the stream advances. A capped turn ends
    /// with a [`WRAP_UP`] event carrying the final answer.
    ///
    /// # Errors
    ///
    /// Fails before streaming on the same input errors as
    /// [`Orchestrator::chat`].
    pub async fn chat_stream(
        &self,
        thread_id: &str,
        request: RunRequest,
    ) -> Result<ReceiverStream<Result<GraphEvent<RunState>, AgentError>>, AgentError> {
        let (state, run_config) = self.prepare_chat(thread_id, request).await?;
        Ok(self.agent.stream(state, run_config))
    }

    /// Latest transcript of `thread_id`; empty for unknown threads.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Checkpoint`] on backend failure.
    pub async fn transcript(&self, thread_id: &str) -> Result<Vec<ChatMessage>, AgentError> {
        Ok(self
            .agent
            .checkpoint(thread_id)
            .await?
            .map(|s| s.messages)
            .unwrap_or_default())
    }

    fn model_for<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        requested
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(&self.config.model)
    }

    async fn prepare_chat(
        &self,
        thread_id: &str,
        request: RunRequest,
    ) -> Result<(RunState, RunConfig), AgentError> {
        validate_query(&request.query)?;
        if thread_id.trim().is_empty() {
            return Err(AgentError::Checkpoint {
                message: "thread id must not be empty".to_string(),
            });
        }

        let model = self.model_for(request.model.as_deref()).to_string();
        let mut state = match self.agent.checkpoint(thread_id).await? {
            Some(mut previous) => {
                previous.query.clone_from(&request.query);
                previous.model = model;
                previous
            }
            None => RunState::new(request.query.clone(), Some(&model)),
        };
        close_pending_calls(&mut state.messages);
        state.messages.push(user_message(&request.query));
        state.iterations = 0;
        state.answer.clear();

        let limit = self
            .config
            .recursion_limit
            .max(self.config.max_agent_iterations * NODES_PER_AGENT_ITERATION + 1);
        Ok((state, RunConfig::for_thread(thread_id).with_recursion_limit(limit)))
    }

    fn finish_chat(&self, thread_id: &str, state: RunState) -> ChatOutcome {
        // A capped turn keeps its tool calls as the last model turn.
        let capped = last_model_turn(&state.messages).is_some_and(ChatMessage::has_tool_calls);
        info!(
            thread_id,
            iterations = state.iterations,
            max = self.config.max_agent_iterations,
            capped,
            "agent turn complete"
        );

        ChatOutcome {
            answer: state.answer,
            messages: state.messages,
            iterations: state.iterations,
            capped,
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("pipeline", &self.pipeline)
            .field("agent", &self.agent)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

fn build_pipeline(ctx: &NodeContext) -> Result<CompiledGraph<RunState>, AgentError> {
    let mut graph: StateGraph<RunState> = StateGraph::new();
    graph
        .add_node(Arc::new(PlanTasks::new(ctx.clone())))
        .add_node(Arc::new(PlanSubtasks::new(ctx.clone())))
        .add_node(Arc::new(ExecuteSubtasks::new(ctx.clone())))
        .add_node(Arc::new(GenerateAnswer::new(ctx.clone())))
        .add_edge(START, PLAN_TASKS)
        .add_conditional_edges(
            PLAN_TASKS,
            Arc::new(route_after_planning),
            &[PLAN_SUBTASKS, GENERATE_ANSWER],
        )
        .add_edge(PLAN_SUBTASKS, EXECUTE_SUBTASKS)
        .add_edge(EXECUTE_SUBTASKS, GENERATE_ANSWER)
        .add_edge(GENERATE_ANSWER, END);
    graph.compile()
}

fn build_agent_loop(
    ctx: &NodeContext,
    checkpoints: Arc<MemoryCheckpointer<RunState>>,
) -> Result<CompiledGraph<RunState>, AgentError> {
    let mut graph: StateGraph<RunState> = StateGraph::new();
    graph
        .add_node(Arc::new(AgentStep::new(ctx.clone())))
        .add_node(Arc::new(Announce))
        .add_node(Arc::new(ToolExec::new(ctx.clone())))
        .add_node(Arc::new(Progress))
        .add_node(Arc::new(WrapUp))
        .add_edge(START, AGENT_STEP)
        .add_conditional_edges(
            AGENT_STEP,
            route_after_agent_step(ctx.config.max_agent_iterations),
            &[ANNOUNCE, WRAP_UP, END],
        )
        .add_edge(ANNOUNCE, TOOL_EXEC)
        .add_edge(TOOL_EXEC, PROGRESS)
        .add_edge(PROGRESS, AGENT_STEP)
        .add_edge(WRAP_UP, END);
    graph.compile_with_checkpointer(checkpoints)
}

fn validate_query(query: &str) -> Result<(), AgentError> {
    if query.trim().is_empty() {
        return Err(AgentError::Orchestration {
            message: "Query cannot be empty".to_string(),
        });
    }
    if query.len() > MAX_QUERY_LEN {
        return Err(AgentError::Orchestration {
            message: format!(
                "Query exceeds maximum length ({} bytes, max {MAX_QUERY_LEN})",
                query.len()
            ),
        });
    }
    Ok(())
}

fn is_model_turn(message: &ChatMessage) -> bool {
    message.role == Role::Assistant && !message.synthetic
}

fn last_model_turn(messages: &[ChatMessage]) -> Option<&ChatMessage> {
    messages.iter().rev().find(|m| is_model_turn(m))
}

/// Answers tool calls of the last model turn that have no result yet.
///
/// Only a turn cancelled mid-flight leaves such calls in a checkpoint.
fn close_pending_calls(messages: &mut Vec<ChatMessage>) {
    let Some(at) = messages.iter().rposition(is_model_turn) else {
        return;
    };
    let answered: Vec<&str> = messages[at + 1..]
        .iter()
        .filter(|m| m.role == Role::Tool)
        .filter_map(|m| m.tool_call_id.as_deref())
        .collect();
    let unanswered: Vec<String> = messages[at]
        .tool_calls
        .iter()
        .filter(|call| !answered.contains(&call.id.as_str()))
        .map(|call| call.id.clone())
        .collect();
    for id in unanswered {
        messages.push(tool_message(&id, SKIPPED_CALL));
    }
}
