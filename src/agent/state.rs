//! Run state threaded through every node of one query execution.
//!
//! Each field has its own merge policy, applied in [`RunState::apply`]:
//! plans and the answer are replaced, evidence and transcript accumulate.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::config::DEFAULT_MODEL;
use super::graph::GraphState;
use super::llm::StructuredOutput;
use super::message::ChatMessage;

/// Stored when the model returns a blank answer.
pub const FALLBACK_ANSWER: &str =
    "I was unable to produce an answer for this query. Please try rephrasing it.";

/// A high-level research task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Task {
    /// Identifier, unique within a run.
    pub id: i64,
    /// What the task should accomplish.
    pub description: String,
    /// Completion flag; absent in model output means `false`.
    #[serde(default)]
    pub done: bool,
}

/// A concrete unit of work inside a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SubTask {
    /// Identifier, unique within its task.
    pub id: i64,
    /// What the subtask should fetch or compute.
    pub description: String,
}

/// A task together with its planned subtasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedTask {
    /// The task being broken down.
    pub task: Task,
    /// Subtasks in execution order. Empty when planning failed.
    pub sub_tasks: Vec<SubTask>,
}

/// Evidence recorded from one successful tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolContext {
    /// Tool that produced the result.
    pub tool_name: String,
    /// Arguments the model supplied.
    pub args: Map<String, Value>,
    /// Raw tool output.
    pub result: Value,
    /// One-sentence summary of the output.
    pub summary: String,
    /// Task this evidence was gathered for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<i64>,
}

/// Identifies a subtask whose tool loop hit its iteration cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtaskRef {
    /// Owning task.
    pub task_id: i64,
    /// Subtask within the task.
    pub subtask_id: i64,
}

/// Structured response for task planning.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct TaskList {
    /// The list of tasks.
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl StructuredOutput for TaskList {
    const NAME: &'static str = "TaskList";
}

/// Structured response for subtask planning.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct SubTaskList {
    /// Subtasks that complete the task, in execution order.
    #[serde(default, rename = "subTasks", alias = "sub_tasks")]
    pub sub_tasks: Vec<SubTask>,
}

impl StructuredOutput for SubTaskList {
    const NAME: &'static str = "SubTaskList";
}

/// State of one run.
///
/// Created fresh per invocation with only `query` seeded. Nodes read it and
/// return a [`StateUpdate`]; they never mutate it directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    /// User query. Set once at creation.
    pub query: String,
    /// Model used for every LLM call in this run.
    pub model: String,
    /// Conversation transcript (agent loop only).
    pub messages: Vec<ChatMessage>,
    /// Current task plan.
    pub tasks: Vec<Task>,
    /// Tasks with their subtasks.
    pub planned_tasks: Vec<PlannedTask>,
    /// Evidence in invocation order.
    pub tool_contexts: Vec<ToolContext>,
    /// Final answer; empty until the answer node runs.
    pub answer: String,
    /// Agent steps taken in the current invocation.
    pub iterations: usize,
    /// Subtasks whose tool loop stopped at the cap.
    pub exhausted_subtasks: Vec<SubtaskRef>,
}

impl Default for RunState {
    fn default() -> Self {
        Self {
            query: String::new(),
            model: DEFAULT_MODEL.to_string(),
            messages: Vec::new(),
            tasks: Vec::new(),
            planned_tasks: Vec::new(),
            tool_contexts: Vec::new(),
            answer: String::new(),
            iterations: 0,
            exhausted_subtasks: Vec::new(),
        }
    }
}

impl RunState {
    /// Creates a fresh state for `query`, using `model` when non-blank.
    #[must_use]
    pub fn new(query: impl Into<String>, model: Option<&str>) -> Self {
        let mut state = Self {
            query: query.into(),
            ..Self::default()
        };
        state.apply(StateUpdate {
            model: model.map(str::to_string),
            ..StateUpdate::default()
        });
        state
    }

    /// Returns `true` if any subtask stopped at its iteration cap.
    #[must_use]
    pub fn research_incomplete(&self) -> bool {
        !self.exhausted_subtasks.is_empty()
    }
}

/// Partial state returned by a node.
///
/// `Option` fields replace when `Some`; `Vec` fields append.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    /// Replacement model. Blank falls back to the default.
    pub model: Option<String>,
    /// Messages to append.
    pub messages: Vec<ChatMessage>,
    /// Replacement task plan.
    pub tasks: Option<Vec<Task>>,
    /// Replacement planned tasks.
    pub planned_tasks: Option<Vec<PlannedTask>>,
    /// Evidence to append.
    pub tool_contexts: Vec<ToolContext>,
    /// Replacement answer. Blank is stored as [`FALLBACK_ANSWER`].
    pub answer: Option<String>,
    /// Replacement iteration counter.
    pub iterations: Option<usize>,
    /// Exhausted subtasks to append.
    pub exhausted_subtasks: Vec<SubtaskRef>,
}

impl GraphState for RunState {
    type Update = StateUpdate;

    fn apply(&mut self, update: StateUpdate) {
        if let Some(model) = update.model {
            self.model = if model.trim().is_empty() {
                DEFAULT_MODEL.to_string()
            } else {
                model
            };
        }
        self.messages.extend(update.messages);
        if let Some(tasks) = update.tasks {
            self.tasks = tasks;
        }
        if let Some(planned) = update.planned_tasks {
            self.planned_tasks = planned;
        }
        self.tool_contexts.extend(update.tool_contexts);
        if let Some(answer) = update.answer {
            self.answer = if answer.trim().is_empty() {
                FALLBACK_ANSWER.to_string()
            } else {
                answer
            };
        }
        if let Some(iterations) = update.iterations {
            self.iterations = iterations;
        }
        self.exhausted_subtasks.extend(update.exhausted_subtasks);
    }
}
