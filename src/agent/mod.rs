//! Task-decomposition and tool-orchestration core.
//!
//! A generic graph engine runs one of two topologies over a shared
//! [`RunState`]. Both use a pluggable provider abstraction backed by
//! OpenAI-compatible APIs.
//!
//! # Architecture
//!
//! ```text
//! Pipeline:
//!   query → PlanTasks ──(no tasks)──────────────────────┐
//!              └→ PlanSubtasks (concurrent per task)     │
//!                   └→ ExecuteSubtasks (bounded tool loop)│
//!                        └→ GenerateAnswer ←─────────────┘
//!
//! Agent loop (checkpointed per thread):
//!   AgentStep ─(tool calls, under cap)→ Announce → ToolExec → Progress ─┐
//!       ↑ └─(done or cap)→ END                                          │
//!       └───────────────────────────────────────────────────────────────┘
//! ```

pub mod checkpoint;
pub mod client;
pub mod config;
pub mod graph;
pub mod llm;
pub mod message;
pub mod nodes;
pub mod orchestrator;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod state;
pub mod tool;

// Re-export key types
pub use checkpoint::{Checkpoint, Checkpointer, MemoryCheckpointer};
pub use config::AgentConfig;
pub use graph::{CompiledGraph, END, GraphEvent, GraphState, Node, RunConfig, START, StateGraph};
pub use llm::{CallOptions, LlmService, StructuredOutput, ToolTurn};
pub use message::{ChatMessage, ChatRequest, ChatResponse, Role, TokenUsage};
pub use orchestrator::{ChatOutcome, Orchestrator, RunOutcome, RunRequest};
pub use prompt::PromptSet;
pub use provider::LlmProvider;
pub use state::{PlannedTask, RunState, StateUpdate, SubTask, SubtaskRef, Task, ToolContext};
pub use tool::{ToolCall, ToolDefinition, ToolResult};
