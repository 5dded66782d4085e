//! Error types for fintask.
//!
//! Errors are split by layer: [`AgentError`] for the orchestration core and
//! the LLM service, [`ToolError`] for tool validation and invocation, and
//! [`CommandError`] for the CLI. [`Error`] unifies them at the crate edge.

use thiserror::Error;

/// Result alias used by the CLI layer.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Orchestration or LLM failure.
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// Tool registry failure.
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// CLI command failure.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised by the orchestration core and the LLM call service.
///
/// Only [`AgentError::ApiRequest`] and its siblings that escape a node are
/// fatal to a run. Nodes catch the recoverable kinds locally.
#[derive(Debug, Error)]
pub enum AgentError {
    /// No API key configured for the LLM provider.
    #[error("API key missing: set OPENAI_API_KEY or FINTASK_API_KEY")]
    ApiKeyMissing,

    /// Configured provider name is not known.
    #[error("unsupported LLM provider: {name}")]
    UnsupportedProvider {
        /// Provider name from configuration.
        name: String,
    },

    /// Remote completion request failed (network, auth, rate limit).
    #[error("LLM API request failed: {message}")]
    ApiRequest {
        /// Provider error message.
        message: String,
        /// HTTP status, when known.
        status: Option<u16>,
    },

    /// Structured output did not match the requested schema.
    #[error("failed to decode model response: {message}")]
    ResponseParse {
        /// Decode error description.
        message: String,
        /// Raw model output.
        content: String,
    },

    /// Run-level failure outside a specific node.
    #[error("orchestration error: {message}")]
    Orchestration {
        /// Error description.
        message: String,
    },

    /// Graph definition is invalid.
    #[error("graph compilation failed: {message}")]
    GraphCompile {
        /// Error description.
        message: String,
    },

    /// Graph executed more steps than its limit allows.
    #[error("graph exceeded recursion limit of {limit} steps")]
    RecursionLimit {
        /// Configured step limit.
        limit: usize,
    },

    /// Checkpoint load or save failed.
    #[error("checkpoint error: {message}")]
    Checkpoint {
        /// Error description.
        message: String,
    },

    /// Tool failure that escaped local recovery.
    #[error(transparent)]
    Tool(#[from] ToolError),
}

/// Errors raised by tool validation and invocation.
///
/// Every variant is recoverable from the engine's point of view: the caller
/// logs it into the running context and continues.
#[derive(Debug, Error)]
pub enum ToolError {
    /// No tool is registered under this name.
    #[error("Tool not found: {name}")]
    UnknownTool {
        /// Requested tool name.
        name: String,
    },

    /// Arguments do not satisfy the tool's parameter schema.
    #[error("invalid arguments for {name}: {message}")]
    InvalidArguments {
        /// Tool name.
        name: String,
        /// Validation failure.
        message: String,
    },

    /// Financial data API returned a non-success status.
    #[error("{name} request failed with status {status}: {message}")]
    Api {
        /// Tool name.
        name: String,
        /// HTTP status code.
        status: u16,
        /// Response body or reason.
        message: String,
    },

    /// Transport-level HTTP failure.
    #[error("{name} transport error: {message}")]
    Http {
        /// Tool name.
        name: String,
        /// Error description.
        message: String,
    },

    /// The data source is missing required configuration.
    #[error("financial data source not configured: {message}")]
    NotConfigured {
        /// What is missing.
        message: String,
    },
}

/// Errors raised by CLI commands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// A command argument was invalid.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A command failed while executing.
    #[error("command failed: {0}")]
    ExecutionFailed(String),
}
