//! Pluggable LLM provider trait.
//!
//! A provider is the transport half of the LLM call service: it turns a
//! [`ChatRequest`] into one remote completion. Prompt shaping, schema
//! decoding and tool binding happen above it in [`super::llm::LlmService`],
//! so tests can swap in a scripted provider without touching node code.

use async_trait::async_trait;

use super::message::{ChatRequest, ChatResponse};
use crate::error::AgentError;

/// Trait for LLM provider backends.
///
/// Implementations must be shareable across concurrently running queries;
/// they hold configuration only, never per-run state.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name (e.g., `"openai"`).
    fn name(&self) -> &'static str;

    /// Executes one chat completion request.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiRequest`] on network, auth or rate-limit
    /// failures. The caller does not retry.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError>;
}
