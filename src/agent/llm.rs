//! LLM call service.
//!
//! Wraps an [`LlmProvider`] and exposes the three response modes the nodes
//! need: free text, schema-constrained structured output and tool calling.
//! Providers stay dumb transports; prompt assembly and decoding live here.

use std::sync::Arc;

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use super::message::{ChatMessage, ChatRequest, system_message, user_message};
use super::provider::LlmProvider;
use super::tool::{ToolCall, ToolDefinition};
use crate::error::AgentError;

/// A type the model can be asked to produce as JSON.
///
/// The schema is derived from the type and embedded in the system prompt;
/// decoding goes through serde.
pub trait StructuredOutput: DeserializeOwned + JsonSchema + Send {
    /// Short name used in log fields and error messages.
    const NAME: &'static str;

    /// JSON Schema describing the expected response object.
    fn schema() -> Value {
        serde_json::to_value(schemars::schema_for!(Self)).unwrap_or_default()
    }
}

/// Per-call options.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// System prompt for this call.
    pub system_prompt: String,
    /// Model override; the service default is used when `None` or blank.
    pub model: Option<String>,
    /// Maximum tokens to generate.
    pub max_tokens: Option<u32>,
}

impl CallOptions {
    /// Creates options with the given system prompt.
    #[must_use]
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            ..Self::default()
        }
    }

    /// Sets the model for this call.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the max tokens for this call.
    #[must_use]
    pub const fn max_tokens(mut self, n: u32) -> Self {
        self.max_tokens = Some(n);
        self
    }
}

/// One model turn in tool-calling mode.
#[derive(Debug, Clone, Default)]
pub struct ToolTurn {
    /// Assistant text accompanying the calls (often empty).
    pub content: String,
    /// Requested tool calls, in the order the model emitted them.
    pub tool_calls: Vec<ToolCall>,
}

/// Shared LLM call service.
///
/// Cheap to clone; holds only the provider handle and the default model.
#[derive(Clone)]
pub struct LlmService {
    provider: Arc<dyn LlmProvider>,
    default_model: String,
}

impl LlmService {
    /// Creates a service over `provider` using `default_model` when a call
    /// names none.
    pub fn new(provider: Arc<dyn LlmProvider>, default_model: impl Into<String>) -> Self {
        Self {
            provider,
            default_model: default_model.into(),
        }
    }

    /// Free-text completion.
    ///
    /// # Errors
    ///
    /// Propagates provider failures.
    pub async fn complete_text(&self, prompt: &str, opts: &CallOptions) -> Result<String, AgentError> {
        let request = self.request(
            vec![system_message(&opts.system_prompt), user_message(prompt)],
            opts,
            false,
            Vec::new(),
        );
        debug!(mode = "text", model = %request.model, "llm call");
        let response = self.provider.chat(&request).await?;
        Ok(response.content)
    }

    /// Schema-constrained completion decoded into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ResponseParse`] when the response is not valid
    /// JSON for `T`; propagates provider failures.
    pub async fn complete_structured<T: StructuredOutput>(
        &self,
        prompt: &str,
        opts: &CallOptions,
    ) -> Result<T, AgentError> {
        let schema = serde_json::to_string_pretty(&T::schema()).unwrap_or_default();
        let system = format!(
            "{}\n\nRespond with a single JSON object matching this schema:\n{schema}",
            opts.system_prompt
        );
        let request = self.request(
            vec![system_message(&system), user_message(prompt)],
            opts,
            true,
            Vec::new(),
        );
        debug!(mode = "structured", schema = T::NAME, model = %request.model, "llm call");
        let response = self.provider.chat(&request).await?;
        parse_structured(&response.content)
    }

    /// Tool-calling completion with `tools` bound.
    ///
    /// # Errors
    ///
    /// Propagates provider failures.
    pub async fn complete_with_tools(
        &self,
        prompt: &str,
        opts: &CallOptions,
        tools: Vec<ToolDefinition>,
    ) -> Result<ToolTurn, AgentError> {
        self.converse(
            vec![system_message(&opts.system_prompt), user_message(prompt)],
            opts,
            tools,
        )
        .await
    }

    /// Tool-calling completion over an existing conversation.
    ///
    /// Used by the agent loop, where the transcript is the prompt.
    ///
    /// # Errors
    ///
    /// Propagates provider failures.
    pub async fn converse(
        &self,
        messages: Vec<ChatMessage>,
        opts: &CallOptions,
        tools: Vec<ToolDefinition>,
    ) -> Result<ToolTurn, AgentError> {
        let request = self.request(messages, opts, false, tools);
        debug!(
            mode = "tools",
            model = %request.model,
            tools = request.tools.len(),
            "llm call"
        );
        let response = self.provider.chat(&request).await?;
        Ok(ToolTurn {
            content: response.content,
            tool_calls: response.tool_calls,
        })
    }

    fn request(
        &self,
        messages: Vec<ChatMessage>,
        opts: &CallOptions,
        json_mode: bool,
        tools: Vec<ToolDefinition>,
    ) -> ChatRequest {
        let model = opts
            .model
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(&self.default_model)
            .to_string();
        ChatRequest {
            model,
            messages,
            temperature: None,
            max_tokens: opts.max_tokens,
            json_mode,
            tools,
        }
    }
}

impl std::fmt::Debug for LlmService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmService")
            .field("provider", &self.provider.name())
            .field("default_model", &self.default_model)
            .finish()
    }
}

/// Decodes a structured response, tolerating a markdown code fence.
///
/// # Errors
///
/// Returns [`AgentError::ResponseParse`] with the raw content on mismatch.
pub fn parse_structured<T: StructuredOutput>(content: &str) -> Result<T, AgentError> {
    let body = strip_code_fence(content);
    serde_json::from_str(body).map_err(|e| AgentError::ResponseParse {
        message: format!("{} did not match schema: {e}", T::NAME),
        content: content.to_string(),
    })
}

/// Strips a surrounding ```` ```json ```` fence if present.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
