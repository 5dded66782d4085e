//! Agent configuration with builder pattern and environment variable support.
//!
//! Configuration is resolved in order: explicit values → environment variables → defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::AgentError;

/// Model used when neither the caller nor the environment names one.
pub const DEFAULT_MODEL: &str = "gpt-4o";
/// Default base URL of the financial data API.
pub const DEFAULT_FINANCIAL_API_BASE_URL: &str = "https://api.financialdatasets.ai";

/// Default cap on tool-selection rounds per subtask.
const DEFAULT_MAX_SUBTASK_ITERATIONS: usize = 5;
/// Default cap on agent steps per ReAct invocation.
const DEFAULT_MAX_AGENT_ITERATIONS: usize = 10;
/// Default concurrent subtask-planning requests.
const DEFAULT_MAX_CONCURRENCY: usize = 8;
/// Default graph step limit.
const DEFAULT_RECURSION_LIMIT: usize = 100;
/// Default characters of tool output shown to the summarizer.
const DEFAULT_SUMMARY_PREVIEW_CHARS: usize = 1000;
/// Default HTTP timeout in seconds for outbound calls.
const DEFAULT_TIMEOUT_SECS: u64 = 60;
/// Default answer max tokens.
const DEFAULT_ANSWER_MAX_TOKENS: u32 = 4096;
/// Default max tokens for planning and tool-selection calls.
const DEFAULT_PLANNING_MAX_TOKENS: u32 = 2048;

/// Configuration for the research agent.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// LLM provider name (e.g., "openai").
    pub provider: String,
    /// API key for the provider.
    pub api_key: String,
    /// Optional base URL override (for proxies or compatible APIs).
    pub base_url: Option<String>,
    /// Model used when a run does not specify one.
    pub model: String,
    /// Maximum tool-selection rounds per subtask.
    pub max_subtask_iterations: usize,
    /// Maximum agent steps per ReAct invocation.
    pub max_agent_iterations: usize,
    /// Maximum concurrent subtask-planning requests.
    pub max_concurrency: usize,
    /// Maximum node executions per graph invocation.
    pub recursion_limit: usize,
    /// Characters of raw tool output included in the summary prompt.
    pub summary_preview_chars: usize,
    /// Maximum tokens for the final answer.
    pub answer_max_tokens: u32,
    /// Maximum tokens for planning and tool-selection calls.
    pub planning_max_tokens: u32,
    /// HTTP timeout applied to the LLM and financial data clients.
    pub timeout: Duration,
    /// Directory containing prompt template files.
    ///
    /// When set, system prompts are loaded from markdown files in this
    /// directory, falling back to compiled-in defaults for missing files.
    pub prompt_dir: Option<PathBuf>,
    /// API key for the financial data service.
    pub financial_api_key: Option<String>,
    /// Base URL of the financial data service.
    pub financial_api_base_url: String,
}

impl AgentConfig {
    /// Creates a new builder for `AgentConfig`.
    #[must_use]
    pub fn builder() -> AgentConfigBuilder {
        AgentConfigBuilder::default()
    }

    /// Creates configuration from environment variables with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiKeyMissing`] if no API key is found.
    pub fn from_env() -> Result<Self, AgentError> {
        Self::builder().from_env().build()
    }
}

/// Builder for [`AgentConfig`].
#[derive(Debug, Clone, Default)]
pub struct AgentConfigBuilder {
    provider: Option<String>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    max_subtask_iterations: Option<usize>,
    max_agent_iterations: Option<usize>,
    max_concurrency: Option<usize>,
    recursion_limit: Option<usize>,
    summary_preview_chars: Option<usize>,
    answer_max_tokens: Option<u32>,
    planning_max_tokens: Option<u32>,
    timeout: Option<Duration>,
    prompt_dir: Option<PathBuf>,
    financial_api_key: Option<String>,
    financial_api_base_url: Option<String>,
}

impl AgentConfigBuilder {
    /// Populates unset fields from environment variables.
    #[must_use]
    pub fn from_env(mut self) -> Self {
        if self.provider.is_none() {
            self.provider = std::env::var("FINTASK_PROVIDER").ok();
        }
        if self.api_key.is_none() {
            self.api_key = std::env::var("OPENAI_API_KEY")
                .or_else(|_| std::env::var("FINTASK_API_KEY"))
                .ok();
        }
        if self.base_url.is_none() {
            self.base_url = std::env::var("OPENAI_BASE_URL")
                .or_else(|_| std::env::var("FINTASK_BASE_URL"))
                .ok();
        }
        if self.model.is_none() {
            self.model = std::env::var("FINTASK_MODEL").ok();
        }
        if self.max_subtask_iterations.is_none() {
            self.max_subtask_iterations = std::env::var("FINTASK_MAX_SUBTASK_ITERATIONS")
                .ok()
                .and_then(|v| v.parse().ok());
        }
        if self.max_agent_iterations.is_none() {
            self.max_agent_iterations = std::env::var("FINTASK_MAX_AGENT_ITERATIONS")
                .ok()
                .and_then(|v| v.parse().ok());
        }
        if self.max_concurrency.is_none() {
            self.max_concurrency = std::env::var("FINTASK_MAX_CONCURRENCY")
                .ok()
                .and_then(|v| v.parse().ok());
        }
        if self.prompt_dir.is_none() {
            self.prompt_dir = std::env::var("FINTASK_PROMPT_DIR").ok().map(PathBuf::from);
        }
        if self.financial_api_key.is_none() {
            self.financial_api_key = std::env::var("FINANCIAL_DATASETS_API_KEY").ok();
        }
        if self.financial_api_base_url.is_none() {
            self.financial_api_base_url = std::env::var("FINANCIAL_DATASETS_BASE_URL").ok();
        }
        self
    }

    /// Sets the LLM provider name.
    #[must_use]
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Sets the API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the base URL override.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the default model.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the per-subtask tool-selection cap.
    #[must_use]
    pub const fn max_subtask_iterations(mut self, n: usize) -> Self {
        self.max_subtask_iterations = Some(n);
        self
    }

    /// Sets the ReAct agent-step cap.
    #[must_use]
    pub const fn max_agent_iterations(mut self, n: usize) -> Self {
        self.max_agent_iterations = Some(n);
        self
    }

    /// Sets the maximum concurrency for subtask planning.
    #[must_use]
    pub const fn max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = Some(n);
        self
    }

    /// Sets the graph step limit.
    #[must_use]
    pub const fn recursion_limit(mut self, n: usize) -> Self {
        self.recursion_limit = Some(n);
        self
    }

    /// Sets how many characters of tool output the summarizer sees.
    #[must_use]
    pub const fn summary_preview_chars(mut self, n: usize) -> Self {
        self.summary_preview_chars = Some(n);
        self
    }

    /// Sets the answer max tokens.
    #[must_use]
    pub const fn answer_max_tokens(mut self, n: u32) -> Self {
        self.answer_max_tokens = Some(n);
        self
    }

    /// Sets the token budget for planning and tool-selection calls.
    #[must_use]
    pub const fn planning_max_tokens(mut self, n: u32) -> Self {
        self.planning_max_tokens = Some(n);
        self
    }

    /// Sets the HTTP timeout.
    #[must_use]
    pub const fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Sets the prompt template directory.
    #[must_use]
    pub fn prompt_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.prompt_dir = Some(dir.into());
        self
    }

    /// Sets the financial data API key.
    #[must_use]
    pub fn financial_api_key(mut self, key: impl Into<String>) -> Self {
        self.financial_api_key = Some(key.into());
        self
    }

    /// Sets the financial data API base URL.
    #[must_use]
    pub fn financial_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.financial_api_base_url = Some(url.into());
        self
    }

    /// Builds the [`AgentConfig`].
    ///
    /// Caps of zero are raised to one so every loop makes at least one call.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiKeyMissing`] if no API key was set.
    pub fn build(self) -> Result<AgentConfig, AgentError> {
        let api_key = self.api_key.ok_or(AgentError::ApiKeyMissing)?;

        Ok(AgentConfig {
            provider: self.provider.unwrap_or_else(|| "openai".to_string()),
            api_key,
            base_url: self.base_url,
            model: self
                .model
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_subtask_iterations: self
                .max_subtask_iterations
                .unwrap_or(DEFAULT_MAX_SUBTASK_ITERATIONS)
                .max(1),
            max_agent_iterations: self
                .max_agent_iterations
                .unwrap_or(DEFAULT_MAX_AGENT_ITERATIONS)
                .max(1),
            max_concurrency: self
                .max_concurrency
                .unwrap_or(DEFAULT_MAX_CONCURRENCY)
                .max(1),
            recursion_limit: self.recursion_limit.unwrap_or(DEFAULT_RECURSION_LIMIT),
            summary_preview_chars: self
                .summary_preview_chars
                .unwrap_or(DEFAULT_SUMMARY_PREVIEW_CHARS),
            answer_max_tokens: self.answer_max_tokens.unwrap_or(DEFAULT_ANSWER_MAX_TOKENS),
            planning_max_tokens: self
                .planning_max_tokens
                .unwrap_or(DEFAULT_PLANNING_MAX_TOKENS),
            timeout: self
                .timeout
                .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            prompt_dir: self.prompt_dir,
            financial_api_key: self.financial_api_key,
            financial_api_base_url: self
                .financial_api_base_url
                .unwrap_or_else(|| DEFAULT_FINANCIAL_API_BASE_URL.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = AgentConfig::builder()
            .api_key("test-key")
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.provider, "openai");
        assert_eq!(config.api_key, "test-key");
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.max_subtask_iterations, 5);
        assert_eq!(config.max_agent_iterations, 10);
        assert_eq!(config.summary_preview_chars, 1000);
        assert_eq!(config.financial_api_base_url, DEFAULT_FINANCIAL_API_BASE_URL);
    }

    #[test]
    fn test_builder_missing_api_key() {
        let result = AgentConfig::builder().build();
        assert!(matches!(result, Err(AgentError::ApiKeyMissing)));
    }

    #[test]
    fn test_builder_custom_values() {
        let config = AgentConfig::builder()
            .api_key("key")
            .provider("custom")
            .model("gpt-4o-mini")
            .max_subtask_iterations(3)
            .max_agent_iterations(4)
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.provider, "custom");
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.max_subtask_iterations, 3);
        assert_eq!(config.max_agent_iterations, 4);
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_blank_model_falls_back_to_default() {
        let config = AgentConfig::builder()
            .api_key("key")
            .model("   ")
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_zero_caps_are_raised() {
        let config = AgentConfig::builder()
            .api_key("key")
            .max_subtask_iterations(0)
            .max_agent_iterations(0)
            .max_concurrency(0)
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.max_subtask_iterations, 1);
        assert_eq!(config.max_agent_iterations, 1);
        assert_eq!(config.max_concurrency, 1);
    }
}
