//! Scripted collaborators for integration tests.

#![allow(dead_code, clippy::panic)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use fintask::agent::message::{ChatRequest, ChatResponse, Role, TokenUsage};
use fintask::agent::provider::LlmProvider;
use fintask::agent::{AgentConfig, Orchestrator, ToolCall};
use fintask::error::{AgentError, ToolError};
use fintask::tools::{ApiRequest, FinancialDataSource, ToolRegistry};

type LlmHandler = dyn Fn(&ChatRequest) -> Result<ChatResponse, AgentError> + Send + Sync;
type DelayFn = dyn Fn(&ChatRequest) -> Option<Duration> + Send + Sync;

/// What a recorded request was for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    PlanTasks,
    PlanSubtasks,
    SelectTools,
    Summary,
    Answer,
    AgentStep,
}

/// Classifies a request by the shape of its user prompt.
pub fn kind(request: &ChatRequest) -> CallKind {
    let prompt = user_prompt(request);
    if prompt.starts_with("Given the user query") {
        CallKind::PlanTasks
    } else if prompt.starts_with("Task to complete:") {
        CallKind::PlanSubtasks
    } else if prompt.starts_with("Task: ") && !request.tools.is_empty() {
        CallKind::SelectTools
    } else if prompt.starts_with("Tool: ") {
        CallKind::Summary
    } else if prompt.starts_with("Original user query") {
        CallKind::Answer
    } else {
        CallKind::AgentStep
    }
}

/// Content of the last user message.
pub fn user_prompt(request: &ChatRequest) -> &str {
    request
        .messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map_or("", |m| m.content.as_str())
}

/// LLM provider answering through a closure and recording every request.
pub struct MockLlm {
    handler: Box<LlmHandler>,
    delay: Option<Box<DelayFn>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl MockLlm {
    pub fn new(
        handler: impl Fn(&ChatRequest) -> Result<ChatResponse, AgentError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            handler: Box::new(handler),
            delay: None,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn with_delay(
        handler: impl Fn(&ChatRequest) -> Result<ChatResponse, AgentError> + Send + Sync + 'static,
        delay: impl Fn(&ChatRequest) -> Option<Duration> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            handler: Box::new(handler),
            delay: Some(Box::new(delay)),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_else(|_| panic!("poisoned"))
    }

    pub fn requests_of(&self, wanted: CallKind) -> Vec<ChatRequest> {
        self.requests()
            .into_iter()
            .filter(|r| kind(r) == wanted)
            .collect()
    }
}

#[async_trait]
impl LlmProvider for MockLlm {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
        self.requests
            .lock()
            .unwrap_or_else(|_| panic!("poisoned"))
            .push(request.clone());
        if let Some(pause) = self.delay.as_ref().and_then(|d| d(request)) {
            tokio::time::sleep(pause).await;
        }
        (self.handler)(request)
    }
}

/// Plain text response.
pub fn text(content: &str) -> Result<ChatResponse, AgentError> {
    Ok(ChatResponse {
        content: content.to_string(),
        usage: TokenUsage::default(),
        tool_calls: Vec::new(),
        finish_reason: Some("stop".to_string()),
    })
}

/// Structured response serialized from `value`.
pub fn structured(value: &Value) -> Result<ChatResponse, AgentError> {
    text(&value.to_string())
}

static NEXT_CALL_ID: AtomicUsize = AtomicUsize::new(0);

/// Tool-calling response with one call per `(name, args)`. Ids are unique
/// across the test binary.
pub fn calls(list: &[(&str, Value)]) -> Result<ChatResponse, AgentError> {
    let tool_calls = list
        .iter()
        .map(|(name, args)| ToolCall {
            id: format!("call_{}", NEXT_CALL_ID.fetch_add(1, Ordering::Relaxed)),
            name: (*name).to_string(),
            arguments: args.to_string(),
        })
        .collect();
    Ok(ChatResponse {
        content: String::new(),
        usage: TokenUsage::default(),
        tool_calls,
        finish_reason: Some("tool_calls".to_string()),
    })
}

/// Provider failure.
pub fn api_failure() -> Result<ChatResponse, AgentError> {
    Err(AgentError::ApiRequest {
        message: "rate limited".to_string(),
        status: Some(429),
    })
}

/// One `{id, description}` task list.
pub fn tasks(descriptions: &[&str]) -> Value {
    let tasks: Vec<Value> = (1..)
        .zip(descriptions)
        .map(|(id, d)| json!({"id": id, "description": d}))
        .collect();
    json!({"tasks": tasks})
}

/// One `{id, description}` subtask list.
pub fn subtasks(descriptions: &[&str]) -> Value {
    let items: Vec<Value> = (1..)
        .zip(descriptions)
        .map(|(id, d)| json!({"id": id, "description": d}))
        .collect();
    json!({"subTasks": items})
}

type DataHandler = dyn Fn(&ApiRequest) -> Result<Value, ToolError> + Send + Sync;

/// Financial data source answering through a closure.
pub struct MockData {
    handler: Box<DataHandler>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl MockData {
    pub fn new(
        handler: impl Fn(&ApiRequest) -> Result<Value, ToolError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Source returning the same body for every request.
    pub fn fixed(body: Value) -> Arc<Self> {
        Self::new(move |_| Ok(body.clone()))
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_else(|_| panic!("poisoned"))
    }
}

#[async_trait]
impl FinancialDataSource for MockData {
    async fn fetch(&self, request: &ApiRequest) -> Result<Value, ToolError> {
        self.requests
            .lock()
            .unwrap_or_else(|_| panic!("poisoned"))
            .push(request.clone());
        (self.handler)(request)
    }
}

/// Test configuration: explicit values only, no environment lookup.
pub fn config() -> fintask::agent::config::AgentConfigBuilder {
    AgentConfig::builder().api_key("test-key").model("test-model")
}

pub fn orchestrator(
    llm: &Arc<MockLlm>,
    data: &Arc<MockData>,
    config: fintask::agent::config::AgentConfigBuilder,
) -> Orchestrator {
    let config = config.build().unwrap_or_else(|e| panic!("config: {e}"));
    let registry = ToolRegistry::new(Arc::clone(data) as Arc<dyn FinancialDataSource>);
    Orchestrator::new(Arc::clone(llm) as Arc<dyn LlmProvider>, registry, config)
        .unwrap_or_else(|e| panic!("orchestrator: {e}"))
}
