//! Tool registry.
//!
//! The registry is built once at startup from the closed set of
//! [`FinancialTool`]s and a [`FinancialDataSource`]. It is immutable and
//! shared by every run.

pub mod api;
pub mod finance;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

pub use api::FinancialDatasetsClient;
pub use finance::{FinancialTool, ValidatedArgs};

use crate::agent::tool::ToolDefinition;
use crate::error::ToolError;

/// A validated request for the financial data API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    /// Tool issuing the request, used in errors and logs.
    pub tool: &'static str,
    /// Endpoint path, e.g. `/prices/snapshot/`.
    pub path: &'static str,
    /// Query parameters in order; keys may repeat.
    pub query: Vec<(String, String)>,
}

/// Backend that serves financial data.
///
/// The production implementation is [`FinancialDatasetsClient`]; tests
/// substitute canned responses.
#[async_trait]
pub trait FinancialDataSource: Send + Sync {
    /// Executes `request` and returns the decoded JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::Api`] for non-success responses and
    /// [`ToolError::Http`] for transport failures.
    async fn fetch(&self, request: &ApiRequest) -> Result<Value, ToolError>;
}

/// Immutable name-to-tool lookup.
#[derive(Clone)]
pub struct ToolRegistry {
    tools: Vec<FinancialTool>,
    definitions: Vec<ToolDefinition>,
    source: Arc<dyn FinancialDataSource>,
}

impl ToolRegistry {
    /// Creates a registry with every [`FinancialTool`].
    pub fn new(source: Arc<dyn FinancialDataSource>) -> Self {
        Self::with_tools(source, &FinancialTool::ALL)
    }

    /// Creates a registry limited to `tools`. Duplicates are ignored.
    pub fn with_tools(source: Arc<dyn FinancialDataSource>, tools: &[FinancialTool]) -> Self {
        let mut unique: Vec<FinancialTool> = Vec::with_capacity(tools.len());
        for tool in tools {
            if !unique.contains(tool) {
                unique.push(*tool);
            }
        }
        let definitions = unique.iter().map(|t| t.definition()).collect();
        Self {
            tools: unique,
            definitions,
            source,
        }
    }

    /// Definitions to bind for tool calling.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.definitions.clone()
    }

    /// Looks up a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<FinancialTool> {
        self.tools.iter().copied().find(|t| t.name() == name)
    }

    /// Registered tools in order.
    #[must_use]
    pub fn tools(&self) -> &[FinancialTool] {
        &self.tools
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns `true` if no tools are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// One `- name: description` line per tool, for planning prompts.
    #[must_use]
    pub fn describe(&self) -> String {
        self.tools
            .iter()
            .map(|t| format!("- {}: {}", t.name(), t.description()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Resolves `name` and invokes the tool with `args`.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::UnknownTool`] for names not in the registry,
    /// otherwise whatever validation or the data source reports.
    pub async fn invoke(&self, name: &str, args: &Map<String, Value>) -> Result<Value, ToolError> {
        let tool = self.get(name).ok_or_else(|| ToolError::UnknownTool {
            name: name.to_string(),
        })?;
        let result = tool.invoke(self.source.as_ref(), args).await;
        debug!(tool = name, ok = result.is_ok(), "tool invoked");
        result
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.iter().map(|t| t.name()).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    /// Returns a fixed body and records requests.
    struct Canned {
        body: Value,
        requests: Mutex<Vec<ApiRequest>>,
    }

    #[async_trait]
    impl FinancialDataSource for Canned {
        async fn fetch(&self, request: &ApiRequest) -> Result<Value, ToolError> {
            self.requests
                .lock()
                .unwrap_or_else(|_| panic!("poisoned"))
                .push(request.clone());
            Ok(self.body.clone())
        }
    }

    fn canned(body: Value) -> Arc<Canned> {
        Arc::new(Canned {
            body,
            requests: Mutex::new(Vec::new()),
        })
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_registry_lists_all_tools() {
        let registry = ToolRegistry::new(canned(json!({})));
        assert_eq!(registry.len(), FinancialTool::ALL.len());
        assert_eq!(registry.definitions().len(), registry.len());
        assert!(registry.get("get_price_snapshot").is_some());
        assert!(registry.get("get_weather").is_none());
    }

    #[test]
    fn test_describe_format() {
        let registry = ToolRegistry::with_tools(
            canned(json!({})),
            &[FinancialTool::PriceSnapshot, FinancialTool::News, FinancialTool::News],
        );
        let lines: Vec<String> = registry.describe().lines().map(String::from).collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("- get_price_snapshot: "));
        assert!(lines[1].starts_with("- get_news: "));
    }

    #[tokio::test]
    async fn test_invoke_unwraps_payload_key() {
        let source = canned(json!({"snapshot": {"ticker": "AAPL", "price": 190.5}}));
        let registry = ToolRegistry::new(source.clone());
        let result = registry
            .invoke("get_price_snapshot", &args(json!({"ticker": "aapl"})))
            .await
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(result["price"], 190.5);

        let requests = source.requests.lock().map(|r| r.clone()).unwrap_or_default();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].path, "/prices/snapshot/");
        assert_eq!(requests[0].query, vec![("ticker".to_string(), "AAPL".to_string())]);
    }

    #[tokio::test]
    async fn test_invoke_returns_whole_body_without_key() {
        let source = canned(json!({"name": "Apple Inc."}));
        let registry = ToolRegistry::new(source);
        let result = registry
            .invoke("get_company_facts", &args(json!({"ticker": "AAPL"})))
            .await
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(result["name"], "Apple Inc.");
    }

    #[tokio::test]
    async fn test_invoke_sends_fixed_params_first() {
        let source = canned(json!({"items": []}));
        let registry = ToolRegistry::new(source.clone());
        registry
            .invoke(
                "get_10K_filing_items",
                &args(json!({"ticker": "MSFT", "year": 2023})),
            )
            .await
            .unwrap_or_else(|e| panic!("{e}"));
        let requests = source.requests.lock().map(|r| r.clone()).unwrap_or_default();
        assert_eq!(requests[0].query[0], ("filing_type".to_string(), "10-K".to_string()));
        assert!(requests[0].query.contains(&("year".to_string(), "2023".to_string())));
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let registry = ToolRegistry::new(canned(json!({})));
        let err = registry.invoke("get_weather", &Map::new()).await;
        match err {
            Err(e @ ToolError::UnknownTool { .. }) => {
                assert_eq!(e.to_string(), "Tool not found: get_weather");
            }
            other => panic!("expected UnknownTool, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_args_never_reach_source() {
        let source = canned(json!({}));
        let registry = ToolRegistry::new(source.clone());
        let err = registry
            .invoke("get_prices", &args(json!({"ticker": "AAPL"})))
            .await;
        assert!(matches!(err, Err(ToolError::InvalidArguments { .. })));
        assert!(source.requests.lock().map(|r| r.is_empty()).unwrap_or(false));
    }
}
