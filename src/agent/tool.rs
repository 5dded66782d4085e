//! Tool type definitions for function-calling.
//!
//! Provider-agnostic types for tool definitions, calls, and results. The
//! concrete tools live in [`crate::tools`]; these types are what crosses
//! the boundary to and from the model.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ToolError;

/// A tool definition that can be sent to an LLM for function-calling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name (must match a registry entry).
    pub name: String,
    /// Human-readable description of what the tool does.
    pub description: String,
    /// JSON Schema object describing the tool's parameters.
    pub parameters: Value,
}

/// A tool call requested by the LLM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this call (assigned by the provider).
    pub id: String,
    /// Name of the tool to invoke.
    pub name: String,
    /// JSON-encoded arguments for the tool.
    pub arguments: String,
}

impl ToolCall {
    /// Decodes the raw argument string into a JSON object.
    ///
    /// An empty string is treated as `{}`; anything that is not a JSON
    /// object is rejected.
    pub fn parse_arguments(&self) -> Result<Map<String, Value>, ToolError> {
        if self.arguments.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(&self.arguments) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(ToolError::InvalidArguments {
                name: self.name.clone(),
                message: format!("expected a JSON object, got {other}"),
            }),
            Err(e) => Err(ToolError::InvalidArguments {
                name: self.name.clone(),
                message: format!("malformed JSON: {e}"),
            }),
        }
    }
}

/// The result of executing a tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// ID of the tool call this result corresponds to.
    pub tool_call_id: String,
    /// Result content (JSON string on success, error message on failure).
    pub content: String,
    /// Whether this result represents an error.
    pub is_error: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(arguments: &str) -> ToolCall {
        ToolCall {
            id: "call_1".to_string(),
            name: "get_prices".to_string(),
            arguments: arguments.to_string(),
        }
    }

    #[test]
    fn test_parse_arguments_object() {
        let args = call(r#"{"ticker":"AAPL"}"#).parse_arguments();
        assert_eq!(
            args.ok().and_then(|m| m.get("ticker").cloned()),
            Some(Value::String("AAPL".to_string()))
        );
    }

    #[test]
    fn test_parse_arguments_empty_is_empty_object() {
        let args = call("  ").parse_arguments();
        assert!(args.is_ok_and(|m| m.is_empty()));
    }

    #[test]
    fn test_parse_arguments_rejects_non_object() {
        let err = call("[1,2]").parse_arguments();
        assert!(matches!(err, Err(ToolError::InvalidArguments { .. })));
    }

    #[test]
    fn test_parse_arguments_rejects_malformed() {
        let err = call("{ticker:").parse_arguments();
        assert!(matches!(err, Err(ToolError::InvalidArguments { .. })));
    }

    #[test]
    fn test_tool_call_serialization() {
        let json = serde_json::to_string(&call("{}")).unwrap_or_default();
        assert!(json.contains("call_1"));
        assert!(json.contains("get_prices"));
    }
}
