//! HTTP client for the Financial Datasets API.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use super::{ApiRequest, FinancialDataSource};
use crate::agent::config::AgentConfig;
use crate::error::ToolError;

/// Header carrying the API key.
const API_KEY_HEADER: &str = "X-API-KEY";

/// Maximum characters of an error body kept in [`ToolError::Api`].
const MAX_ERROR_BODY: usize = 500;

/// Financial Datasets REST client.
#[derive(Clone)]
pub struct FinancialDatasetsClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl FinancialDatasetsClient {
    /// Creates a client from agent configuration.
    ///
    /// A missing API key is not an error here; requests fail with
    /// [`ToolError::NotConfigured`] instead, so the model sees the failure.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::NotConfigured`] if the HTTP client cannot be built.
    pub fn new(config: &AgentConfig) -> Result<Self, ToolError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(8)
            .build()
            .map_err(|e| ToolError::NotConfigured {
                message: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            base_url: config.financial_api_base_url.trim_end_matches('/').to_string(),
            api_key: config
                .financial_api_key
                .clone()
                .filter(|k| !k.trim().is_empty()),
        })
    }

    /// Base URL requests are sent to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

#[async_trait]
impl FinancialDataSource for FinancialDatasetsClient {
    async fn fetch(&self, request: &ApiRequest) -> Result<Value, ToolError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| ToolError::NotConfigured {
            message: "FINANCIAL_DATASETS_API_KEY is not set".to_string(),
        })?;

        debug!(tool = request.tool, path = request.path, "financial API request");

        let response = self
            .client
            .get(self.url(request.path))
            .query(&request.query)
            .header(API_KEY_HEADER, api_key)
            .send()
            .await
            .map_err(|e| ToolError::Http {
                name: request.tool.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("request failed").to_string()
            } else {
                body.chars().take(MAX_ERROR_BODY).collect()
            };
            return Err(ToolError::Api {
                name: request.tool.to_string(),
                status: status.as_u16(),
                message,
            });
        }

        response.json::<Value>().await.map_err(|e| ToolError::Http {
            name: request.tool.to_string(),
            message: format!("invalid JSON response: {e}"),
        })
    }
}

impl std::fmt::Debug for FinancialDatasetsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinancialDatasetsClient")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .finish_non_exhaustive()
    }
}
