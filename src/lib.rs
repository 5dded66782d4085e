//! fintask: financial research through task decomposition and tool
//! orchestration.
//!
//! A query is planned into tasks, each task into subtasks, and every subtask
//! runs a bounded tool-calling loop against financial data tools before an
//! answer is synthesized from the collected evidence. An alternative agent
//! loop topology runs on the same engine with a per-run step cap.
//!
//! ```no_run
//! use std::sync::Arc;
//! use fintask::agent::{AgentConfig, Orchestrator, RunRequest};
//! use fintask::agent::client::create_provider;
//! use fintask::tools::{FinancialDatasetsClient, ToolRegistry};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AgentConfig::from_env()?;
//! let provider = create_provider(&config)?;
//! let registry = ToolRegistry::new(Arc::new(FinancialDatasetsClient::new(&config)?));
//! let orchestrator = Orchestrator::new(provider, registry, config)?;
//! let outcome = orchestrator.run(RunRequest::new("What is Apple's stock price?")).await?;
//! println!("{}", outcome.answer);
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod cli;
pub mod error;
pub mod tools;

pub use error::{AgentError, CommandError, Error, Result, ToolError};
