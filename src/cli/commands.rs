//! CLI command implementations.
//!
//! Contains the business logic for each CLI command.

#![allow(clippy::format_push_string)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::agent::client::create_provider;
use crate::agent::config::AgentConfig;
use crate::agent::orchestrator::{Orchestrator, RunRequest};
use crate::agent::prompt::PromptSet;
use crate::cli::output::{OutputFormat, format_chat_outcome, format_run_outcome};
use crate::cli::parser::{Cli, Commands};
use crate::error::{CommandError, Result};
use crate::tools::{FinancialDatasetsClient, FinancialTool, ToolRegistry};

/// Orchestration topology selected with `--mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Pipeline,
    React,
}

impl Mode {
    fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pipeline" => Ok(Self::Pipeline),
            "react" | "agent" => Ok(Self::React),
            other => Err(CommandError::InvalidArgument(format!(
                "unknown mode '{other}' (expected pipeline or react)"
            ))
            .into()),
        }
    }
}

/// Parameters of the `query` command.
struct QueryCommandParams<'a> {
    query: &'a str,
    model: Option<&'a str>,
    mode: Mode,
    thread_id: &'a str,
    prompt_dir: Option<&'a Path>,
    max_iterations: Option<usize>,
    verbose: bool,
}

/// Executes the parsed command and returns its output.
///
/// # Errors
///
/// Returns an error if the command fails to execute.
pub fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);

    match &cli.command {
        Commands::Query {
            query,
            model,
            mode,
            thread_id,
            prompt_dir,
            max_iterations,
        } => {
            let params = QueryCommandParams {
                query,
                model: model.as_deref(),
                mode: Mode::parse(mode)?,
                thread_id,
                prompt_dir: prompt_dir.as_deref(),
                max_iterations: *max_iterations,
                verbose: cli.verbose,
            };
            cmd_query(&params, format)
        }
        Commands::Tools => Ok(cmd_tools(format)),
        Commands::InitPrompts { dir } => cmd_init_prompts(dir.as_deref(), format),
    }
}

fn cmd_query(params: &QueryCommandParams<'_>, format: OutputFormat) -> Result<String> {
    let mut builder = AgentConfig::builder().from_env();
    if let Some(dir) = params.prompt_dir {
        builder = builder.prompt_dir(dir);
    }
    if let Some(n) = params.max_iterations {
        builder = match params.mode {
            Mode::Pipeline => builder.max_subtask_iterations(n),
            Mode::React => builder.max_agent_iterations(n),
        };
    }
    let config = builder.build().map_err(|e| {
        CommandError::ExecutionFailed(format!("Agent configuration error: {e}"))
    })?;

    let provider = create_provider(&config).map_err(|e| {
        CommandError::ExecutionFailed(format!("Provider creation failed: {e}"))
    })?;
    let client = FinancialDatasetsClient::new(&config).map_err(|e| {
        CommandError::ExecutionFailed(format!("Financial data client creation failed: {e}"))
    })?;
    let registry = ToolRegistry::new(Arc::new(client));
    let orchestrator = Orchestrator::new(provider, registry, config)?;

    let mut request = RunRequest::new(params.query);
    if let Some(model) = params.model {
        request = request.with_model(model);
    }

    // Create tokio runtime as sync/async bridge
    let rt = tokio::runtime::Runtime::new().map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to create async runtime: {e}"))
    })?;

    match params.mode {
        Mode::Pipeline => {
            let outcome = rt
                .block_on(orchestrator.run(request))
                .map_err(|e| CommandError::ExecutionFailed(format!("Query failed: {e}")))?;
            Ok(match format {
                OutputFormat::Text => format_run_outcome(&outcome),
                OutputFormat::Json => format.to_json(&outcome),
            })
        }
        Mode::React => {
            let outcome = rt
                .block_on(orchestrator.chat(params.thread_id, request))
                .map_err(|e| CommandError::ExecutionFailed(format!("Query failed: {e}")))?;
            Ok(match format {
                OutputFormat::Text => format_chat_outcome(&outcome, params.verbose),
                OutputFormat::Json => format.to_json(&outcome),
            })
        }
    }
}

fn cmd_tools(format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            let width = FinancialTool::ALL
                .iter()
                .map(|t| t.name().len())
                .max()
                .unwrap_or(0);
            let mut output = format!("{} tools available:\n\n", FinancialTool::ALL.len());
            for tool in FinancialTool::ALL {
                output.push_str(&format!(
                    "  {:<width$}  {}\n",
                    tool.name(),
                    first_sentence(tool.description())
                ));
            }
            output
        }
        OutputFormat::Json => {
            let definitions: Vec<_> = FinancialTool::ALL.iter().map(|t| t.definition()).collect();
            format.to_json(&definitions)
        }
    }
}

fn first_sentence(text: &str) -> &str {
    text.find(". ").map_or(text, |i| &text[..=i])
}

fn cmd_init_prompts(dir: Option<&Path>, format: OutputFormat) -> Result<String> {
    let target_dir = dir
        .map(PathBuf::from)
        .or_else(PromptSet::default_dir)
        .ok_or_else(|| {
            CommandError::ExecutionFailed(
                "Could not determine home directory for default prompt path".to_string(),
            )
        })?;

    let written = PromptSet::write_defaults(&target_dir).map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to write prompt templates: {e}"))
    })?;

    match format {
        OutputFormat::Text => {
            if written.is_empty() {
                Ok(format!(
                    "All prompt templates already exist in: {}\n",
                    target_dir.display()
                ))
            } else {
                let mut output = format!(
                    "Wrote {} prompt template(s) to: {}\n",
                    written.len(),
                    target_dir.display()
                );
                for path in &written {
                    output.push_str(&format!(
                        "  {}\n",
                        path.file_name()
                            .and_then(|n| n.to_str())
                            .unwrap_or("unknown")
                    ));
                }
                output.push_str("\nEdit these files to customize the system prompts.\n");
                Ok(output)
            }
        }
        OutputFormat::Json => {
            let json = serde_json::json!({
                "directory": target_dir.to_string_lossy(),
                "written": written.iter().map(|p| p.to_string_lossy().into_owned()).collect::<Vec<_>>(),
                "count": written.len()
            });
            Ok(format.to_json(&json))
        }
    }
}
