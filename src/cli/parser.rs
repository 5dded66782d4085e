//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// fintask: financial research assistant.
///
/// Plans a query into research tasks, gathers data with financial tools and
/// writes an answer from the evidence.
#[derive(Parser, Debug)]
#[command(name = "fintask")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output (debug logging on stderr).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Answer a financial research query.
    ///
    /// Requires an OpenAI-compatible API key and, for data tools, a
    /// Financial Datasets API key.
    #[command(after_help = r#"Examples:
  fintask query "What is Apple's stock price?"
  fintask query "Compare MSFT and GOOGL revenue growth" --model gpt-4o-mini
  fintask query "Latest NVDA news" --mode react --thread-id research-1
  fintask --format json query "AAPL debt to equity" | jq '.tool_contexts'
  OPENAI_API_KEY=sk-... FINANCIAL_DATASETS_API_KEY=... fintask query "TSLA margins"
"#)]
    Query {
        /// The query to answer.
        query: String,

        /// Model for every LLM call of the run.
        #[arg(short, long)]
        model: Option<String>,

        /// Topology: pipeline or react.
        #[arg(long, default_value = "pipeline")]
        mode: String,

        /// Conversation thread for react mode.
        #[arg(short, long, default_value = "default")]
        thread_id: String,

        /// Directory with prompt template overrides.
        #[arg(long, env = "FINTASK_PROMPT_DIR")]
        prompt_dir: Option<PathBuf>,

        /// Iteration cap: per subtask in pipeline mode, per turn in react mode.
        #[arg(long)]
        max_iterations: Option<usize>,
    },

    /// List the available financial data tools.
    Tools,

    /// Write default prompt templates to a directory.
    ///
    /// Existing files are left untouched.
    #[command(name = "init-prompts")]
    InitPrompts {
        /// Target directory. Defaults to ~/.config/fintask/prompts.
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },
}
