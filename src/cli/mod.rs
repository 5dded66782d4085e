//! CLI layer for fintask.
//!
//! Provides the command-line interface using clap, with commands for
//! answering queries, listing tools and managing prompt templates.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::execute;
pub use output::OutputFormat;
pub use parser::{Cli, Commands};
