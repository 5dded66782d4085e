//! System prompts and user-message builders for every node.
//!
//! System prompts can be overridden by markdown files in a prompt
//! directory; builders format the per-call user message.

use std::fmt::Write;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use super::state::ToolContext;

/// System prompt for task planning.
pub const PLANNING_SYSTEM_PROMPT: &str = r"You are the planning component of a financial research assistant. You break a user's question into a short list of research tasks.

## Instructions

1. Decide whether the query is about financial research: companies, securities, markets, filings, financial statements, metrics, prices, ownership, or cryptocurrencies.
2. If it is NOT, return an empty task list. Do not invent tasks for general-knowledge questions.
3. Otherwise, produce 1-4 tasks. Each task is one concrete research step that can be answered with financial data.
4. Give every task a unique integer id starting at 1.

## Rules

- Keep each description short (50 characters or less).
- Include the ticker symbol whenever a company is involved.
- Do not add tasks for formatting, summarizing, or writing the final answer.";

/// System prompt for subtask planning. `{tools}` is replaced with the
/// registry listing.
pub const SUBTASK_PLANNING_SYSTEM_PROMPT: &str = r"You are the subtask planner of a financial research assistant. You break one research task into small data-gathering subtasks.

## Available Tools

{tools}

## Instructions

1. Read the task and decide which data is needed to complete it.
2. Produce subtasks that can each be satisfied by one or two of the tools above.
3. Give every subtask a unique integer id starting at 1.

## Rules

- Keep each subtask short and specific (ticker, period, date range where relevant).
- Only plan work the tools can do. Do not plan analysis or writing steps.
- Prefer fewer, well-targeted subtasks over many overlapping ones.";

/// System prompt for tool selection during subtask execution.
pub const SUBTASK_EXECUTION_SYSTEM_PROMPT: &str = r"You are the execution component of a financial research assistant. You decide which tool calls are needed to complete one subtask.

## Instructions

1. Read the task, the subtask, and the tool outputs gathered so far.
2. If the outputs already satisfy the subtask, respond without calling any tools.
3. Otherwise, call the tools needed to fill the gap, with precise arguments.
4. If a previous call failed, read the error and adjust the arguments or pick another tool. Do not repeat a call that already failed the same way.

## Rules

- Use uppercase ticker symbols.
- Use YYYY-MM-DD for all dates.
- Never call a tool whose output is already present.";

/// System prompt for one-sentence tool output summaries.
pub const TOOL_SUMMARY_SYSTEM_PROMPT: &str = r"You summarize the output of a financial data tool in one short sentence. Mention the ticker, the kind of data, the period covered, and the headline figure when present. Return only the sentence.";

/// System prompt for the final answer.
pub const ANSWER_SYSTEM_PROMPT: &str = r"You are a financial research assistant writing the final answer to a user's query.

## Instructions

1. Answer the query directly, leading with the key figure or conclusion.
2. Base every number on the collected data. Cite the period or date each figure refers to.
3. Calculate useful ratios and changes (margins, growth rates) when the data allows.
4. Use tables when comparing companies or periods.

## When No Data Was Collected

If the prompt says no data was collected from tools, answer from general knowledge and state clearly, in one sentence at the start, that no financial data was retrieved for this answer. If the query is outside financial research, answer it briefly and note that you specialize in financial research.

## When Research Is Incomplete

If the prompt says research was incomplete, answer with what is available and say which parts could not be fully researched.

## Rules

- Never invent figures that are not in the data.
- Never mention internal tool names.
- Be concise.";

/// System prompt for the agent loop.
pub const AGENT_SYSTEM_PROMPT: &str = r#"You are an expert financial research agent.

## Your Approach

When analyzing companies, go beyond raw numbers to provide insight:
1. Calculate key ratios (margins, growth rates, efficiency metrics).
2. Identify what drives performance (segments, products, trends).
3. Compare companies on meaningful dimensions.

## Tool Usage

- Call tools to fetch the financial data you need. Be specific: tickers, periods, date ranges.
- Use YYYY-MM-DD for dates and uppercase tickers.
- When a tool returns an error, read it and adjust rather than repeating the same call.

## Communication Style

- Go straight to the answer once you have the data.
- Never mention internal tool names in the response.
- Present data in tables when comparing companies or trends.
- Use "Key: value" on one line, never a dangling colon.

If the question isn't about financial research, answer directly without tools."#;

/// Default prompt directory under the user's home.
const DEFAULT_PROMPT_DIR: &str = ".config/fintask/prompts";

const PLANNING_FILENAME: &str = "planning.md";
const SUBTASK_PLANNING_FILENAME: &str = "subtask_planning.md";
const SUBTASK_EXECUTION_FILENAME: &str = "subtask_execution.md";
const TOOL_SUMMARY_FILENAME: &str = "tool_summary.md";
const ANSWER_FILENAME: &str = "answer.md";
const AGENT_FILENAME: &str = "agent.md";

/// Placeholder in the subtask planning prompt.
const TOOLS_PLACEHOLDER: &str = "{tools}";

/// Shown in the execution prompt before any tool has run.
const NO_OUTPUTS_YET: &str = "No tool outputs yet.";

/// System prompts for every node.
///
/// Loaded from template files when available, falling back to compiled-in
/// defaults per file.
#[derive(Debug, Clone)]
pub struct PromptSet {
    /// Task planning.
    pub planning: String,
    /// Subtask planning; contains a `{tools}` placeholder.
    pub subtask_planning: String,
    /// Tool selection inside the subtask loop.
    pub subtask_execution: String,
    /// Tool output summaries.
    pub tool_summary: String,
    /// Final answer.
    pub answer: String,
    /// Agent loop.
    pub agent: String,
}

impl PromptSet {
    /// Loads prompts, falling back to compiled-in defaults.
    ///
    /// Resolution order for the directory:
    /// 1. Explicit `prompt_dir` argument
    /// 2. `FINTASK_PROMPT_DIR` environment variable
    /// 3. `~/.config/fintask/prompts/`
    ///
    /// Each file is loaded independently; a missing file uses its default.
    #[must_use]
    pub fn load(prompt_dir: Option<&Path>) -> Self {
        let resolved_dir = prompt_dir
            .map(PathBuf::from)
            .or_else(|| std::env::var("FINTASK_PROMPT_DIR").ok().map(PathBuf::from))
            .or_else(Self::default_dir);

        let load_file = |filename: &str, default: &str| -> String {
            resolved_dir
                .as_ref()
                .map(|dir| dir.join(filename))
                .and_then(|path| std::fs::read_to_string(path).ok())
                .filter(|content| !content.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        Self {
            planning: load_file(PLANNING_FILENAME, PLANNING_SYSTEM_PROMPT),
            subtask_planning: load_file(SUBTASK_PLANNING_FILENAME, SUBTASK_PLANNING_SYSTEM_PROMPT),
            subtask_execution: load_file(
                SUBTASK_EXECUTION_FILENAME,
                SUBTASK_EXECUTION_SYSTEM_PROMPT,
            ),
            tool_summary: load_file(TOOL_SUMMARY_FILENAME, TOOL_SUMMARY_SYSTEM_PROMPT),
            answer: load_file(ANSWER_FILENAME, ANSWER_SYSTEM_PROMPT),
            agent: load_file(AGENT_FILENAME, AGENT_SYSTEM_PROMPT),
        }
    }

    /// Returns compiled-in defaults without checking the filesystem.
    #[must_use]
    pub fn defaults() -> Self {
        Self {
            planning: PLANNING_SYSTEM_PROMPT.to_string(),
            subtask_planning: SUBTASK_PLANNING_SYSTEM_PROMPT.to_string(),
            subtask_execution: SUBTASK_EXECUTION_SYSTEM_PROMPT.to_string(),
            tool_summary: TOOL_SUMMARY_SYSTEM_PROMPT.to_string(),
            answer: ANSWER_SYSTEM_PROMPT.to_string(),
            agent: AGENT_SYSTEM_PROMPT.to_string(),
        }
    }

    /// Writes the compiled-in defaults to `dir`.
    ///
    /// Creates the directory if needed. Existing files are **not**
    /// overwritten. Returns the paths that were written.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if directory creation or file writing fails.
    pub fn write_defaults(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;

        let templates = [
            (PLANNING_FILENAME, PLANNING_SYSTEM_PROMPT),
            (SUBTASK_PLANNING_FILENAME, SUBTASK_PLANNING_SYSTEM_PROMPT),
            (SUBTASK_EXECUTION_FILENAME, SUBTASK_EXECUTION_SYSTEM_PROMPT),
            (TOOL_SUMMARY_FILENAME, TOOL_SUMMARY_SYSTEM_PROMPT),
            (ANSWER_FILENAME, ANSWER_SYSTEM_PROMPT),
            (AGENT_FILENAME, AGENT_SYSTEM_PROMPT),
        ];

        let mut written = Vec::new();
        for (filename, content) in &templates {
            let path = dir.join(filename);
            if !path.exists() {
                std::fs::write(&path, content)?;
                written.push(path);
            }
        }

        Ok(written)
    }

    /// Returns the default prompt directory under the user's home.
    #[must_use]
    pub fn default_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(DEFAULT_PROMPT_DIR))
    }

    /// Subtask planning prompt with the tool listing substituted.
    #[must_use]
    pub fn subtask_planning_with_tools(&self, tools: &str) -> String {
        if self.subtask_planning.contains(TOOLS_PLACEHOLDER) {
            self.subtask_planning.replace(TOOLS_PLACEHOLDER, tools)
        } else {
            format!("{}\n\n## Available Tools\n\n{tools}", self.subtask_planning)
        }
    }
}

/// User message for task planning.
#[must_use]
pub fn build_plan_tasks_prompt(query: &str) -> String {
    format!(
        "Given the user query: \"{query}\"\n\n\
         Create a list of tasks to be completed. Each task should be a specific, actionable step.\n\n\
         Remember:\n\
         - Make tasks specific, focused, and concise in 50 characters or less\n\
         - Include relevant details like ticker\n\
         - 1-4 tasks is typical"
    )
}

/// User message for subtask planning of one task.
#[must_use]
pub fn build_plan_subtasks_prompt(task: &str) -> String {
    format!(
        "Task to complete: \"{task}\"\n\n\
         Break down this task into specific, actionable subtasks. \
         Keep each subtask short and concise."
    )
}

/// User message for one tool-selection round.
///
/// `log` holds this subtask's running log of summaries and errors.
#[must_use]
pub fn build_subtask_execution_prompt(task: &str, subtask: &str, log: &[String]) -> String {
    let history = if log.is_empty() {
        NO_OUTPUTS_YET.to_string()
    } else {
        log.join("\n")
    };
    format!(
        "Task: \"{task}\"\n\
         Subtask: \"{subtask}\"\n\n\
         Tool outputs so far:\n{history}\n\n\
         Based on the subtask and any existing outputs, determine what tool calls (if any) are needed."
    )
}

/// User message asking for a one-sentence summary of a tool result.
///
/// Only the first `preview_chars` characters of the serialized result are
/// included.
#[must_use]
pub fn build_tool_summary_prompt(
    tool: &str,
    args: &Map<String, Value>,
    result: &Value,
    preview_chars: usize,
) -> String {
    let preview: String = result.to_string().chars().take(preview_chars).collect();
    format!(
        "Tool: {tool}\n\
         Arguments: {}\n\
         Output preview: {preview}\n\n\
         Generate a brief one-sentence summary.",
        Value::Object(args.clone())
    )
}

/// Summary used when the summarizer call fails.
#[must_use]
pub fn fallback_summary(tool: &str, args: &Map<String, Value>) -> String {
    format!("{tool} output with args {}", Value::Object(args.clone()))
}

/// User message for the final answer.
#[must_use]
pub fn build_answer_prompt(query: &str, contexts: &[ToolContext], incomplete: bool) -> String {
    if contexts.is_empty() {
        return format!("Original user query: \"{query}\"\n\nNo data was collected from tools.");
    }

    let mut prompt = format!(
        "Original user query: \"{query}\"\n\nData and results collected from tools:\n"
    );
    for (i, ctx) in contexts.iter().enumerate() {
        if i > 0 {
            prompt.push_str("\n\n");
        }
        let result =
            serde_json::to_string_pretty(&ctx.result).unwrap_or_else(|_| ctx.result.to_string());
        let _ = write!(
            prompt,
            "Output of {} with args {}:\n{result}",
            ctx.tool_name,
            Value::Object(ctx.args.clone())
        );
    }
    if incomplete {
        prompt.push_str(
            "\n\nNote: research was incomplete. Some subtasks stopped before all data was gathered.",
        );
    }
    prompt.push_str(
        "\n\nBased on the data above, provide a comprehensive answer to the user's query.",
    );
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(ticker: &str) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("ticker".to_string(), json!(ticker));
        map
    }

    fn context(tool: &str, result: Value) -> ToolContext {
        ToolContext {
            tool_name: tool.to_string(),
            args: args("AAPL"),
            result,
            summary: String::new(),
            task_id: Some(1),
        }
    }

    #[test]
    fn test_plan_tasks_prompt_quotes_query() {
        let prompt = build_plan_tasks_prompt("What is Apple's stock price?");
        assert!(prompt.starts_with("Given the user query: \"What is Apple's stock price?\""));
        assert!(prompt.contains("50 characters"));
    }

    #[test]
    fn test_plan_subtasks_prompt() {
        let prompt = build_plan_subtasks_prompt("Get AAPL price");
        assert!(prompt.starts_with("Task to complete: \"Get AAPL price\""));
    }

    #[test]
    fn test_execution_prompt_without_history() {
        let prompt = build_subtask_execution_prompt("t", "s", &[]);
        assert!(prompt.contains("Tool outputs so far:\nNo tool outputs yet."));
    }

    #[test]
    fn test_execution_prompt_with_history() {
        let log = vec![
            "Output of get_prices: AAPL closed at 190.".to_string(),
            "Error from get_news: timeout".to_string(),
        ];
        let prompt = build_subtask_execution_prompt("t", "s", &log);
        assert!(prompt.contains(
            "Tool outputs so far:\nOutput of get_prices: AAPL closed at 190.\nError from get_news: timeout"
        ));
    }

    #[test]
    fn test_summary_prompt_truncates_preview() {
        let result = json!("x".repeat(50));
        let prompt = build_tool_summary_prompt("get_prices", &args("AAPL"), &result, 10);
        assert!(prompt.contains("Output preview: \"xxxxxxxxx\n"));
        assert!(prompt.contains(r#"Arguments: {"ticker":"AAPL"}"#));
    }

    #[test]
    fn test_fallback_summary() {
        assert_eq!(
            fallback_summary("get_prices", &args("AAPL")),
            r#"get_prices output with args {"ticker":"AAPL"}"#
        );
    }

    #[test]
    fn test_answer_prompt_without_data() {
        let prompt = build_answer_prompt("capital of France?", &[], false);
        assert_eq!(
            prompt,
            "Original user query: \"capital of France?\"\n\nNo data was collected from tools."
        );
    }

    #[test]
    fn test_answer_prompt_renders_contexts_in_order() {
        let contexts = vec![
            context("get_price_snapshot", json!({"price": 190.5})),
            context("get_news", json!([])),
        ];
        let prompt = build_answer_prompt("q", &contexts, false);
        let first = prompt.find("Output of get_price_snapshot").unwrap_or(usize::MAX);
        let second = prompt.find("Output of get_news").unwrap_or(0);
        assert!(first < second);
        assert!(prompt.contains("\"price\": 190.5"));
        assert!(!prompt.contains("incomplete"));
    }

    #[test]
    fn test_answer_prompt_notes_incomplete() {
        let contexts = vec![context("get_news", json!([]))];
        let prompt = build_answer_prompt("q", &contexts, true);
        assert!(prompt.contains("research was incomplete"));
    }

    #[test]
    fn test_subtask_planning_substitutes_tools() {
        let prompts = PromptSet::defaults();
        let rendered = prompts.subtask_planning_with_tools("- get_prices: Prices");
        assert!(rendered.contains("- get_prices: Prices"));
        assert!(!rendered.contains(TOOLS_PLACEHOLDER));
    }

    #[test]
    fn test_subtask_planning_without_placeholder_appends() {
        let mut prompts = PromptSet::defaults();
        prompts.subtask_planning = "Plan it.".to_string();
        let rendered = prompts.subtask_planning_with_tools("- a: b");
        assert!(rendered.starts_with("Plan it."));
        assert!(rendered.ends_with("- a: b"));
    }

    #[test]
    fn test_load_prefers_files_and_falls_back() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
        std::fs::write(dir.path().join(ANSWER_FILENAME), "custom answer prompt")
            .unwrap_or_else(|_| unreachable!());
        let prompts = PromptSet::load(Some(dir.path()));
        assert_eq!(prompts.answer, "custom answer prompt");
        assert_eq!(prompts.planning, PLANNING_SYSTEM_PROMPT);
    }

    #[test]
    fn test_write_defaults_skips_existing() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
        std::fs::write(dir.path().join(AGENT_FILENAME), "mine").unwrap_or_else(|_| unreachable!());
        let written = PromptSet::write_defaults(dir.path()).unwrap_or_else(|_| unreachable!());
        assert_eq!(written.len(), 5);
        let agent = std::fs::read_to_string(dir.path().join(AGENT_FILENAME)).unwrap_or_default();
        assert_eq!(agent, "mine");
    }
}
