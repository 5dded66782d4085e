//! Research pipeline behavior against scripted collaborators.

#![allow(clippy::panic, clippy::unwrap_used)]

mod common;

use std::time::Duration;

use proptest::prelude::*;
use serde_json::{Value, json};

use common::{
    CallKind, MockData, MockLlm, api_failure, calls, config, kind, orchestrator, structured,
    subtasks, tasks, text, user_prompt,
};
use fintask::agent::RunRequest;
use fintask::agent::state::FALLBACK_ANSWER;
use fintask::error::{AgentError, ToolError};

const NO_OUTPUTS_YET: &str = "No tool outputs yet.";

fn first_selection(request: &fintask::agent::ChatRequest) -> bool {
    user_prompt(request).contains(NO_OUTPUTS_YET)
}

#[tokio::test]
async fn out_of_domain_query_skips_research() {
    let llm = MockLlm::new(|req| match kind(req) {
        CallKind::PlanTasks => structured(&json!({"tasks": []})),
        CallKind::Answer => text(
            "No financial data was retrieved for this answer. The capital of France is Paris; \
             I specialize in financial research.",
        ),
        other => panic!("unexpected call: {other:?}"),
    });
    let data = MockData::fixed(json!({}));
    let orch = orchestrator(&llm, &data, config());

    let outcome = orch
        .run(RunRequest::new("What's the capital of France?"))
        .await
        .unwrap_or_else(|e| panic!("run failed: {e}"));

    assert!(!outcome.answer.is_empty());
    assert!(outcome.answer.contains("No financial data was retrieved"));
    assert!(outcome.tasks.is_empty());
    assert!(outcome.planned_tasks.is_empty());
    assert!(outcome.tool_contexts.is_empty());
    assert!(!outcome.research_incomplete);
    assert!(data.requests().is_empty());

    let answer_calls = llm.requests_of(CallKind::Answer);
    assert_eq!(answer_calls.len(), 1);
    assert!(user_prompt(&answer_calls[0]).contains("No data was collected from tools."));
    assert_eq!(llm.requests().len(), 2);
}

#[tokio::test]
async fn apple_price_scenario() {
    let llm = MockLlm::new(|req| match kind(req) {
        CallKind::PlanTasks => structured(&tasks(&["Get AAPL current stock price"])),
        CallKind::PlanSubtasks => {
            structured(&subtasks(&["Fetch the AAPL price snapshot with get_price_snapshot"]))
        }
        CallKind::SelectTools if first_selection(req) => {
            calls(&[("get_price_snapshot", json!({"ticker": "AAPL"}))])
        }
        CallKind::SelectTools => calls(&[]),
        CallKind::Summary => text("AAPL last traded at $190.50."),
        CallKind::Answer => text("Apple (AAPL) is trading at $190.50 per share."),
        CallKind::AgentStep => panic!("agent step in pipeline"),
    });
    let data = MockData::fixed(json!({"snapshot": {"ticker": "AAPL", "price": 190.5}}));
    let orch = orchestrator(&llm, &data, config());

    let outcome = orch
        .run(RunRequest::new("What is Apple's stock price?"))
        .await
        .unwrap_or_else(|e| panic!("run failed: {e}"));

    assert_eq!(outcome.tasks.len(), 1);
    assert_eq!(outcome.planned_tasks.len(), 1);
    assert_eq!(outcome.planned_tasks[0].sub_tasks.len(), 1);

    assert_eq!(outcome.tool_contexts.len(), 1);
    let ctx = &outcome.tool_contexts[0];
    assert_eq!(ctx.tool_name, "get_price_snapshot");
    assert_eq!(ctx.args.get("ticker"), Some(&json!("AAPL")));
    assert_eq!(ctx.result["price"], 190.5);
    assert_eq!(ctx.summary, "AAPL last traded at $190.50.");
    assert_eq!(ctx.task_id, Some(1));

    assert!(outcome.answer.chars().any(|c| c.is_ascii_digit()));
    assert!(!outcome.research_incomplete);

    let requests = data.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].path, "/prices/snapshot/");

    let answer_prompt = user_prompt(&llm.requests_of(CallKind::Answer)[0]).to_string();
    assert!(answer_prompt.contains("Output of get_price_snapshot"));
    assert!(answer_prompt.contains("190.5"));
    assert!(!answer_prompt.contains("research was incomplete"));

    // Satisfied on the second selection, so exactly two were issued.
    assert_eq!(llm.requests_of(CallKind::SelectTools).len(), 2);
}

#[tokio::test]
async fn subtask_planning_failure_is_isolated() {
    let llm = MockLlm::new(|req| match kind(req) {
        CallKind::PlanTasks => structured(&tasks(&["Task A", "Task B", "Task C"])),
        CallKind::PlanSubtasks if user_prompt(req).contains("Task B") => api_failure(),
        CallKind::PlanSubtasks if user_prompt(req).contains("Task C") => {
            text("this is not json at all")
        }
        CallKind::PlanSubtasks => structured(&subtasks(&["first step", "second step"])),
        CallKind::SelectTools => calls(&[]),
        CallKind::Answer => text("Partial answer."),
        other => panic!("unexpected call: {other:?}"),
    });
    let data = MockData::fixed(json!({}));
    let orch = orchestrator(&llm, &data, config());

    let outcome = orch
        .run(RunRequest::new("Analyze three things"))
        .await
        .unwrap_or_else(|e| panic!("run failed: {e}"));

    let descriptions: Vec<&str> = outcome
        .planned_tasks
        .iter()
        .map(|p| p.task.description.as_str())
        .collect();
    assert_eq!(descriptions, vec!["Task A", "Task B", "Task C"]);
    assert_eq!(outcome.planned_tasks[0].sub_tasks.len(), 2);
    assert!(outcome.planned_tasks[1].sub_tasks.is_empty());
    assert!(outcome.planned_tasks[2].sub_tasks.is_empty());

    // Only task A's subtasks reach execution.
    assert_eq!(llm.requests_of(CallKind::SelectTools).len(), 2);
    assert_eq!(outcome.answer, "Partial answer.");
}

#[tokio::test]
async fn planned_tasks_keep_order_despite_completion_order() {
    let llm = MockLlm::with_delay(
        |req| match kind(req) {
            CallKind::PlanTasks => structured(&tasks(&["slow task", "fast task"])),
            CallKind::PlanSubtasks if user_prompt(req).contains("slow") => {
                structured(&subtasks(&["slow step"]))
            }
            CallKind::PlanSubtasks => structured(&subtasks(&["fast step"])),
            CallKind::SelectTools => calls(&[]),
            CallKind::Answer => text("Done."),
            other => panic!("unexpected call: {other:?}"),
        },
        |req| {
            (kind(req) == CallKind::PlanSubtasks && user_prompt(req).contains("slow"))
                .then(|| Duration::from_millis(50))
        },
    );
    let data = MockData::fixed(json!({}));
    let orch = orchestrator(&llm, &data, config());

    let outcome = orch
        .run(RunRequest::new("order check"))
        .await
        .unwrap_or_else(|e| panic!("run failed: {e}"));

    assert_eq!(outcome.planned_tasks[0].sub_tasks[0].description, "slow step");
    assert_eq!(outcome.planned_tasks[1].sub_tasks[0].description, "fast step");
}

#[tokio::test]
async fn unknown_tool_is_logged_and_loop_continues() {
    let llm = MockLlm::new(|req| match kind(req) {
        CallKind::PlanTasks => structured(&tasks(&["Check the weather in Cupertino"])),
        CallKind::PlanSubtasks => structured(&subtasks(&["Look up weather"])),
        CallKind::SelectTools if first_selection(req) => {
            calls(&[("get_weather", json!({"city": "Cupertino"}))])
        }
        CallKind::SelectTools => calls(&[]),
        CallKind::Answer => text("I could not retrieve weather data."),
        other => panic!("unexpected call: {other:?}"),
    });
    let data = MockData::fixed(json!({}));
    let orch = orchestrator(&llm, &data, config());

    let outcome = orch
        .run(RunRequest::new("weather?"))
        .await
        .unwrap_or_else(|e| panic!("run failed: {e}"));

    assert!(outcome.tool_contexts.is_empty());
    let selections = llm.requests_of(CallKind::SelectTools);
    assert_eq!(selections.len(), 2);
    assert!(user_prompt(&selections[1]).contains("Error: Tool not found: get_weather"));
    assert!(data.requests().is_empty());
}

#[tokio::test]
async fn tool_failure_is_visible_to_next_selection() {
    let llm = MockLlm::new(|req| match kind(req) {
        CallKind::PlanTasks => structured(&tasks(&["Get MSFT price"])),
        CallKind::PlanSubtasks => structured(&subtasks(&["Fetch snapshot"])),
        CallKind::SelectTools if first_selection(req) => {
            calls(&[("get_price_snapshot", json!({"ticker": "MSFT"}))])
        }
        CallKind::SelectTools if user_prompt(req).contains("Output of") => calls(&[]),
        CallKind::SelectTools => calls(&[("get_price_snapshot", json!({"ticker": "MSFT"}))]),
        CallKind::Summary => text("MSFT last traded at $410.10."),
        CallKind::Answer => text("Microsoft trades at $410.10."),
        other => panic!("unexpected call: {other:?}"),
    });
    let attempts = std::sync::atomic::AtomicUsize::new(0);
    let data = MockData::new(move |req| {
        if attempts.fetch_add(1, std::sync::atomic::Ordering::SeqCst) == 0 {
            Err(ToolError::Api {
                name: req.tool.to_string(),
                status: 500,
                message: "upstream unavailable".to_string(),
            })
        } else {
            Ok(json!({"snapshot": {"ticker": "MSFT", "price": 410.1}}))
        }
    });
    let orch = orchestrator(&llm, &data, config());

    let outcome = orch
        .run(RunRequest::new("MSFT price"))
        .await
        .unwrap_or_else(|e| panic!("run failed: {e}"));

    let selections = llm.requests_of(CallKind::SelectTools);
    assert_eq!(selections.len(), 3);
    let second = user_prompt(&selections[1]);
    assert!(second.contains("Error from get_price_snapshot:"));
    assert!(second.contains("upstream unavailable"));
    assert!(user_prompt(&selections[2]).contains("Output of get_price_snapshot: MSFT last traded"));

    assert_eq!(outcome.tool_contexts.len(), 1);
    assert_eq!(data.requests().len(), 2);
}

#[tokio::test]
async fn invalid_arguments_are_logged_not_invoked() {
    let llm = MockLlm::new(|req| match kind(req) {
        CallKind::PlanTasks => structured(&tasks(&["Get prices"])),
        CallKind::PlanSubtasks => structured(&subtasks(&["Fetch history"])),
        CallKind::SelectTools if first_selection(req) => {
            calls(&[("get_prices", json!({"ticker": "AAPL"}))])
        }
        CallKind::SelectTools => calls(&[]),
        CallKind::Answer => text("Missing dates."),
        other => panic!("unexpected call: {other:?}"),
    });
    let data = MockData::fixed(json!({}));
    let orch = orchestrator(&llm, &data, config());

    orch.run(RunRequest::new("AAPL history"))
        .await
        .unwrap_or_else(|e| panic!("run failed: {e}"));

    let selections = llm.requests_of(CallKind::SelectTools);
    assert!(user_prompt(&selections[1]).contains("Error from get_prices:"));
    assert!(data.requests().is_empty());
}

#[tokio::test]
async fn summary_failure_falls_back_to_template() {
    let llm = MockLlm::new(|req| match kind(req) {
        CallKind::PlanTasks => structured(&tasks(&["Get AAPL price"])),
        CallKind::PlanSubtasks => structured(&subtasks(&["Fetch snapshot"])),
        CallKind::SelectTools if first_selection(req) => {
            calls(&[("get_price_snapshot", json!({"ticker": "AAPL"}))])
        }
        CallKind::SelectTools => calls(&[]),
        CallKind::Summary => api_failure(),
        CallKind::Answer => text("Apple trades at $190.50."),
        other => panic!("unexpected call: {other:?}"),
    });
    let data = MockData::fixed(json!({"snapshot": {"price": 190.5}}));
    let orch = orchestrator(&llm, &data, config());

    let outcome = orch
        .run(RunRequest::new("AAPL price"))
        .await
        .unwrap_or_else(|e| panic!("run failed: {e}"));

    assert_eq!(
        outcome.tool_contexts[0].summary,
        r#"get_price_snapshot output with args {"ticker":"AAPL"}"#
    );
}

#[tokio::test]
async fn subtask_cap_marks_research_incomplete() {
    let llm = MockLlm::new(|req| match kind(req) {
        CallKind::PlanTasks => structured(&tasks(&["Get news"])),
        CallKind::PlanSubtasks => structured(&subtasks(&["Read all the news"])),
        CallKind::SelectTools => calls(&[("get_news", json!({"ticker": "NVDA"}))]),
        CallKind::Summary => text("NVDA news."),
        CallKind::Answer => text("Here is what I found so far."),
        other => panic!("unexpected call: {other:?}"),
    });
    let data = MockData::fixed(json!({"news": []}));
    let orch = orchestrator(&llm, &data, config().max_subtask_iterations(3));

    let outcome = orch
        .run(RunRequest::new("NVDA news"))
        .await
        .unwrap_or_else(|e| panic!("run failed: {e}"));

    assert_eq!(llm.requests_of(CallKind::SelectTools).len(), 3);
    assert_eq!(outcome.tool_contexts.len(), 3);
    assert!(outcome.research_incomplete);
    let answer_prompt = user_prompt(&llm.requests_of(CallKind::Answer)[0]).to_string();
    assert!(answer_prompt.contains("research was incomplete"));
}

fn ordered_llm() -> std::sync::Arc<MockLlm> {
    MockLlm::with_delay(
        |req| match kind(req) {
            CallKind::PlanTasks => structured(&tasks(&["Research AAPL", "Research MSFT"])),
            CallKind::PlanSubtasks if user_prompt(req).contains("AAPL") => {
                structured(&subtasks(&["AAPL price", "AAPL news"]))
            }
            CallKind::PlanSubtasks => structured(&subtasks(&["MSFT price", "MSFT news"])),
            CallKind::SelectTools if first_selection(req) => {
                let prompt = user_prompt(req);
                let ticker = if prompt.contains("AAPL") { "AAPL" } else { "MSFT" };
                let tool = if prompt.contains("price\"") {
                    "get_price_snapshot"
                } else {
                    "get_news"
                };
                calls(&[
                    (tool, json!({"ticker": ticker})),
                    ("get_company_facts", json!({"ticker": ticker})),
                ])
            }
            CallKind::SelectTools => calls(&[]),
            CallKind::Summary => text("summary"),
            CallKind::Answer => text("Comparison done."),
            CallKind::AgentStep => panic!("agent step in pipeline"),
        },
        |req| {
            (kind(req) == CallKind::PlanSubtasks && user_prompt(req).contains("AAPL"))
                .then(|| Duration::from_millis(30))
        },
    )
}

#[tokio::test]
async fn tool_contexts_follow_declaration_order() {
    let mut runs = Vec::new();
    for _ in 0..2 {
        let llm = ordered_llm();
        let data = MockData::fixed(json!({"ok": true}));
        let orch = orchestrator(&llm, &data, config());
        let outcome = orch
            .run(RunRequest::new("Compare AAPL and MSFT"))
            .await
            .unwrap_or_else(|e| panic!("run failed: {e}"));
        let order: Vec<(String, Value, Option<i64>)> = outcome
            .tool_contexts
            .iter()
            .map(|c| (c.tool_name.clone(), c.args["ticker"].clone(), c.task_id))
            .collect();
        runs.push(order);
    }

    assert_eq!(runs[0], runs[1]);
    let expected = vec![
        ("get_price_snapshot".to_string(), json!("AAPL"), Some(1)),
        ("get_company_facts".to_string(), json!("AAPL"), Some(1)),
        ("get_news".to_string(), json!("AAPL"), Some(1)),
        ("get_company_facts".to_string(), json!("AAPL"), Some(1)),
        ("get_price_snapshot".to_string(), json!("MSFT"), Some(2)),
        ("get_company_facts".to_string(), json!("MSFT"), Some(2)),
        ("get_news".to_string(), json!("MSFT"), Some(2)),
        ("get_company_facts".to_string(), json!("MSFT"), Some(2)),
    ];
    assert_eq!(runs[0], expected);
}

#[tokio::test]
async fn planning_failure_aborts_run() {
    let llm = MockLlm::new(|req| match kind(req) {
        CallKind::PlanTasks => api_failure(),
        other => panic!("unexpected call: {other:?}"),
    });
    let data = MockData::fixed(json!({}));
    let orch = orchestrator(&llm, &data, config());

    let result = orch.run(RunRequest::new("AAPL price")).await;
    assert!(matches!(
        result,
        Err(AgentError::ApiRequest {
            status: Some(429),
            ..
        })
    ));
}

#[tokio::test]
async fn malformed_task_plan_propagates_decode_error() {
    let llm = MockLlm::new(|req| match kind(req) {
        CallKind::PlanTasks => text("Sure! Here are some tasks: 1. price"),
        other => panic!("unexpected call: {other:?}"),
    });
    let data = MockData::fixed(json!({}));
    let orch = orchestrator(&llm, &data, config());

    let result = orch.run(RunRequest::new("AAPL price")).await;
    assert!(matches!(result, Err(AgentError::ResponseParse { .. })));
}

#[tokio::test]
async fn blank_answer_is_replaced() {
    let llm = MockLlm::new(|req| match kind(req) {
        CallKind::PlanTasks => structured(&json!({"tasks": []})),
        CallKind::Answer => text("   "),
        other => panic!("unexpected call: {other:?}"),
    });
    let data = MockData::fixed(json!({}));
    let orch = orchestrator(&llm, &data, config());

    let outcome = orch
        .run(RunRequest::new("hello"))
        .await
        .unwrap_or_else(|e| panic!("run failed: {e}"));
    assert_eq!(outcome.answer, FALLBACK_ANSWER);
}

#[tokio::test]
async fn model_override_reaches_every_call() {
    let llm = MockLlm::new(|req| match kind(req) {
        CallKind::PlanTasks => structured(&tasks(&["Get AAPL price"])),
        CallKind::PlanSubtasks => structured(&subtasks(&["Fetch snapshot"])),
        CallKind::SelectTools => calls(&[]),
        CallKind::Answer => text("Done."),
        other => panic!("unexpected call: {other:?}"),
    });
    let data = MockData::fixed(json!({}));
    let orch = orchestrator(&llm, &data, config());

    orch.run(RunRequest::new("AAPL").with_model("gpt-4o-mini"))
        .await
        .unwrap_or_else(|e| panic!("run failed: {e}"));
    assert!(llm.requests().iter().all(|r| r.model == "gpt-4o-mini"));

    let llm_default = MockLlm::new(|req| match kind(req) {
        CallKind::PlanTasks => structured(&json!({"tasks": []})),
        _ => text("Done."),
    });
    let orch = orchestrator(&llm_default, &data, config());
    orch.run(RunRequest::new("AAPL").with_model("  "))
        .await
        .unwrap_or_else(|e| panic!("run failed: {e}"));
    assert!(llm_default.requests().iter().all(|r| r.model == "test-model"));
}

#[tokio::test]
async fn empty_and_oversized_queries_are_rejected() {
    let llm = MockLlm::new(|_| panic!("no LLM call expected"));
    let data = MockData::fixed(json!({}));
    let orch = orchestrator(&llm, &data, config());

    assert!(matches!(
        orch.run(RunRequest::new("  ")).await,
        Err(AgentError::Orchestration { .. })
    ));
    assert!(matches!(
        orch.run(RunRequest::new("x".repeat(10_001))).await,
        Err(AgentError::Orchestration { .. })
    ));
    assert!(llm.requests().is_empty());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn selection_calls_never_exceed_cap(cap in 1usize..6, subtask_count in 1usize..4) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let descriptions: Vec<String> = (0..subtask_count).map(|i| format!("step {i}")).collect();
        let llm = MockLlm::new(move |req| match kind(req) {
            CallKind::PlanTasks => structured(&tasks(&["Loop forever"])),
            CallKind::PlanSubtasks => {
                let refs: Vec<&str> = descriptions.iter().map(String::as_str).collect();
                structured(&subtasks(&refs))
            }
            CallKind::SelectTools => calls(&[("get_weather", json!({}))]),
            _ => text("done"),
        });
        let data = MockData::fixed(json!({}));
        let orch = orchestrator(&llm, &data, config().max_subtask_iterations(cap));

        let outcome = rt.block_on(orch.run(RunRequest::new("cap check"))).unwrap();

        prop_assert_eq!(llm.requests_of(CallKind::SelectTools).len(), cap * subtask_count);
        prop_assert_eq!(outcome.planned_tasks[0].sub_tasks.len(), subtask_count);
        prop_assert!(outcome.research_incomplete);
        prop_assert!(outcome.tool_contexts.is_empty());
    }
}
