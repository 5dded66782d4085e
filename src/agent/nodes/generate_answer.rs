use async_trait::async_trait;
use tracing::info;

use super::{GENERATE_ANSWER, NodeContext};
use crate::agent::graph::Node;
use crate::agent::llm::CallOptions;
use crate::agent::prompt::build_answer_prompt;
use crate::agent::state::{RunState, StateUpdate};
use crate::error::AgentError;

/// Synthesizes the final answer from the collected evidence.
#[derive(Debug, Clone)]
pub struct GenerateAnswer {
    ctx: NodeContext,
}

impl GenerateAnswer {
    /// Creates the node.
    pub const fn new(ctx: NodeContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Node<RunState> for GenerateAnswer {
    fn name(&self) -> &'static str {
        GENERATE_ANSWER
    }

    async fn run(&self, state: &RunState) -> Result<StateUpdate, AgentError> {
        let prompt = build_answer_prompt(
            &state.query,
            &state.tool_contexts,
            state.research_incomplete(),
        );
        let opts = CallOptions::new(self.ctx.prompts.answer.as_str())
            .model(&state.model)
            .max_tokens(self.ctx.config.answer_max_tokens);
        let answer = self.ctx.llm.complete_text(&prompt, &opts).await?;
        info!(
            evidence = state.tool_contexts.len(),
            incomplete = state.research_incomplete(),
            chars = answer.len(),
            "answer generated"
        );

        Ok(StateUpdate {
            answer: Some(answer),
            ..StateUpdate::default()
        })
    }
}
