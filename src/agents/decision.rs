//! The decision step of an agent's tool loop.
//!
//! [`AgentRunner`](super::AgentRunner) owns the loop, the tool execution and
//! the bookkeeping; a [`Decider`] only looks at the conversation so far and
//! says what to do next. Production agents use [`LlmDecider`].

use crate::llm::{ConversationMessage, LLMClient};
use crate::types::{Result, ToolCall, ToolDefinition};
use async_trait::async_trait;
use std::sync::Arc;

/// What the agent should do next.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Run these tool calls, then decide again.
    Invoke {
        calls: Vec<ToolCall>,
        /// Assistant text accompanying the calls, possibly empty.
        message: String,
    },
    /// Finish with this summary.
    Stop { summary: String },
}

/// Inputs to one decision.
pub struct DecisionContext<'a> {
    pub agent_id: &'a str,
    /// 0-based loop iteration.
    pub iteration: usize,
    /// Full conversation: role prompt, task, assistant turns and tool results.
    pub messages: &'a [ConversationMessage],
    pub tools: &'a [ToolDefinition],
}

#[async_trait]
pub trait Decider: Send + Sync {
    async fn decide(&self, ctx: &DecisionContext<'_>) -> Result<Decision>;
}

/// Decider backed by an LLM with native tool calling.
pub struct LlmDecider {
    client: Arc<dyn LLMClient>,
}

impl LlmDecider {
    pub fn new(client: Arc<dyn LLMClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Decider for LlmDecider {
    async fn decide(&self, ctx: &DecisionContext<'_>) -> Result<Decision> {
        let response = self
            .client
            .generate_with_tools_and_history(ctx.messages, ctx.tools)
            .await?;

        tracing::debug!(
            agent = ctx.agent_id,
            iteration = ctx.iteration,
            finish_reason = %response.finish_reason,
            tool_calls = response.tool_calls.len(),
            "decision"
        );

        if response.tool_calls.is_empty() {
            Ok(Decision::Stop {
                summary: response.content,
            })
        } else {
            Ok(Decision::Invoke {
                calls: response.tool_calls,
                message: response.content,
            })
        }
    }
}
