//! LLM client abstractions and provider selection
//!
//! The rest of the crate talks to a text-completion service only through
//! [`LLMClient`]. Two providers are implemented, each behind a cargo feature:
//! - **Anthropic** (`anthropic`): Messages API with tool use, via `claude-sdk`
//! - **OpenAI** (`openai`): Chat Completions API and compatible endpoints, via `async-openai`

use crate::types::{AppError, Result, ToolCall, ToolDefinition};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Generic LLM client trait for provider abstraction
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Generate a completion from a prompt
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Generate one assistant turn from a tool-calling conversation.
    ///
    /// The response carries either text, tool calls, or both.
    async fn generate_with_tools_and_history(
        &self,
        messages: &[ConversationMessage],
        tools: &[ToolDefinition],
    ) -> Result<LLMResponse>;

    /// Get the model name/identifier
    fn model_name(&self) -> &str;
}

/// Response from an LLM generation request
#[derive(Debug, Clone, Default)]
pub struct LLMResponse {
    /// The text content of the response
    pub content: String,
    /// Any tool calls requested by the model
    pub tool_calls: Vec<ToolCall>,
    /// The reason generation stopped (e.g., "stop", "tool_use", "max_tokens")
    pub finish_reason: String,
}

/// Role of a message sender in a tool-calling conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System instructions.
    System,
    /// User message.
    User,
    /// Assistant response.
    Assistant,
    /// Tool execution result.
    Tool,
}

/// A message in a tool-calling conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    /// The role of the message sender.
    pub role: MessageRole,
    /// The text content of the message.
    pub content: String,
    /// Tool calls requested by the assistant (only for Assistant role).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Id of the call this message answers (only for Tool role).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Whether the tool result is an error (only for Tool role).
    #[serde(default)]
    pub is_error: bool,
}

impl ConversationMessage {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            is_error: false,
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            is_error: false,
        }
    }

    /// Create an assistant message with optional tool calls.
    pub fn assistant(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            tool_calls,
            tool_call_id: None,
            is_error: false,
        }
    }

    /// Create a tool result message from already-rendered text.
    pub fn tool_result_text(
        tool_call_id: impl Into<String>,
        content: impl Into<String>,
        is_error: bool,
    ) -> Self {
        Self {
            role: MessageRole::Tool,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
            is_error,
        }
    }
}

/// Inference parameters shared by all providers.
#[derive(Debug, Clone)]
pub struct ModelParams {
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    /// Whole-request timeout, SDK retries included.
    pub request_timeout: Duration,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            max_tokens: 4096,
            temperature: None,
            request_timeout: Duration::from_secs(120),
        }
    }
}

/// Provider enum for runtime selection
#[derive(Debug, Clone)]
pub enum Provider {
    /// Anthropic Messages API. `claude-sdk` targets the public endpoint only.
    Anthropic {
        api_key: String,
        model: String,
        params: ModelParams,
    },

    /// OpenAI Chat Completions API (including compatible gateways)
    OpenAI {
        api_key: String,
        api_base: String,
        model: String,
        params: ModelParams,
    },
}

impl Provider {
    /// Create a client instance for this provider
    ///
    /// Fails with a configuration error when the provider's cargo feature
    /// was not compiled in.
    pub fn create_client(&self) -> Result<Arc<dyn LLMClient>> {
        match self {
            #[cfg(feature = "anthropic")]
            Provider::Anthropic {
                api_key,
                model,
                params,
            } => Ok(Arc::new(super::anthropic::AnthropicClient::new(
                api_key.clone(),
                model.clone(),
                params.clone(),
            )?)),
            #[cfg(feature = "openai")]
            Provider::OpenAI {
                api_key,
                api_base,
                model,
                params,
            } => Ok(Arc::new(super::openai::OpenAIClient::new(
                api_key.clone(),
                api_base.clone(),
                model.clone(),
                params.clone(),
            )?)),
            #[allow(unreachable_patterns)]
            other => Err(AppError::Configuration(format!(
                "{} support is not compiled in; rebuild with the `{}` feature",
                other.name(),
                other.feature()
            ))),
        }
    }

    /// Cargo feature that compiles this provider's client
    pub fn feature(&self) -> &'static str {
        match self {
            Provider::Anthropic { .. } => "anthropic",
            Provider::OpenAI { .. } => "openai",
        }
    }

    /// Get a human-readable name for this provider
    pub fn name(&self) -> &'static str {
        match self {
            Provider::Anthropic { .. } => "Anthropic",
            Provider::OpenAI { .. } => "OpenAI",
        }
    }

    /// Model identifier requested from the provider
    pub fn model(&self) -> &str {
        match self {
            Provider::Anthropic { model, .. } | Provider::OpenAI { model, .. } => model,
        }
    }
}

/// Map a provider failure onto the typed LLM failures.
///
/// `status` is absent when the SDK surfaces only the error object.
#[cfg_attr(not(any(feature = "anthropic", feature = "openai")), allow(dead_code))]
pub(crate) fn classify_http_failure(provider: &str, status: Option<u16>, body: &str) -> AppError {
    let lower = body.to_lowercase();
    let detail = match status {
        Some(status) => format!("{} API error ({}): {}", provider, status, truncate_body(body)),
        None => format!("{} API error: {}", provider, truncate_body(body)),
    };

    if status == Some(429) || lower.contains("quota") || lower.contains("rate_limit") {
        AppError::QuotaExceeded(detail)
    } else if matches!(status, Some(408) | Some(504)) {
        AppError::LLMTimeout(detail)
    } else if lower.contains("prompt is too long")
        || lower.contains("context_length_exceeded")
        || lower.contains("maximum context length")
    {
        AppError::ContextLengthExceeded(detail)
    } else if lower.contains("content_filter") || lower.contains("content policy") {
        AppError::ContentFiltered(detail)
    } else {
        AppError::LLM(detail)
    }
}

#[cfg_attr(not(any(feature = "anthropic", feature = "openai")), allow(dead_code))]
fn truncate_body(body: &str) -> &str {
    match body.char_indices().nth(500) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
