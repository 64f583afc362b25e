//! Anthropic Claude LLM client implementation
//!
//! This module provides integration with Anthropic's Claude API via the
//! `claude-sdk` crate. Tool definitions map onto `Tool::input_schema`; tool
//! results travel back as `ToolResult` content blocks in a user turn.
//!
//! # Example
//!
//! ```rust,ignore
//! use healthscope::llm::{LLMClient, ModelParams, Provider};
//!
//! let provider = Provider::Anthropic {
//!     api_key: "sk-ant-...".to_string(),
//!     model: "claude-3-5-sonnet-latest".to_string(),
//!     params: ModelParams::default(),
//! };
//! let client = provider.create_client()?;
//! let response = client.generate("Hello!").await?;
//! ```

use crate::llm::client::{
    classify_http_failure, ConversationMessage, LLMClient, LLMResponse, MessageRole, ModelParams,
};
use crate::types::{AppError, Result, ToolCall, ToolDefinition};
use async_trait::async_trait;
use claude_sdk::{
    ClaudeClient, ContentBlock, Message, MessagesRequest, MessagesResponse, Role, StopReason, Tool,
};

const PROVIDER: &str = "Anthropic";

/// Anthropic Claude client for API-based inference
pub struct AnthropicClient {
    client: ClaudeClient,
    model: String,
    params: ModelParams,
}

impl AnthropicClient {
    /// Create a new Anthropic client
    ///
    /// # Arguments
    ///
    /// * `api_key` - Anthropic API key
    /// * `model` - Model identifier
    /// * `params` - Inference parameters and request timeout
    pub fn new(api_key: String, model: String, params: ModelParams) -> Result<Self> {
        Ok(Self {
            client: ClaudeClient::anthropic(api_key),
            model,
            params,
        })
    }

    fn convert_tool(tool: &ToolDefinition) -> Tool {
        Tool {
            name: tool.name.clone(),
            description: tool.description.clone(),
            input_schema: tool.parameters.clone(),
            disable_user_input: None,
            input_examples: None,
            cache_control: None,
        }
    }

    /// Convert the provider-neutral history into Claude messages.
    ///
    /// System messages are lifted into the request's `system` field.
    /// Consecutive tool results are merged into a single user turn.
    fn convert_history(messages: &[ConversationMessage]) -> (Option<String>, Vec<Message>) {
        let mut system_parts = Vec::new();
        let mut out: Vec<Message> = Vec::new();
        let mut pending_results: Vec<ContentBlock> = Vec::new();

        for msg in messages {
            if msg.role != MessageRole::Tool && !pending_results.is_empty() {
                out.push(Message {
                    role: Role::User,
                    content: std::mem::take(&mut pending_results),
                });
            }

            match msg.role {
                MessageRole::System => system_parts.push(msg.content.clone()),
                MessageRole::User => out.push(Message::user(msg.content.clone())),
                MessageRole::Assistant => {
                    let mut blocks = Vec::new();
                    if !msg.content.is_empty() || msg.tool_calls.is_empty() {
                        blocks.push(ContentBlock::Text {
                            text: msg.content.clone(),
                            cache_control: None,
                            citations: None,
                        });
                    }
                    blocks.extend(msg.tool_calls.iter().map(|call| ContentBlock::ToolUse {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        input: call.arguments.clone(),
                        cache_control: None,
                    }));
                    out.push(Message {
                        role: Role::Assistant,
                        content: blocks,
                    });
                }
                MessageRole::Tool => pending_results.push(ContentBlock::ToolResult {
                    tool_use_id: msg.tool_call_id.clone().unwrap_or_default(),
                    content: Some(msg.content.clone()),
                    is_error: msg.is_error.then_some(true),
                }),
            }
        }

        if !pending_results.is_empty() {
            out.push(Message {
                role: Role::User,
                content: pending_results,
            });
        }

        let system = (!system_parts.is_empty()).then(|| system_parts.join("\n\n"));
        (system, out)
    }

    fn build_request(
        &self,
        messages: Vec<Message>,
        tools: Option<Vec<Tool>>,
        system: Option<String>,
    ) -> MessagesRequest {
        let mut request = MessagesRequest::new(&self.model, self.params.max_tokens, messages);
        if let Some(system) = system {
            request = request.with_system(system);
        }
        if let Some(tools) = tools.filter(|t| !t.is_empty()) {
            request = request.with_tools(tools);
        }
        if let Some(temperature) = self.params.temperature {
            request = request.with_temperature(temperature);
        }
        request
    }

    /// Send one request, bounded by the configured request timeout.
    async fn send(&self, request: MessagesRequest) -> Result<MessagesResponse> {
        match tokio::time::timeout(self.params.request_timeout, self.client.send_message(request))
            .await
        {
            Ok(result) => result.map_err(map_sdk_error),
            Err(_) => Err(AppError::LLMTimeout(format!(
                "{} request exceeded {:?}",
                PROVIDER, self.params.request_timeout
            ))),
        }
    }

    fn into_llm_response(response: MessagesResponse) -> LLMResponse {
        let mut content = String::new();
        let mut tool_calls = Vec::new();

        for block in response.content {
            match block {
                ContentBlock::Text { text, .. } => content.push_str(&text),
                ContentBlock::ToolUse {
                    id, name, input, ..
                } => tool_calls.push(ToolCall {
                    id,
                    name,
                    arguments: input,
                }),
                _ => {}
            }
        }

        LLMResponse {
            content,
            tool_calls,
            finish_reason: stop_reason_to_string(response.stop_reason.as_ref()),
        }
    }
}

fn stop_reason_to_string(reason: Option<&StopReason>) -> String {
    match reason {
        Some(StopReason::EndTurn) | None => "stop",
        Some(StopReason::MaxTokens) => "max_tokens",
        Some(StopReason::StopSequence) => "stop_sequence",
        Some(StopReason::ToolUse) => "tool_use",
        Some(StopReason::PauseTurn) => "pause_turn",
    }
    .to_string()
}

/// Map `claude-sdk` failures onto the typed LLM failures.
fn map_sdk_error(err: claude_sdk::Error) -> AppError {
    use claude_sdk::Error as SdkError;

    match err {
        SdkError::Api {
            status, message, ..
        } => classify_http_failure(PROVIDER, Some(status), &message),
        SdkError::Server { status, message } => {
            classify_http_failure(PROVIDER, Some(status), &message)
        }
        SdkError::RateLimit { message, .. } => classify_http_failure(PROVIDER, Some(429), &message),
        SdkError::InvalidRequest(message) => classify_http_failure(PROVIDER, Some(400), &message),
        SdkError::Http(e) if e.is_timeout() => {
            AppError::LLMTimeout(format!("{} request timed out: {}", PROVIDER, e))
        }
        other => AppError::LLM(format!("{} API error: {}", PROVIDER, other)),
    }
}

#[async_trait]
impl LLMClient for AnthropicClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = self.build_request(vec![Message::user(prompt)], None, None);
        Ok(Self::into_llm_response(self.send(request).await?).content)
    }

    async fn generate_with_tools_and_history(
        &self,
        messages: &[ConversationMessage],
        tools: &[ToolDefinition],
    ) -> Result<LLMResponse> {
        let (system, converted) = Self::convert_history(messages);
        let request = self.build_request(
            converted,
            Some(tools.iter().map(Self::convert_tool).collect()),
            system,
        );
        Ok(Self::into_llm_response(self.send(request).await?))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
