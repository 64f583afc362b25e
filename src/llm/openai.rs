use crate::llm::client::{
    classify_http_failure, ConversationMessage, LLMClient, LLMResponse, MessageRole, ModelParams,
};
use crate::types::{AppError, Result, ToolCall, ToolDefinition};
use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionMessageToolCall, ChatCompletionMessageToolCalls,
        ChatCompletionRequestAssistantMessage, ChatCompletionRequestAssistantMessageContent,
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
        ChatCompletionRequestToolMessage, ChatCompletionRequestToolMessageContent,
        ChatCompletionRequestUserMessage, ChatCompletionTool, ChatCompletionToolChoiceOption,
        ChatCompletionTools, CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
        FinishReason, FunctionCall, FunctionObject, ToolChoiceOptions,
    },
    Client,
};
use async_trait::async_trait;

const PROVIDER: &str = "OpenAI";

/// Client for the OpenAI Chat Completions API and compatible gateways.
pub struct OpenAIClient {
    client: Client<OpenAIConfig>,
    model: String,
    params: ModelParams,
}

impl OpenAIClient {
    pub fn new(api_key: String, api_base: String, model: String, params: ModelParams) -> Result<Self> {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(api_base.trim_end_matches('/'));
        let http = reqwest::Client::builder()
            .timeout(params.request_timeout)
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client: Client::with_config(config).with_http_client(http),
            model,
            params,
        })
    }

    fn convert_tool(tool: &ToolDefinition) -> ChatCompletionTools {
        ChatCompletionTools::Function(ChatCompletionTool {
            function: FunctionObject {
                name: tool.name.clone(),
                description: Some(tool.description.clone()),
                parameters: Some(tool.parameters.clone()),
                strict: None,
            },
        })
    }

    fn convert_message(msg: &ConversationMessage) -> ChatCompletionRequestMessage {
        match msg.role {
            MessageRole::System => {
                ChatCompletionRequestSystemMessage::from(msg.content.clone()).into()
            }
            MessageRole::User => ChatCompletionRequestUserMessage::from(msg.content.clone()).into(),
            MessageRole::Assistant => {
                let tool_calls: Vec<ChatCompletionMessageToolCalls> = msg
                    .tool_calls
                    .iter()
                    .map(|call| {
                        ChatCompletionMessageToolCalls::Function(ChatCompletionMessageToolCall {
                            id: call.id.clone(),
                            function: FunctionCall {
                                name: call.name.clone(),
                                arguments: call.arguments.to_string(),
                            },
                        })
                    })
                    .collect();
                let content = (!msg.content.is_empty() || tool_calls.is_empty()).then(|| {
                    ChatCompletionRequestAssistantMessageContent::Text(msg.content.clone())
                });
                ChatCompletionRequestAssistantMessage {
                    content,
                    tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
                    ..Default::default()
                }
                .into()
            }
            MessageRole::Tool => ChatCompletionRequestToolMessage {
                content: ChatCompletionRequestToolMessageContent::Text(msg.content.clone()),
                tool_call_id: msg.tool_call_id.clone().unwrap_or_default(),
            }
            .into(),
        }
    }

    fn build_request(
        &self,
        messages: Vec<ChatCompletionRequestMessage>,
        tools: &[ToolDefinition],
    ) -> Result<CreateChatCompletionRequest> {
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model)
            .messages(messages)
            .max_completion_tokens(self.params.max_tokens);
        if let Some(temperature) = self.params.temperature {
            args.temperature(temperature);
        }
        if !tools.is_empty() {
            args.tools(tools.iter().map(Self::convert_tool).collect::<Vec<_>>())
                .tool_choice(ChatCompletionToolChoiceOption::Mode(ToolChoiceOptions::Auto));
        }
        args.build()
            .map_err(|e| AppError::LLM(format!("Failed to build request: {}", e)))
    }

    async fn send(&self, request: CreateChatCompletionRequest) -> Result<LLMResponse> {
        // The SDK retries rate limits internally; bound the whole exchange.
        let response =
            match tokio::time::timeout(self.params.request_timeout, self.client.chat().create(request))
                .await
            {
                Ok(result) => result.map_err(map_sdk_error)?,
                Err(_) => {
                    return Err(AppError::LLMTimeout(format!(
                        "{} request exceeded {:?}",
                        PROVIDER, self.params.request_timeout
                    )));
                }
            };

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AppError::LLM("No response from OpenAI".to_string()))?;

        let finish_reason = match choice.finish_reason {
            Some(FinishReason::Stop) => "stop",
            Some(FinishReason::Length) => "max_tokens",
            Some(FinishReason::ToolCalls) | Some(FinishReason::FunctionCall) => "tool_calls",
            Some(FinishReason::ContentFilter) => {
                return Err(AppError::ContentFiltered(
                    "OpenAI stopped generation with content_filter".to_string(),
                ));
            }
            None => "unknown",
        }
        .to_string();

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .filter_map(|call| match call {
                ChatCompletionMessageToolCalls::Function(call) => Some(ToolCall {
                    id: call.id,
                    name: call.function.name,
                    arguments: serde_json::from_str(&call.function.arguments)
                        .unwrap_or(serde_json::json!({})),
                }),
                ChatCompletionMessageToolCalls::Custom(_) => None,
            })
            .collect();

        Ok(LLMResponse {
            content: choice.message.content.unwrap_or_default(),
            tool_calls,
            finish_reason,
        })
    }
}

/// Map `async-openai` failures onto the typed LLM failures.
fn map_sdk_error(err: OpenAIError) -> AppError {
    match err {
        OpenAIError::ApiError(api_error) => {
            classify_http_failure(PROVIDER, None, &api_error.to_string())
        }
        OpenAIError::Reqwest(e) if e.is_timeout() => {
            AppError::LLMTimeout(format!("{} request timed out: {}", PROVIDER, e))
        }
        OpenAIError::Reqwest(e) => match e.status() {
            Some(status) => classify_http_failure(PROVIDER, Some(status.as_u16()), &e.to_string()),
            None => AppError::LLM(format!("{} request failed: {}", PROVIDER, e)),
        },
        other => AppError::LLM(format!("{} API error: {}", PROVIDER, other)),
    }
}

#[async_trait]
impl LLMClient for OpenAIClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = self.build_request(
            vec![ChatCompletionRequestUserMessage::from(prompt).into()],
            &[],
        )?;
        Ok(self.send(request).await?.content)
    }

    async fn generate_with_tools_and_history(
        &self,
        messages: &[ConversationMessage],
        tools: &[ToolDefinition],
    ) -> Result<LLMResponse> {
        let request = self.build_request(
            messages.iter().map(Self::convert_message).collect(),
            tools,
        )?;
        self.send(request).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
