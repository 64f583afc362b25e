use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// ============= API Request/Response Types =============

/// Body of `POST /api/query`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QueryRequest {
    /// Natural-language health data question.
    pub query: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

/// One entry of the configured agent roster, as listed by `GET /api/agents`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AgentInfo {
    pub id: String,
    pub description: String,
    pub tools: Vec<String>,
}

// ============= Tool Types =============

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

// ============= Error Types =============

/// Typed failure of a public health data source.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl SourceError {
    /// Stable snake_case identifier used in events and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            SourceError::UpstreamUnavailable(_) => "upstream_unavailable",
            SourceError::NotFound(_) => "not_found",
            SourceError::RateLimited(_) => "rate_limited",
            SourceError::MalformedResponse(_) => "malformed_response",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Data source error: {0}")]
    Source(#[from] SourceError),

    #[error("LLM error: {0}")]
    LLM(String),

    #[error("LLM request timed out: {0}")]
    LLMTimeout(String),

    #[error("LLM quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("LLM content filtered: {0}")]
    ContentFiltered(String),

    #[error("LLM context length exceeded: {0}")]
    ContextLengthExceeded(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Snake_case identifier for the failure class, used in event payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidInput(_) => "invalid_input",
            AppError::Source(e) => e.kind(),
            AppError::LLM(_) => "llm_failure",
            AppError::LLMTimeout(_) => "timeout",
            AppError::QuotaExceeded(_) => "quota_exceeded",
            AppError::ContentFiltered(_) => "content_filtered",
            AppError::ContextLengthExceeded(_) => "context_length_exceeded",
            AppError::NotFound(_) => "not_found",
            AppError::Configuration(_) => "configuration",
            AppError::Persistence(_) => "persistence_failure",
            AppError::Internal(_) => "internal",
        }
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let status = match &self {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Source(_) => StatusCode::BAD_GATEWAY,
            AppError::QuotaExceeded(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::LLMTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({
            "error": self.to_string(),
            "kind": self.kind(),
        });

        (status, axum::Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    #[test]
    fn test_source_error_kinds() {
        assert_eq!(
            SourceError::UpstreamUnavailable("down".into()).kind(),
            "upstream_unavailable"
        );
        assert_eq!(SourceError::NotFound("x".into()).kind(), "not_found");
        assert_eq!(SourceError::RateLimited("x".into()).kind(), "rate_limited");
        assert_eq!(
            SourceError::MalformedResponse("x".into()).kind(),
            "malformed_response"
        );
    }

    #[test]
    fn test_app_error_wraps_source_kind() {
        let err: AppError = SourceError::RateLimited("429".into()).into();
        assert_eq!(err.kind(), "rate_limited");
        assert_eq!(AppError::LLMTimeout("slow".into()).kind(), "timeout");
    }

    #[test]
    fn test_invalid_input_maps_to_bad_request() {
        let response = AppError::InvalidInput("empty".into()).into_response();
        assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST);
    }
}
