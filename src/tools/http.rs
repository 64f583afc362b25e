//! Shared HTTP plumbing for the public health data sources.
//!
//! Every source tool performs plain `GET` requests that return JSON. Transport
//! and status failures are classified into [`SourceError`] here so that the
//! individual tool modules only deal with request shaping and response
//! normalization.

use crate::types::{AppError, Result, SourceError};
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;

/// A JSON-over-HTTP client bound to one data source's base URL.
#[derive(Clone)]
pub struct SourceClient {
    http: reqwest::Client,
    base_url: String,
    source: &'static str,
}

impl SourceClient {
    /// Build a client for `source` rooted at `base_url`.
    pub fn new(source: &'static str, base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("healthscope/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            source,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a path relative to the base URL.
    pub fn url(&self, path: &str) -> String {
        if path.is_empty() {
            self.base_url.clone()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }

    /// `GET {base}/{path}?{query}` and decode the body as JSON.
    pub async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let url = self.url(path);
        tracing::debug!(source = self.source, %url, "GET");

        let response = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.status_error(status, &body).into());
        }

        let bytes = response.bytes().await.map_err(|e| self.transport_error(e))?;
        serde_json::from_slice(&bytes).map_err(|e| {
            SourceError::MalformedResponse(format!("{}: {}", self.source, e)).into()
        })
    }

    fn transport_error(&self, err: reqwest::Error) -> AppError {
        let detail = if err.is_timeout() {
            format!("{}: request timed out", self.source)
        } else {
            format!("{}: {}", self.source, err)
        };
        SourceError::UpstreamUnavailable(detail).into()
    }

    fn status_error(&self, status: StatusCode, body: &str) -> SourceError {
        let snippet: String = body.chars().take(200).collect();
        let detail = format!("{} returned {}: {}", self.source, status.as_u16(), snippet.trim());
        classify_status(status, detail)
    }
}

/// Map a non-success HTTP status onto a [`SourceError`].
pub fn classify_status(status: StatusCode, detail: String) -> SourceError {
    match status {
        StatusCode::NOT_FOUND => SourceError::NotFound(detail),
        StatusCode::TOO_MANY_REQUESTS => SourceError::RateLimited(detail),
        _ => SourceError::UpstreamUnavailable(detail),
    }
}
