//! LLM Provider Clients and Abstractions
//!
//! This module provides a unified interface for the text-completion service used
//! to decompose queries, drive each agent's tool loop, and synthesize the final
//! report. Provider-specific wire formats live behind the [`LLMClient`] trait, so
//! the orchestration code never sees HTTP details and tests can plug in scripted
//! clients.
//!
//! # Supported Providers
//!
//! - `anthropic` - Anthropic Messages API (requires `anthropic` feature)
//! - `openai` - OpenAI Chat Completions API and compatible gateways (requires `openai` feature)
//!
//! # Example
//!
//! ```ignore
//! use healthscope::llm::{LLMClient, ModelParams, Provider};
//!
//! let provider = Provider::OpenAI {
//!     api_key: key,
//!     api_base: "https://api.openai.com/v1".into(),
//!     model: "gpt-4o-mini".into(),
//!     params: ModelParams::default(),
//! };
//! let client = provider.create_client()?;
//! let text = client.generate("What is 2+2?").await?;
//! ```

/// Core LLM client trait, conversation messages and provider selection.
pub mod client;

/// Anthropic Messages API client.
#[cfg(feature = "anthropic")]
pub mod anthropic;

/// OpenAI Chat Completions client.
#[cfg(feature = "openai")]
pub mod openai;

pub use client::{ConversationMessage, LLMClient, LLMResponse, MessageRole, ModelParams, Provider};
