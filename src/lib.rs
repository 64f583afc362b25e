//! # healthscope
//!
//! A multi-agent health data research server. One natural-language question
//! is fanned out to specialized agents, each backed by a public health API,
//! and their findings are synthesized by an LLM into a single markdown report.
//!
//! | Agent            | Data source                                   |
//! |------------------|-----------------------------------------------|
//! | `epht`           | CDC Environmental Public Health Tracking      |
//! | `open_data`      | CDC Open Data (Socrata)                       |
//! | `healthcare_gov` | data.healthcare.gov                           |
//! | `openfda`        | openFDA drug endpoints                        |
//! | `medlineplus`    | MedlinePlus Connect                           |
//!
//! healthscope can be used in two ways:
//!
//! 1. **As a server** - run the `healthscope-server` binary and `POST /api/query`
//! 2. **As a library** - build a [`Coordinator`] and call [`Coordinator::run`]
//!
//! ## Library usage
//!
//! ```rust,ignore
//! use healthscope::{AppState, HealthscopeConfig, research::EventSender};
//!
//! let config = HealthscopeConfig::load_or_default("healthscope.toml")?;
//! let state = AppState::from_config(config)?;
//! let run = state
//!     .coordinator
//!     .run("Drug recalls for metformin this year", EventSender::detached())
//!     .await?;
//! println!("{}", run.final_report.unwrap_or_default());
//! ```
//!
//! ## Modules
//!
//! - [`agents`] - Agent specs, the tool loop and its decision step
//! - [`api`] - Streaming HTTP API
//! - [`llm`] - LLM client implementations
//! - [`reports`] - Markdown report persistence
//! - [`research`] - Fan-out, join and synthesis
//! - [`tools`] - Public health API tools
//! - [`types`] - Common types and error handling

/// Data-source agents and the agent tool loop.
pub mod agents;
/// HTTP API handlers and routes.
pub mod api;
/// Command-line interface.
pub mod cli;
/// LLM provider clients and abstractions.
pub mod llm;
/// Report persistence.
pub mod reports;
/// Multi-agent research coordination.
pub mod research;
/// Public health data source tools.
pub mod tools;
/// Core types (requests, responses, errors).
pub mod types;
/// Configuration and text utilities.
pub mod utils;

// Re-export commonly used types
pub use agents::{AgentKind, AgentRegistry, AgentSpec, LlmDecider};
pub use api::routes::build_app;
pub use llm::{LLMClient, LLMResponse, Provider};
pub use reports::{FileReportSink, ReportSink};
pub use research::{Coordinator, CoordinatorConfig};
pub use tools::registry::ToolRegistry;
pub use types::{AppError, Result};
pub use utils::toml_config::{ConfigError, HealthscopeConfig};

use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Loaded configuration
    pub config: Arc<HealthscopeConfig>,
    /// Coordinator running every query
    pub coordinator: Arc<Coordinator>,
}

impl AppState {
    pub fn new(config: Arc<HealthscopeConfig>, coordinator: Arc<Coordinator>) -> Self {
        Self {
            config,
            coordinator,
        }
    }

    /// Wire the LLM provider, agent roster and report sink described by `config`.
    pub fn from_config(config: HealthscopeConfig) -> Result<Self> {
        let provider = config
            .llm_provider()
            .map_err(|e| AppError::Configuration(e.to_string()))?;
        tracing::info!(provider = provider.name(), model = provider.model(), "LLM provider configured");
        let llm = provider.create_client()?;

        let agents = Arc::new(AgentRegistry::from_config(&config)?);
        let decider = Arc::new(LlmDecider::new(llm.clone()));
        let mut coordinator = Coordinator::new(config.coordinator_config(), llm, decider, agents);

        if config.reports.enabled {
            coordinator = coordinator.with_report_sink(Arc::new(FileReportSink::new(
                config.reports.directory.clone(),
                config.reports.write_trace,
            )));
        }

        Ok(Self::new(Arc::new(config), Arc::new(coordinator)))
    }
}
