//! TOML-based configuration for healthscope
//!
//! Every field has a default, so an empty or missing `healthscope.toml` yields
//! a runnable configuration. Secrets are never stored in the file: the `[llm]`
//! section names the environment variable holding the API key.

use crate::agents::AgentKind;
use crate::agents::runner::RunnerConfig;
use crate::llm::{ModelParams, Provider};
use crate::research::coordinator::CoordinatorConfig;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "healthscope.toml";

/// Upper bound on `orchestration.per_agent_truncation_budget`, in characters.
pub const MAX_TRUNCATION_BUDGET: usize = 10_000_000;

/// Root configuration structure loaded from healthscope.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthscopeConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub orchestration: OrchestrationConfig,

    #[serde(default)]
    pub sources: SourcesConfig,

    #[serde(default)]
    pub agents: AgentsConfig,

    #[serde(default)]
    pub reports: ReportsConfig,
}

// ============= Server Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Fallback filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}

// ============= LLM Configuration =============

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Anthropic,
    /// OpenAI or any Chat Completions compatible endpoint
    OpenAI,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: ProviderKind,

    #[serde(default = "default_model")]
    pub model: String,

    /// Environment variable containing the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Base URL of an OpenAI-compatible endpoint (`provider = "openai"` only)
    pub api_base: Option<String>,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    pub temperature: Option<f32>,

    #[serde(default = "default_llm_timeout")]
    pub request_timeout_secs: u64,
}

fn default_model() -> String {
    "claude-3-5-sonnet-latest".to_string()
}

fn default_api_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_llm_timeout() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            api_base: None,
            max_tokens: default_max_tokens(),
            temperature: None,
            request_timeout_secs: default_llm_timeout(),
        }
    }
}

// ============= Orchestration Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationConfig {
    #[serde(default = "default_agent_timeout")]
    pub agent_timeout_secs: u64,

    #[serde(default = "default_synthesis_timeout")]
    pub synthesis_timeout_secs: u64,

    /// Extra synthesis attempts after the first one fails
    #[serde(default = "default_synthesis_retry_count")]
    pub synthesis_retry_count: u32,

    /// Initial backoff, doubled after every failed attempt
    #[serde(default = "default_synthesis_backoff")]
    pub synthesis_backoff_ms: u64,

    /// Characters of each agent's findings handed to synthesis
    #[serde(default = "default_truncation_budget")]
    pub per_agent_truncation_budget: usize,

    #[serde(default = "default_max_agent_iterations")]
    pub max_agent_iterations: usize,

    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_secs: u64,

    #[serde(default = "default_preview_chars")]
    pub tool_response_preview_chars: usize,

    #[serde(default = "default_tool_result_max_chars")]
    pub tool_result_max_chars: usize,

    /// Ask the LLM for per-agent prompts before fan-out
    #[serde(default = "default_true")]
    pub decompose: bool,

    /// Keep every progress event for the report trace
    #[serde(default = "default_true")]
    pub record_trace: bool,
}

fn default_agent_timeout() -> u64 {
    180
}

fn default_synthesis_timeout() -> u64 {
    120
}

fn default_synthesis_retry_count() -> u32 {
    2
}

fn default_synthesis_backoff() -> u64 {
    1000
}

fn default_truncation_budget() -> usize {
    6000
}

fn default_max_agent_iterations() -> usize {
    8
}

fn default_tool_timeout() -> u64 {
    30
}

fn default_preview_chars() -> usize {
    2000
}

fn default_tool_result_max_chars() -> usize {
    12_000
}

fn default_true() -> bool {
    true
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            agent_timeout_secs: default_agent_timeout(),
            synthesis_timeout_secs: default_synthesis_timeout(),
            synthesis_retry_count: default_synthesis_retry_count(),
            synthesis_backoff_ms: default_synthesis_backoff(),
            per_agent_truncation_budget: default_truncation_budget(),
            max_agent_iterations: default_max_agent_iterations(),
            tool_timeout_secs: default_tool_timeout(),
            tool_response_preview_chars: default_preview_chars(),
            tool_result_max_chars: default_tool_result_max_chars(),
            decompose: true,
            record_trace: true,
        }
    }
}

// ============= Data Source Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Per-request timeout of the public API HTTP clients
    #[serde(default = "default_source_timeout")]
    pub request_timeout_secs: u64,

    pub epht_base_url: Option<String>,
    pub open_data_base_url: Option<String>,
    pub healthcare_gov_base_url: Option<String>,
    pub openfda_base_url: Option<String>,
    pub medlineplus_base_url: Option<String>,
}

fn default_source_timeout() -> u64 {
    30
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_source_timeout(),
            epht_base_url: None,
            open_data_base_url: None,
            healthcare_gov_base_url: None,
            openfda_base_url: None,
            medlineplus_base_url: None,
        }
    }
}

impl SourcesConfig {
    /// Configured base URL for `kind`, or its public default.
    pub fn base_url(&self, kind: AgentKind) -> &str {
        let configured = match kind {
            AgentKind::Epht => &self.epht_base_url,
            AgentKind::OpenData => &self.open_data_base_url,
            AgentKind::HealthcareGov => &self.healthcare_gov_base_url,
            AgentKind::Openfda => &self.openfda_base_url,
            AgentKind::Medlineplus => &self.medlineplus_base_url,
        };
        configured.as_deref().unwrap_or(kind.default_base_url())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// ============= Agent Roster Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentsConfig {
    /// Agent ids to run, in report order
    #[serde(default = "default_roster")]
    pub roster: Vec<String>,

    /// Per-agent timeout overrides in seconds, keyed by agent id
    #[serde(default)]
    pub timeouts: BTreeMap<String, u64>,
}

fn default_roster() -> Vec<String> {
    vec![
        AgentKind::Medlineplus.id().to_string(),
        AgentKind::Openfda.id().to_string(),
        AgentKind::OpenData.id().to_string(),
        AgentKind::HealthcareGov.id().to_string(),
    ]
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            roster: default_roster(),
            timeouts: BTreeMap::new(),
        }
    }
}

impl AgentsConfig {
    /// Parse the roster into agent kinds, preserving order.
    pub fn kinds(&self) -> Result<Vec<AgentKind>, ConfigError> {
        self.roster
            .iter()
            .map(|id| id.parse::<AgentKind>().map_err(ConfigError::ValidationError))
            .collect()
    }
}

// ============= Report Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_report_dir")]
    pub directory: PathBuf,

    /// Also write `<report>.trace.jsonl` with every progress event
    #[serde(default)]
    pub write_trace: bool,
}

fn default_report_dir() -> PathBuf {
    PathBuf::from("reports")
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: default_report_dir(),
            write_trace: false,
        }
    }
}

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Environment variable '{0}' referenced in config is not set")]
    MissingEnvVar(String),
}

impl HealthscopeConfig {
    /// Load and validate configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config = Self::parse(&content)?;
        Ok(config)
    }

    /// Like [`load`](Self::load), but a missing file yields the defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        match Self::load(&path) {
            Err(ConfigError::FileNotFound(p)) => {
                tracing::warn!(path = %p.display(), "config file not found, using defaults");
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
            other => other,
        }
    }

    /// Parse and validate configuration text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: HealthscopeConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration for internal consistency
    ///
    /// Does not require the LLM key to be present; that is checked when the
    /// provider is built so `agents` and `init` work without credentials.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let kinds = self.agents.kinds()?;
        if kinds.is_empty() {
            return Err(ConfigError::ValidationError(
                "agents.roster must name at least one agent".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for kind in &kinds {
            if !seen.insert(*kind) {
                return Err(ConfigError::ValidationError(format!(
                    "agent '{}' appears twice in agents.roster",
                    kind
                )));
            }
        }
        for id in self.agents.timeouts.keys() {
            id.parse::<AgentKind>().map_err(|e| {
                ConfigError::ValidationError(format!("agents.timeouts: {}", e))
            })?;
        }

        let orch = &self.orchestration;
        if orch.per_agent_truncation_budget == 0
            || orch.per_agent_truncation_budget > MAX_TRUNCATION_BUDGET
        {
            return Err(ConfigError::ValidationError(format!(
                "orchestration.per_agent_truncation_budget must be within 1..={}",
                MAX_TRUNCATION_BUDGET
            )));
        }
        if orch.max_agent_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "orchestration.max_agent_iterations must be positive".to_string(),
            ));
        }
        if orch.tool_timeout_secs == 0 || orch.synthesis_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "orchestration tool and synthesis timeouts must be positive".to_string(),
            ));
        }
        if orch.tool_response_preview_chars == 0 || orch.tool_result_max_chars == 0 {
            return Err(ConfigError::ValidationError(
                "orchestration character budgets must be positive".to_string(),
            ));
        }
        if self.sources.request_timeout_secs == 0 || self.llm.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "request timeouts must be positive".to_string(),
            ));
        }
        if let Some(t) = self.llm.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(ConfigError::ValidationError(format!(
                    "llm.temperature {} is outside 0.0..=2.0",
                    t
                )));
            }
        }
        if self.llm.provider == ProviderKind::Anthropic && self.llm.api_base.is_some() {
            return Err(ConfigError::ValidationError(
                "llm.api_base is only supported with provider = \"openai\"".to_string(),
            ));
        }
        if self.llm.model.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "llm.model must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Get a resolved value from an env var reference
    pub fn resolve_env(&self, env_name: &str) -> Option<String> {
        std::env::var(env_name).ok().filter(|v| !v.trim().is_empty())
    }

    /// Build the LLM provider, reading the API key from the environment.
    pub fn llm_provider(&self) -> Result<Provider, ConfigError> {
        let llm = &self.llm;
        let params = ModelParams {
            max_tokens: llm.max_tokens,
            temperature: llm.temperature,
            request_timeout: Duration::from_secs(llm.request_timeout_secs),
        };

        match llm.provider {
            ProviderKind::Anthropic => {
                let api_key = self
                    .resolve_env(&llm.api_key_env)
                    .ok_or_else(|| ConfigError::MissingEnvVar(llm.api_key_env.clone()))?;
                Ok(Provider::Anthropic {
                    api_key,
                    model: llm.model.clone(),
                    params,
                })
            }
            ProviderKind::OpenAI => {
                // Local compatible gateways often run without a key.
                let api_key = match (&llm.api_base, self.resolve_env(&llm.api_key_env)) {
                    (_, Some(key)) => key,
                    (Some(_), None) => String::new(),
                    (None, None) => return Err(ConfigError::MissingEnvVar(llm.api_key_env.clone())),
                };
                Ok(Provider::OpenAI {
                    api_key,
                    api_base: llm
                        .api_base
                        .clone()
                        .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
                    model: llm.model.clone(),
                    params,
                })
            }
        }
    }

    /// Orchestration settings in the coordinator's terms.
    pub fn coordinator_config(&self) -> CoordinatorConfig {
        let orch = &self.orchestration;
        let agent_timeouts: HashMap<String, Duration> = self
            .agents
            .timeouts
            .iter()
            .map(|(id, secs)| (id.clone(), Duration::from_secs(*secs)))
            .collect();

        CoordinatorConfig {
            agent_timeout: Duration::from_secs(orch.agent_timeout_secs),
            agent_timeouts,
            synthesis_timeout: Duration::from_secs(orch.synthesis_timeout_secs),
            synthesis_retry_count: orch.synthesis_retry_count,
            synthesis_backoff: Duration::from_millis(orch.synthesis_backoff_ms),
            per_agent_truncation_budget: orch.per_agent_truncation_budget,
            decompose: orch.decompose,
            record_trace: orch.record_trace || self.reports.write_trace,
            runner: RunnerConfig {
                max_iterations: orch.max_agent_iterations,
                tool_timeout: Duration::from_secs(orch.tool_timeout_secs),
                preview_chars: orch.tool_response_preview_chars,
                tool_result_max_chars: orch.tool_result_max_chars,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> String {
        r#"
[server]
host = "0.0.0.0"
port = 8080
log_format = "json"

[llm]
provider = "openai"
model = "gpt-4o-mini"
api_key_env = "HEALTHSCOPE_TEST_UNSET_KEY"
api_base = "http://localhost:8000/v1"

[orchestration]
agent_timeout_secs = 60
synthesis_retry_count = 1
decompose = false

[sources]
openfda_base_url = "http://localhost:9000"

[agents]
roster = ["openfda", "epht"]
timeouts = { epht = 0 }

[reports]
directory = "out"
write_trace = true
"#
        .to_string()
    }

    #[test]
    fn test_parse_config() {
        let config = HealthscopeConfig::parse(&create_test_config()).unwrap();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.log_format, LogFormat::Json);
        assert_eq!(config.llm.provider, ProviderKind::OpenAI);
        assert_eq!(
            config.agents.kinds().unwrap(),
            vec![AgentKind::Openfda, AgentKind::Epht]
        );
        assert_eq!(config.sources.base_url(AgentKind::Openfda), "http://localhost:9000");
        assert_eq!(
            config.sources.base_url(AgentKind::Epht),
            AgentKind::Epht.default_base_url()
        );
    }

    #[test]
    fn test_defaults() {
        let config = HealthscopeConfig::parse("").unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.orchestration.synthesis_retry_count, 2);
        assert_eq!(config.agents.roster.len(), 4);
        assert!(config.orchestration.decompose);
        assert!(config.reports.enabled);
    }

    #[test]
    fn test_coordinator_config_mapping() {
        let config = HealthscopeConfig::parse(&create_test_config()).unwrap();
        let cc = config.coordinator_config();
        assert_eq!(cc.agent_timeout, Duration::from_secs(60));
        assert_eq!(cc.timeout_for("epht"), Duration::ZERO);
        assert_eq!(cc.timeout_for("openfda"), Duration::from_secs(60));
        assert_eq!(cc.synthesis_retry_count, 1);
        assert!(!cc.decompose);
        assert!(cc.record_trace);
    }

    #[test]
    fn test_validation_rejects_bad_rosters() {
        let unknown = HealthscopeConfig::parse("[agents]\nroster = [\"cdc_wonder\"]");
        assert!(matches!(unknown, Err(ConfigError::ValidationError(_))));

        let empty = HealthscopeConfig::parse("[agents]\nroster = []");
        assert!(matches!(empty, Err(ConfigError::ValidationError(_))));

        let dup = HealthscopeConfig::parse("[agents]\nroster = [\"epht\", \"epht\"]");
        assert!(matches!(dup, Err(ConfigError::ValidationError(_))));

        let bad_override = HealthscopeConfig::parse("[agents.timeouts]\nwonder = 3");
        assert!(matches!(bad_override, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validation_rejects_zero_budgets() {
        let result =
            HealthscopeConfig::parse("[orchestration]\nper_agent_truncation_budget = 0");
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));

        let result = HealthscopeConfig::parse("[orchestration]\nmax_agent_iterations = 0");
        assert!(result.is_err());

        let result = HealthscopeConfig::parse(&format!(
            "[orchestration]\nper_agent_truncation_budget = {}",
            MAX_TRUNCATION_BUDGET + 1
        ));
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validation_rejects_anthropic_api_base() {
        let result = HealthscopeConfig::parse(
            "[llm]\nprovider = \"anthropic\"\napi_base = \"http://localhost:9999\"",
        );
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_llm_provider_requires_key() {
        let mut config = HealthscopeConfig::default();
        config.llm.api_key_env = "HEALTHSCOPE_TEST_DEFINITELY_UNSET".to_string();
        assert!(matches!(
            config.llm_provider(),
            Err(ConfigError::MissingEnvVar(_))
        ));

        // Compatible gateway with an explicit base runs keyless.
        let config = HealthscopeConfig::parse(&create_test_config()).unwrap();
        let provider = config.llm_provider().unwrap();
        assert_eq!(provider.name(), "OpenAI");
        assert_eq!(provider.model(), "gpt-4o-mini");
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config =
            HealthscopeConfig::load_or_default(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.server.port, 3000);
        assert!(matches!(
            HealthscopeConfig::load(dir.path().join("absent.toml")),
            Err(ConfigError::FileNotFound(_))
        ));
    }
}
