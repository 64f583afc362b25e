//! Agent roster resolved at startup.
//!
//! The registry is immutable once built and shared through `Arc`; a run reads
//! the specs in roster order.

use crate::agents::{AgentKind, AgentSpec};
use crate::types::{AgentInfo, AppError, Result};
use crate::utils::toml_config::HealthscopeConfig;
use std::collections::HashSet;
use std::sync::Arc;

/// Ordered, duplicate-free set of agent specs.
#[derive(Debug, Clone)]
pub struct AgentRegistry {
    specs: Vec<Arc<AgentSpec>>,
}

impl AgentRegistry {
    /// Registry over prebuilt specs; agent ids must be unique.
    pub fn from_specs(specs: Vec<AgentSpec>) -> Result<Self> {
        let mut seen = HashSet::new();
        for spec in &specs {
            if !seen.insert(spec.id.clone()) {
                return Err(AppError::Configuration(format!(
                    "agent '{}' registered twice",
                    spec.id
                )));
            }
        }
        Ok(Self {
            specs: specs.into_iter().map(Arc::new).collect(),
        })
    }

    /// Build the configured roster against the configured source URLs.
    pub fn from_config(config: &HealthscopeConfig) -> Result<Self> {
        let kinds = config
            .agents
            .kinds()
            .map_err(|e| AppError::Configuration(e.to_string()))?;
        let timeout = config.sources.request_timeout();

        let specs = kinds
            .into_iter()
            .map(|kind| AgentSpec::for_source(kind, config.sources.base_url(kind), timeout))
            .collect::<Result<Vec<_>>>()?;

        tracing::info!(
            agents = ?specs.iter().map(|s| s.id.as_str()).collect::<Vec<_>>(),
            "agent roster resolved"
        );
        Self::from_specs(specs)
    }

    pub fn specs(&self) -> &[Arc<AgentSpec>] {
        &self.specs
    }

    pub fn get(&self, id: &str) -> Option<Arc<AgentSpec>> {
        self.specs.iter().find(|s| s.id == id).cloned()
    }

    pub fn kinds(&self) -> Vec<AgentKind> {
        self.specs.iter().map(|s| s.kind).collect()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Public listing of the roster.
    pub fn agent_infos(&self) -> Vec<AgentInfo> {
        self.specs
            .iter()
            .map(|spec| AgentInfo {
                id: spec.id.clone(),
                description: spec.description.clone(),
                tools: spec.tools.tool_names(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolRegistry;

    #[test]
    fn test_from_config_follows_roster_order() {
        let config = HealthscopeConfig::default();
        let registry = AgentRegistry::from_config(&config).unwrap();
        assert_eq!(
            registry.kinds(),
            vec![
                AgentKind::Medlineplus,
                AgentKind::Openfda,
                AgentKind::OpenData,
                AgentKind::HealthcareGov
            ]
        );
        assert!(registry.get("openfda").is_some());
        assert!(registry.get("epht").is_none());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let specs = vec![
            AgentSpec::new(AgentKind::Epht, ToolRegistry::new()),
            AgentSpec::new(AgentKind::Epht, ToolRegistry::new()),
        ];
        assert!(matches!(
            AgentRegistry::from_specs(specs),
            Err(AppError::Configuration(_))
        ));
    }

    #[test]
    fn test_agent_infos_list_tools() {
        let registry = AgentRegistry::from_config(&HealthscopeConfig::default()).unwrap();
        let infos = registry.agent_infos();
        let fda = infos.iter().find(|i| i.id == "openfda").unwrap();
        assert!(fda.tools.contains(&"fda_drug_recalls".to_string()));
    }
}
