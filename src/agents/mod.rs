//! Data-source agents.
//!
//! An agent is a fixed pairing of a role prompt and one data source's tools.
//! The set of agents is a closed enum ([`AgentKind`]); the roster for a
//! deployment is resolved once at startup into immutable [`AgentSpec`]s.

pub mod decision;
pub mod registry;
pub mod runner;

use crate::tools::{self, SourceClient, ToolRegistry};
use crate::types::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

pub use decision::{Decider, Decision, DecisionContext, LlmDecider};
pub use registry::AgentRegistry;
pub use runner::{AgentOutcome, AgentRunner, InvocationLog, ToolInvocation};

const NO_FOLLOW_UPS: &str = "You cannot ask follow-up questions. Research and address the prompt as thoroughly as your tools allow. If the prompt is unrelated to your data source, say so briefly.";

/// The data sources an agent can be specialized for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    /// CDC Environmental Public Health Tracking
    Epht,
    /// CDC Open Data (Socrata)
    OpenData,
    /// data.healthcare.gov
    HealthcareGov,
    /// openFDA
    Openfda,
    /// MedlinePlus Connect
    Medlineplus,
}

impl AgentKind {
    pub const ALL: [AgentKind; 5] = [
        AgentKind::Epht,
        AgentKind::OpenData,
        AgentKind::HealthcareGov,
        AgentKind::Openfda,
        AgentKind::Medlineplus,
    ];

    /// Stable identifier used in events, config and reports.
    pub fn id(&self) -> &'static str {
        match self {
            AgentKind::Epht => "epht",
            AgentKind::OpenData => "open_data",
            AgentKind::HealthcareGov => "healthcare_gov",
            AgentKind::Openfda => "openfda",
            AgentKind::Medlineplus => "medlineplus",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            AgentKind::Epht => "Environmental health and air quality specialist",
            AgentKind::OpenData => "CDC surveillance and public health data specialist",
            AgentKind::HealthcareGov => "Healthcare marketplace and access specialist",
            AgentKind::Openfda => "FDA drug safety and regulatory data specialist",
            AgentKind::Medlineplus => "Patient education and health information specialist",
        }
    }

    /// System prompt describing what the agent should focus on.
    pub fn role(&self) -> String {
        let focus = match self {
            AgentKind::Epht => {
                "You are a CDC Environmental Public Health Tracking agent. Focus on:\n\
                 - Air quality measures (PM2.5, ozone, air toxics)\n\
                 - Drinking water quality and climate-related health impacts\n\
                 - Health outcomes linked to environmental exposures\n\
                 - Community health profiles for a state or county\n\
                 Find relevant measure ids first, then query them."
            }
            AgentKind::OpenData => {
                "You are a CDC Open Data agent. Focus on:\n\
                 - COVID-19 surveillance data\n\
                 - General health surveillance datasets\n\
                 - Disease outbreak and monitoring data\n\
                 - Public health statistics and trends"
            }
            AgentKind::HealthcareGov => {
                "You are a Healthcare.gov agent. Focus on:\n\
                 - Healthcare marketplace plans and coverage\n\
                 - Provider networks and facility data\n\
                 - Healthcare accessibility analysis\n\
                 - Insurance coverage patterns and trends"
            }
            AgentKind::Openfda => {
                "You are an openFDA agent. Focus on:\n\
                 - Drug adverse event reports\n\
                 - Drug recalls and enforcement actions\n\
                 - Drug labeling: warnings, indications, dosage\n\
                 - Medical device adverse events\n\
                 - Regulatory safety monitoring; use the safety profile for a one-call overview"
            }
            AgentKind::Medlineplus => {
                "You are a MedlinePlus Connect agent. Focus on:\n\
                 - Health topic information and patient education materials\n\
                 - Medical condition explanations and treatment options\n\
                 - Medication information, interactions and side effects\n\
                 - Easy-to-understand information for patients and families\n\
                 - Materials in the patient's language where relevant"
            }
        };
        format!(
            "{}\n\n{}\nEnd with a concise summary of the concrete data points you found, citing the tool each came from.",
            focus, NO_FOLLOW_UPS
        )
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            AgentKind::Epht => tools::epht::DEFAULT_BASE_URL,
            AgentKind::OpenData => tools::open_data::DEFAULT_BASE_URL,
            AgentKind::HealthcareGov => tools::healthcare_gov::DEFAULT_BASE_URL,
            AgentKind::Openfda => tools::openfda::DEFAULT_BASE_URL,
            AgentKind::Medlineplus => tools::medlineplus::DEFAULT_BASE_URL,
        }
    }

    /// Build this kind's tool set against `base_url`.
    pub fn build_tools(&self, base_url: &str, timeout: Duration) -> Result<ToolRegistry> {
        let client = SourceClient::new(self.id(), base_url, timeout)?;
        let mut registry = ToolRegistry::new();
        match self {
            AgentKind::Epht => tools::epht::register(&mut registry, client),
            AgentKind::OpenData => tools::open_data::register(&mut registry, client),
            AgentKind::HealthcareGov => tools::healthcare_gov::register(&mut registry, client),
            AgentKind::Openfda => tools::openfda::register(&mut registry, client),
            AgentKind::Medlineplus => tools::medlineplus::register(&mut registry, client),
        }
        Ok(registry)
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for AgentKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        AgentKind::ALL
            .into_iter()
            .find(|k| k.id() == s)
            .ok_or_else(|| {
                let ids: Vec<&str> = AgentKind::ALL.iter().map(|k| k.id()).collect();
                format!("unknown agent '{}', expected one of: {}", s, ids.join(", "))
            })
    }
}

/// Immutable description of one agent in the roster.
#[derive(Clone)]
pub struct AgentSpec {
    pub kind: AgentKind,
    pub id: String,
    pub description: String,
    pub role: String,
    pub tools: Arc<ToolRegistry>,
}

impl AgentSpec {
    /// Spec for `kind` with the given tool set and the kind's default identity.
    pub fn new(kind: AgentKind, tools: ToolRegistry) -> Self {
        Self {
            kind,
            id: kind.id().to_string(),
            description: kind.description().to_string(),
            role: kind.role(),
            tools: Arc::new(tools),
        }
    }

    /// Spec for `kind` talking to its public API at `base_url`.
    pub fn for_source(kind: AgentKind, base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self::new(kind, kind.build_tools(base_url, timeout)?))
    }
}

impl fmt::Debug for AgentSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentSpec")
            .field("id", &self.id)
            .field("tools", &self.tools.tool_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(AgentKind::Epht, 6)]
    #[case(AgentKind::OpenData, 3)]
    #[case(AgentKind::HealthcareGov, 3)]
    #[case(AgentKind::Openfda, 5)]
    #[case(AgentKind::Medlineplus, 3)]
    fn test_build_tools_per_kind(#[case] kind: AgentKind, #[case] expected: usize) {
        let tools = kind
            .build_tools(kind.default_base_url(), Duration::from_secs(5))
            .unwrap();
        assert_eq!(tools.len(), expected);
        for def in tools.get_tool_definitions() {
            assert!(def.parameters.is_object(), "{} schema", def.name);
        }
    }

    #[test]
    fn test_kind_ids_round_trip_through_from_str() {
        for kind in AgentKind::ALL {
            assert_eq!(kind.id().parse::<AgentKind>().unwrap(), kind);
        }
        assert!("cdc_wonder".parse::<AgentKind>().is_err());
    }

    #[test]
    fn test_serde_uses_ids() {
        let json = serde_json::to_string(&AgentKind::HealthcareGov).unwrap();
        assert_eq!(json, "\"healthcare_gov\"");
    }

    #[test]
    fn test_role_mentions_follow_up_rule() {
        assert!(AgentKind::Openfda.role().contains("cannot ask follow-up questions"));
    }
}
