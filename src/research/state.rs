//! Run state: the validated query, per-agent prompts and outcomes, and the
//! phase machine a run moves through.

use crate::agents::{AgentOutcome, ToolInvocation};
use crate::research::events::ProgressEvent;
use crate::types::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Upper bound on query length, in characters.
pub const MAX_QUERY_CHARS: usize = 4000;

/// A validated user query: trimmed, non-empty, bounded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Query(String);

impl Query {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(AppError::InvalidInput("Query must not be empty".to_string()));
        }
        let len = trimmed.chars().count();
        if len > MAX_QUERY_CHARS {
            return Err(AppError::InvalidInput(format!(
                "Query is {} characters; the limit is {}",
                len, MAX_QUERY_CHARS
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a sub-prompt was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptSource {
    /// Per-agent prompt from the decomposition call.
    Decomposed,
    /// One research prompt from the decomposition call shared by all agents.
    Shared,
    /// Deterministic template built without the LLM.
    Fallback,
}

/// The task text handed to one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubPrompt {
    pub agent_id: String,
    pub text: String,
    pub source: PromptSource,
}

/// Phases of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Accepted,
    Decomposing,
    AgentsRunning,
    Joining,
    Synthesizing,
    Completed,
    Degraded,
}

impl RunPhase {
    pub fn can_transition_to(self, next: RunPhase) -> bool {
        use RunPhase::*;
        matches!(
            (self, next),
            (Accepted, Decomposing)
                | (Decomposing, AgentsRunning)
                | (AgentsRunning, Joining)
                | (Joining, Synthesizing)
                | (Synthesizing, Completed)
                | (Synthesizing, Degraded)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunPhase::Completed | RunPhase::Degraded)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunPhase::Accepted => "accepted",
            RunPhase::Decomposing => "decomposing",
            RunPhase::AgentsRunning => "agents_running",
            RunPhase::Joining => "joining",
            RunPhase::Synthesizing => "synthesizing",
            RunPhase::Completed => "completed",
            RunPhase::Degraded => "degraded",
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What one agent produced in a run.
#[derive(Debug, Clone, Serialize)]
pub struct AgentRecord {
    pub agent_id: String,
    pub description: String,
    pub outcome: AgentOutcome,
    pub invocations: Vec<ToolInvocation>,
}

impl AgentRecord {
    /// Distinct tool names in first-use order.
    pub fn tools_used(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for inv in &self.invocations {
            if !names.contains(&inv.tool.as_str()) {
                names.push(&inv.tool);
            }
        }
        names
    }
}

/// Everything known about one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunState {
    pub run_id: Uuid,
    pub query: Query,
    pub phase: RunPhase,
    pub sub_prompts: Vec<SubPrompt>,
    pub agents: Vec<AgentRecord>,
    pub final_report: Option<String>,
    pub synthesis_error: Option<String>,
    #[serde(skip)]
    pub trace: Option<Vec<ProgressEvent>>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunState {
    pub fn new(query: Query) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            query,
            phase: RunPhase::Accepted,
            sub_prompts: Vec::new(),
            agents: Vec::new(),
            final_report: None,
            synthesis_error: None,
            trace: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Move to `next`, rejecting transitions the phase machine does not allow.
    pub fn advance(&mut self, next: RunPhase) -> Result<()> {
        if !self.phase.can_transition_to(next) {
            return Err(AppError::Internal(format!(
                "illegal run phase transition {} -> {}",
                self.phase, next
            )));
        }
        tracing::info!(run_id = %self.run_id, from = %self.phase, to = %next, "run phase");
        self.phase = next;
        if next.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Store one agent's record; each agent id may be recorded once.
    pub fn record_agent(&mut self, record: AgentRecord) -> Result<()> {
        if self.agents.iter().any(|a| a.agent_id == record.agent_id) {
            return Err(AppError::Internal(format!(
                "outcome for agent '{}' recorded twice",
                record.agent_id
            )));
        }
        self.agents.push(record);
        Ok(())
    }

    pub fn agent(&self, agent_id: &str) -> Option<&AgentRecord> {
        self.agents.iter().find(|a| a.agent_id == agent_id)
    }

    pub fn sub_prompt(&self, agent_id: &str) -> Option<&SubPrompt> {
        self.sub_prompts.iter().find(|p| p.agent_id == agent_id)
    }

    /// True when no agent produced usable output.
    pub fn all_agents_failed(&self) -> bool {
        !self.agents.is_empty() && self.agents.iter().all(|a| a.outcome.is_failure())
    }

    /// Short prefix of the run id used in file names.
    pub fn short_id(&self) -> String {
        self.run_id.simple().to_string()[..8].to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_query_validation() {
        assert!(matches!(Query::parse("   "), Err(AppError::InvalidInput(_))));
        assert_eq!(Query::parse("  asthma in Ohio \n").unwrap().as_str(), "asthma in Ohio");
        let long = "a".repeat(MAX_QUERY_CHARS + 1);
        assert!(Query::parse(&long).is_err());
        assert!(Query::parse(&"a".repeat(MAX_QUERY_CHARS)).is_ok());
    }

    #[test]
    fn test_phase_machine_happy_path() {
        let mut state = RunState::new(Query::parse("q").unwrap());
        for phase in [
            RunPhase::Decomposing,
            RunPhase::AgentsRunning,
            RunPhase::Joining,
            RunPhase::Synthesizing,
            RunPhase::Completed,
        ] {
            state.advance(phase).unwrap();
        }
        assert!(state.finished_at.is_some());
    }

    #[test]
    fn test_phase_machine_rejects_skips() {
        let mut state = RunState::new(Query::parse("q").unwrap());
        assert!(state.advance(RunPhase::Synthesizing).is_err());
        assert_eq!(state.phase, RunPhase::Accepted);
        assert!(!RunPhase::Completed.can_transition_to(RunPhase::Decomposing));
        assert!(RunPhase::Synthesizing.can_transition_to(RunPhase::Degraded));
    }

    #[test]
    fn test_record_agent_uniqueness() {
        let mut state = RunState::new(Query::parse("q").unwrap());
        let record = AgentRecord {
            agent_id: "openfda".into(),
            description: "FDA".into(),
            outcome: AgentOutcome::TimedOut {
                after: Duration::from_secs(1),
            },
            invocations: Vec::new(),
        };
        state.record_agent(record.clone()).unwrap();
        assert!(state.record_agent(record).is_err());
        assert!(state.all_agents_failed());
        assert_eq!(state.short_id().len(), 8);
    }
}
