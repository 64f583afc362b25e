use crate::agents::runner::{RunnerConfig, TIMEOUT};
use crate::agents::{AgentOutcome, AgentRegistry, AgentRunner, Decider, InvocationLog};
use crate::llm::LLMClient;
use crate::reports::ReportSink;
use crate::research::events::{COORDINATOR, EventSender, SYSTEM};
use crate::research::prompts;
use crate::research::state::{AgentRecord, Query, RunPhase, RunState, SubPrompt};
use crate::types::{AppError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{sleep, timeout};

/// Orchestration knobs for one coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub agent_timeout: Duration,
    /// Overrides of `agent_timeout` keyed by agent id.
    pub agent_timeouts: HashMap<String, Duration>,
    /// Per-attempt limit for decomposition and synthesis calls.
    pub synthesis_timeout: Duration,
    /// Extra synthesis attempts after the first failure.
    pub synthesis_retry_count: u32,
    /// First backoff delay, doubled per retry.
    pub synthesis_backoff: Duration,
    pub per_agent_truncation_budget: usize,
    pub decompose: bool,
    pub record_trace: bool,
    pub runner: RunnerConfig,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            agent_timeout: Duration::from_secs(180),
            agent_timeouts: HashMap::new(),
            synthesis_timeout: Duration::from_secs(120),
            synthesis_retry_count: 2,
            synthesis_backoff: Duration::from_secs(1),
            per_agent_truncation_budget: 6000,
            decompose: true,
            record_trace: true,
            runner: RunnerConfig::default(),
        }
    }
}

impl CoordinatorConfig {
    pub fn timeout_for(&self, agent_id: &str) -> Duration {
        self.agent_timeouts
            .get(agent_id)
            .copied()
            .unwrap_or(self.agent_timeout)
    }
}

/// Fans a query out to every agent in the roster and synthesizes one report.
pub struct Coordinator {
    config: CoordinatorConfig,
    llm: Arc<dyn LLMClient>,
    decider: Arc<dyn Decider>,
    agents: Arc<AgentRegistry>,
    sink: Option<Arc<dyn ReportSink>>,
}

struct Slot {
    index: usize,
    agent_id: String,
    log: InvocationLog,
}

impl Coordinator {
    pub fn new(
        config: CoordinatorConfig,
        llm: Arc<dyn LLMClient>,
        decider: Arc<dyn Decider>,
        agents: Arc<AgentRegistry>,
    ) -> Self {
        Self {
            config,
            llm,
            decider,
            agents,
            sink: None,
        }
    }

    /// Persist every finished run through `sink`.
    pub fn with_report_sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn agents(&self) -> &AgentRegistry {
        &self.agents
    }

    /// Execute one run end to end.
    ///
    /// Emits exactly one terminal event: `final_report`, or a fatal `error`
    /// when the query is invalid or nothing usable was produced.
    pub async fn run(&self, raw_query: &str, events: EventSender) -> Result<RunState> {
        let events = if self.config.record_trace {
            events.with_trace()
        } else {
            events
        };

        let query = match Query::parse(raw_query) {
            Ok(q) => q,
            Err(e) => {
                tracing::info!(error = %e, "query rejected");
                events.error(SYSTEM, e.kind(), e.to_string(), true);
                return Err(e);
            }
        };

        let mut state = RunState::new(query);
        tracing::info!(run_id = %state.run_id, agents = self.agents.len(), "run accepted");
        events.phase(
            COORDINATOR,
            format!("Run {} accepted with {} agents", state.short_id(), self.agents.len()),
        );

        state.advance(RunPhase::Decomposing)?;
        events.phase(COORDINATOR, "Preparing agent prompts");
        state.sub_prompts = self.decompose(&state.query).await;

        state.advance(RunPhase::AgentsRunning)?;
        events.phase(
            COORDINATOR,
            format!("Launching {} agents in parallel", state.sub_prompts.len()),
        );
        let records = self.fan_out(&state.query, &state.sub_prompts, &events).await;

        state.advance(RunPhase::Joining)?;
        for record in records {
            state.record_agent(record)?;
        }
        let succeeded = state.agents.iter().filter(|a| !a.outcome.is_failure()).count();
        events.phase(
            COORDINATOR,
            format!(
                "All agents finished: {} of {} produced findings",
                succeeded,
                state.agents.len()
            ),
        );

        state.advance(RunPhase::Synthesizing)?;
        events.phase(COORDINATOR, "Synthesizing final report");
        self.synthesize(&mut state, &events).await?;

        state.trace = events.trace();
        if let Some(sink) = &self.sink {
            match sink.persist(&state).await {
                Ok(location) => {
                    tracing::info!(run_id = %state.run_id, path = %location.report.display(), "report saved")
                }
                Err(e) => tracing::warn!(run_id = %state.run_id, error = %e, "failed to persist report"),
            }
        }

        Ok(state)
    }

    async fn decompose(&self, query: &Query) -> Vec<SubPrompt> {
        let specs = self.agents.specs();
        if !self.config.decompose {
            return specs.iter().map(|s| prompts::fallback_prompt(s, query)).collect();
        }

        let prompt = prompts::decompose_prompt(query, specs);
        match timeout(self.config.synthesis_timeout, self.llm.generate(&prompt)).await {
            Ok(Ok(reply)) => prompts::parse_decomposition(&reply, specs, query),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "decomposition failed, using fallback prompts");
                specs.iter().map(|s| prompts::fallback_prompt(s, query)).collect()
            }
            Err(_) => {
                tracing::warn!("decomposition timed out, using fallback prompts");
                specs.iter().map(|s| prompts::fallback_prompt(s, query)).collect()
            }
        }
    }

    /// Run every agent concurrently; returns one record per agent in roster order.
    async fn fan_out(
        &self,
        query: &Query,
        sub_prompts: &[SubPrompt],
        events: &EventSender,
    ) -> Vec<AgentRecord> {
        let specs = self.agents.specs();
        let mut set = JoinSet::new();
        let mut slots = HashMap::new();

        for (index, spec) in specs.iter().enumerate() {
            let sub_prompt = sub_prompts
                .iter()
                .find(|p| p.agent_id == spec.id)
                .cloned()
                .unwrap_or_else(|| prompts::fallback_prompt(spec, query));
            let limit = self.config.timeout_for(&spec.id);
            let runner = AgentRunner::new(
                spec.clone(),
                self.decider.clone(),
                self.config.runner.clone(),
                events.clone(),
            );
            let log = runner.log();

            let handle = set.spawn(async move {
                if limit.is_zero() {
                    return AgentOutcome::TimedOut { after: limit };
                }
                match timeout(limit, runner.execute(&sub_prompt)).await {
                    Ok(outcome) => outcome,
                    Err(_) => AgentOutcome::TimedOut { after: limit },
                }
            });
            slots.insert(
                handle.id(),
                Slot {
                    index,
                    agent_id: spec.id.clone(),
                    log,
                },
            );
        }

        let mut outcomes: Vec<Option<AgentOutcome>> = vec![None; specs.len()];
        let mut logs: Vec<Option<InvocationLog>> = vec![None; specs.len()];

        while let Some(joined) = set.join_next_with_id().await {
            let (id, outcome) = match joined {
                Ok((id, outcome)) => (id, outcome),
                Err(e) => {
                    let outcome = AgentOutcome::Failed {
                        kind: "internal".to_string(),
                        message: format!("agent task aborted: {}", e),
                        partial: None,
                    };
                    (e.id(), outcome)
                }
            };
            let Some(slot) = slots.remove(&id) else {
                continue;
            };

            match &outcome {
                AgentOutcome::TimedOut { after } => {
                    tracing::warn!(agent = %slot.agent_id, ?after, "agent timed out");
                    events.error(
                        &slot.agent_id,
                        TIMEOUT,
                        format!("{} timed out after {:.1}s", slot.agent_id, after.as_secs_f64()),
                        false,
                    );
                }
                AgentOutcome::Failed { kind, message, .. } if kind == "internal" => {
                    tracing::error!(agent = %slot.agent_id, %message, "agent task failed");
                    events.error(&slot.agent_id, "internal", message.clone(), false);
                }
                other => {
                    tracing::info!(agent = %slot.agent_id, outcome = other.label(), "agent finished")
                }
            }

            outcomes[slot.index] = Some(outcome);
            logs[slot.index] = Some(slot.log);
        }

        specs
            .iter()
            .zip(outcomes.into_iter().zip(logs))
            .map(|(spec, (outcome, log))| AgentRecord {
                agent_id: spec.id.clone(),
                description: spec.description.clone(),
                outcome: outcome.unwrap_or_else(|| AgentOutcome::Failed {
                    kind: "internal".to_string(),
                    message: "agent produced no outcome".to_string(),
                    partial: None,
                }),
                invocations: log.map(|l| l.lock().clone()).unwrap_or_default(),
            })
            .collect()
    }

    async fn synthesize(&self, state: &mut RunState, events: &EventSender) -> Result<()> {
        let mut budget = self.config.per_agent_truncation_budget;
        let mut backoff = self.config.synthesis_backoff;
        let attempts = self.config.synthesis_retry_count + 1;
        let mut last_error = AppError::LLM("synthesis was not attempted".to_string());

        for attempt in 1..=attempts {
            let sections = self.sections(state, budget);
            let prompt = prompts::synthesis_prompt(&state.query, &sections);

            let result = match timeout(self.config.synthesis_timeout, self.llm.generate(&prompt)).await
            {
                Ok(result) => result,
                Err(_) => Err(AppError::LLMTimeout(format!(
                    "synthesis exceeded {:?}",
                    self.config.synthesis_timeout
                ))),
            };

            match result {
                Ok(report) if !report.trim().is_empty() => {
                    state.final_report = Some(report.clone());
                    state.advance(RunPhase::Completed)?;
                    events.final_report(report);
                    return Ok(());
                }
                Ok(_) => last_error = AppError::LLM("synthesis returned no text".to_string()),
                Err(AppError::ContextLengthExceeded(msg)) => {
                    budget = shrink_budget(budget);
                    tracing::warn!(attempt, budget, "synthesis prompt too long, shrinking sections");
                    last_error = AppError::ContextLengthExceeded(msg);
                }
                Err(e @ AppError::ContentFiltered(_)) => {
                    last_error = e;
                    break;
                }
                Err(e) => last_error = e,
            }

            tracing::warn!(attempt, attempts, error = %last_error, "synthesis attempt failed");
            if attempt < attempts {
                sleep(backoff).await;
                backoff *= 2;
            }
        }

        let reason = last_error.to_string();
        state.synthesis_error = Some(reason.clone());
        events.error(
            COORDINATOR,
            "synthesis_failed",
            format!("Synthesis failed ({}): {}", last_error.kind(), reason),
            false,
        );

        let sections = self.sections(state, self.config.per_agent_truncation_budget);
        let degraded = prompts::degraded_report(&state.query, &sections, &reason);
        state.final_report = Some(degraded.clone());
        state.advance(RunPhase::Degraded)?;

        if state.all_agents_failed() {
            tracing::warn!(run_id = %state.run_id, "no agent produced findings and synthesis failed");
            events.error(COORDINATOR, "no_report", degraded, true);
        } else {
            events.final_report(degraded);
        }
        Ok(())
    }

    fn sections(&self, state: &RunState, budget: usize) -> Vec<String> {
        state
            .agents
            .iter()
            .map(|record| prompts::agent_section(record, budget).0)
            .collect()
    }
}

/// Next per-agent budget after a context-length rejection: 80%, at least 1.
fn shrink_budget(budget: usize) -> usize {
    (budget - budget / 5).max(1)
}
