//! Single-agent tool loop.
//!
//! The loop alternates between a [`Decider`] call and tool execution until
//! the decider stops or the iteration budget runs out:
//!
//! 1. Ask the decider what to do, given the conversation so far
//! 2. Run each requested tool under the per-tool timeout
//! 3. Record the invocation and feed the result (or error) back
//! 4. Repeat
//!
//! Tool failures never end the loop. A decider failure does.

use crate::agents::AgentSpec;
use crate::agents::decision::{Decider, Decision, DecisionContext};
use crate::llm::ConversationMessage;
use crate::research::events::EventSender;
use crate::research::state::SubPrompt;
use crate::types::ToolCall;
use crate::utils::text::truncate_with_marker;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;

const TRUNCATION_MARKER: &str = "… [truncated]";

/// Kind recorded when the model asks for a tool the agent does not have.
pub const UNKNOWN_TOOL: &str = "unknown_tool";
/// Kind recorded when a tool or agent exceeds its time budget.
pub const TIMEOUT: &str = "timeout";
/// Kind recorded when the decider (the LLM) fails.
pub const LLM_FAILURE: &str = "llm_failure";

/// Record of a single tool call execution.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInvocation {
    /// Identifier assigned by the model to this call.
    pub call_id: String,
    pub tool: String,
    pub arguments: Value,
    /// Serialized response or error, cut to the preview budget.
    pub response_preview: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub success: bool,
    /// Snake_case failure class when `success` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Append-only invocation log shared between a runner and its coordinator slot.
pub type InvocationLog = Arc<Mutex<Vec<ToolInvocation>>>;

/// How one agent's run ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AgentOutcome {
    Success {
        summary: String,
    },
    /// Iteration budget exhausted before the agent stopped on its own.
    Incomplete {
        partial: String,
        iterations: usize,
    },
    Failed {
        kind: String,
        message: String,
        partial: Option<String>,
    },
    TimedOut {
        after: Duration,
    },
}

impl AgentOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            AgentOutcome::Success { .. } => "success",
            AgentOutcome::Incomplete { .. } => "incomplete",
            AgentOutcome::Failed { .. } => "failed",
            AgentOutcome::TimedOut { .. } => "timed_out",
        }
    }

    /// Failed or timed out: nothing usable came back.
    pub fn is_failure(&self) -> bool {
        matches!(self, AgentOutcome::Failed { .. } | AgentOutcome::TimedOut { .. })
    }

    /// Text to hand to synthesis for this outcome.
    pub fn synthesis_text(&self) -> String {
        match self {
            AgentOutcome::Success { summary } => summary.clone(),
            AgentOutcome::Incomplete { partial, iterations } => format!(
                "(stopped after {} iterations without a final answer)\n{}",
                iterations, partial
            ),
            AgentOutcome::Failed {
                kind,
                message,
                partial,
            } => {
                let mut text = format!("Data source unavailable ({}): {}", kind, message);
                if let Some(p) = partial.as_deref().filter(|p| !p.trim().is_empty()) {
                    text.push_str("\nPartial notes:\n");
                    text.push_str(p);
                }
                text
            }
            AgentOutcome::TimedOut { after } => format!(
                "Agent timed out after {:.1}s; no findings were returned.",
                after.as_secs_f64()
            ),
        }
    }
}

/// Loop limits for one agent.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub max_iterations: usize,
    pub tool_timeout: Duration,
    /// Characters of each tool response kept in events and the invocation log.
    pub preview_chars: usize,
    /// Characters of each tool response fed back to the decider.
    pub tool_result_max_chars: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 8,
            tool_timeout: Duration::from_secs(30),
            preview_chars: 2000,
            tool_result_max_chars: 12_000,
        }
    }
}

/// Runs one agent's tool loop and records its invocations.
pub struct AgentRunner {
    spec: Arc<AgentSpec>,
    decider: Arc<dyn Decider>,
    config: RunnerConfig,
    events: EventSender,
    log: InvocationLog,
}

impl AgentRunner {
    pub fn new(
        spec: Arc<AgentSpec>,
        decider: Arc<dyn Decider>,
        config: RunnerConfig,
        events: EventSender,
    ) -> Self {
        Self {
            spec,
            decider,
            config,
            events,
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Handle to the invocation log, readable after the runner is dropped.
    pub fn log(&self) -> InvocationLog {
        self.log.clone()
    }

    /// Run the loop for `sub_prompt` and return the outcome.
    pub async fn execute(&self, sub_prompt: &SubPrompt) -> AgentOutcome {
        let agent = self.spec.id.as_str();
        self.events.phase(agent, format!("{} starting research", agent));

        let tools = self.spec.tools.get_tool_definitions();
        let mut messages = vec![
            ConversationMessage::system(&self.spec.role),
            ConversationMessage::user(&sub_prompt.text),
        ];
        let mut last_text = String::new();
        let mut stopped: Option<String> = None;

        for iteration in 0..self.config.max_iterations {
            let ctx = DecisionContext {
                agent_id: agent,
                iteration,
                messages: &messages,
                tools: &tools,
            };

            let decision = match self.decider.decide(&ctx).await {
                Ok(decision) => decision,
                Err(e) => {
                    tracing::warn!(agent, error = %e, "decider failed");
                    self.events.error(agent, LLM_FAILURE, e.to_string(), false);
                    let outcome = AgentOutcome::Failed {
                        kind: LLM_FAILURE.to_string(),
                        message: e.to_string(),
                        partial: (!last_text.is_empty()).then(|| last_text.clone()),
                    };
                    self.events.phase(agent, format!("{} failed", agent));
                    return outcome;
                }
            };

            match decision {
                Decision::Stop { summary } => {
                    if !summary.trim().is_empty() {
                        self.events.agent_message(agent, summary.clone());
                    }
                    stopped = Some(summary);
                    break;
                }
                Decision::Invoke { calls, message } if calls.is_empty() => {
                    if !message.trim().is_empty() {
                        self.events.agent_message(agent, message.clone());
                    }
                    stopped = Some(message);
                    break;
                }
                Decision::Invoke { calls, message } => {
                    if !message.trim().is_empty() {
                        self.events.agent_message(agent, message.clone());
                        last_text = message.clone();
                    }
                    messages.push(ConversationMessage::assistant(message, calls.clone()));

                    for call in &calls {
                        let (invocation, feedback) = self.invoke(call).await;
                        messages.push(ConversationMessage::tool_result_text(
                            &call.id,
                            feedback,
                            !invocation.success,
                        ));
                        self.log.lock().push(invocation);
                    }
                }
            }
        }

        let outcome = match stopped {
            Some(summary) => self.finish(AgentOutcome::Success { summary }),
            None => {
                tracing::info!(agent, iterations = self.config.max_iterations, "iteration budget exhausted");
                self.finish(AgentOutcome::Incomplete {
                    partial: last_text,
                    iterations: self.config.max_iterations,
                })
            }
        };

        self.events
            .phase(agent, format!("{} finished: {}", agent, outcome.label()));
        outcome
    }

    /// Downgrade to `Failed` when every tool invocation failed.
    fn finish(&self, outcome: AgentOutcome) -> AgentOutcome {
        let log = self.log.lock();
        if log.is_empty() || log.iter().any(|inv| inv.success) {
            return outcome;
        }

        let (kind, message) = log
            .last()
            .map(|inv| {
                (
                    inv.error_kind.clone().unwrap_or_else(|| "internal".to_string()),
                    inv.error.clone().unwrap_or_default(),
                )
            })
            .unwrap_or_default();

        let partial = match outcome {
            AgentOutcome::Success { summary } => summary,
            AgentOutcome::Incomplete { partial, .. } => partial,
            other => return other,
        };

        AgentOutcome::Failed {
            kind,
            message: format!("all {} tool invocations failed; last: {}", log.len(), message),
            partial: (!partial.trim().is_empty()).then_some(partial),
        }
    }

    /// Execute one call; returns the log record and the text fed back to the decider.
    async fn invoke(&self, call: &ToolCall) -> (ToolInvocation, String) {
        let agent = self.spec.id.as_str();
        self.events.tool_call(agent, &call.id, &call.name, &call.arguments);

        let started_at = Utc::now();
        let start = Instant::now();

        let result: Result<Value, (String, String)> = if !self.spec.tools.has_tool(&call.name) {
            Err((
                UNKNOWN_TOOL.to_string(),
                format!(
                    "Unknown tool '{}'; available: {}",
                    call.name,
                    self.spec.tools.tool_names().join(", ")
                ),
            ))
        } else {
            match timeout(
                self.config.tool_timeout,
                self.spec.tools.execute(&call.name, call.arguments.clone()),
            )
            .await
            {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(e)) => Err((e.kind().to_string(), e.to_string())),
                Err(_) => Err((
                    TIMEOUT.to_string(),
                    format!(
                        "{} did not respond within {:?}",
                        call.name, self.config.tool_timeout
                    ),
                )),
            }
        };

        let duration_ms = start.elapsed().as_millis() as u64;

        let (success, rendered, error_kind, error) = match result {
            Ok(value) => (true, value.to_string(), None, None),
            Err((kind, message)) => {
                tracing::debug!(agent, tool = %call.name, %kind, %message, "tool failed");
                let rendered = json!({"error": message, "kind": kind}).to_string();
                (false, rendered, Some(kind), Some(message))
            }
        };

        let (preview, _) = truncate_with_marker(&rendered, self.config.preview_chars, TRUNCATION_MARKER);
        let (feedback, _) =
            truncate_with_marker(&rendered, self.config.tool_result_max_chars, TRUNCATION_MARKER);

        self.events.tool_response(
            agent,
            json!({
                "call_id": call.id,
                "tool": call.name,
                "success": success,
                "error_kind": error_kind,
                "duration_ms": duration_ms,
                "preview": preview,
            }),
        );

        let invocation = ToolInvocation {
            call_id: call.id.clone(),
            tool: call.name.clone(),
            arguments: call.arguments.clone(),
            response_preview: preview,
            started_at,
            duration_ms,
            success,
            error_kind,
            error,
        };
        (invocation, feedback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::AgentKind;
    use crate::research::events::{EventKind, ProgressEvent};
    use crate::research::state::PromptSource;
    use crate::tools::{Tool, ToolRegistry};
    use crate::types::{Result, SourceError};
    use async_trait::async_trait;
    use tokio::sync::mpsc;

    struct Lookup {
        fail: bool,
    }

    #[async_trait]
    impl Tool for Lookup {
        fn name(&self) -> &str {
            "lookup"
        }
        fn description(&self) -> &str {
            "test lookup"
        }
        fn parameters_schema(&self) -> Value {
            json!({"type": "object"})
        }
        async fn execute(&self, _args: Value) -> Result<Value> {
            if self.fail {
                Err(SourceError::UpstreamUnavailable("connection refused".into()).into())
            } else {
                Ok(json!({"rows": ["x".repeat(100)]}))
            }
        }
    }

    /// Calls `tool` for the first `calls` decisions, then stops.
    struct Script {
        tool: &'static str,
        calls: usize,
    }

    #[async_trait]
    impl Decider for Script {
        async fn decide(&self, ctx: &DecisionContext<'_>) -> Result<Decision> {
            if ctx.iteration < self.calls {
                Ok(Decision::Invoke {
                    calls: vec![ToolCall {
                        id: format!("call_{}", ctx.iteration),
                        name: self.tool.to_string(),
                        arguments: json!({}),
                    }],
                    message: format!("step {}", ctx.iteration),
                })
            } else {
                Ok(Decision::Stop {
                    summary: "done".to_string(),
                })
            }
        }
    }

    fn build(
        fail: bool,
        decider: Script,
        max_iterations: usize,
    ) -> (AgentRunner, mpsc::UnboundedReceiver<ProgressEvent>) {
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(Lookup { fail }));
        let spec = Arc::new(AgentSpec::new(AgentKind::Openfda, tools));
        let (tx, rx) = mpsc::unbounded_channel();
        let config = RunnerConfig {
            max_iterations,
            preview_chars: 20,
            ..RunnerConfig::default()
        };
        (
            AgentRunner::new(spec, Arc::new(decider), config, EventSender::new(tx)),
            rx,
        )
    }

    fn prompt() -> SubPrompt {
        SubPrompt {
            agent_id: "openfda".into(),
            text: "metformin recalls".into(),
            source: PromptSource::Fallback,
        }
    }

    #[tokio::test]
    async fn test_success_with_truncated_preview() {
        let (runner, mut rx) = build(false, Script { tool: "lookup", calls: 1 }, 5);
        let outcome = runner.execute(&prompt()).await;
        assert_eq!(outcome, AgentOutcome::Success { summary: "done".into() });

        let log = runner.log();
        let log = log.lock();
        assert_eq!(log.len(), 1);
        assert!(log[0].success);
        assert!(log[0].response_preview.ends_with(TRUNCATION_MARKER));
        drop(log);

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push(event.kind);
        }
        assert_eq!(kinds.first(), Some(&EventKind::PhaseUpdate));
        assert!(kinds.contains(&EventKind::ToolCall));
        assert!(kinds.contains(&EventKind::ToolResponse));
        assert_eq!(kinds.last(), Some(&EventKind::PhaseUpdate));
    }

    #[tokio::test]
    async fn test_all_invocations_failed_becomes_failed() {
        let (runner, _rx) = build(true, Script { tool: "lookup", calls: 2 }, 5);
        match runner.execute(&prompt()).await {
            AgentOutcome::Failed { kind, partial, .. } => {
                assert_eq!(kind, "upstream_unavailable");
                assert_eq!(partial.as_deref(), Some("done"));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(runner.log().lock().len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_recorded_and_loop_continues() {
        let (runner, _rx) = build(false, Script { tool: "nope", calls: 1 }, 5);
        let outcome = runner.execute(&prompt()).await;
        let log = runner.log();
        let log = log.lock();
        assert_eq!(log[0].error_kind.as_deref(), Some(UNKNOWN_TOOL));
        assert!(matches!(outcome, AgentOutcome::Failed { ref kind, .. } if kind == UNKNOWN_TOOL));
    }

    #[tokio::test]
    async fn test_iteration_budget_yields_incomplete() {
        let (runner, _rx) = build(false, Script { tool: "lookup", calls: 10 }, 3);
        let outcome = runner.execute(&prompt()).await;
        assert_eq!(
            outcome,
            AgentOutcome::Incomplete {
                partial: "step 2".into(),
                iterations: 3
            }
        );
    }

    #[test]
    fn test_synthesis_text_mentions_failure_kind() {
        let outcome = AgentOutcome::Failed {
            kind: "rate_limited".into(),
            message: "429".into(),
            partial: None,
        };
        assert!(outcome.synthesis_text().contains("rate_limited"));
        assert!(outcome.is_failure());
        assert!(!AgentOutcome::Success { summary: String::new() }.is_failure());
    }
}
