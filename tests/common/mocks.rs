//! Mock implementations for testing.
//!
//! Scripted LLM clients, deciders and tools shared by the integration tests,
//! so runs are deterministic and never touch the network.

#![allow(dead_code)]

use async_trait::async_trait;
use healthscope::agents::{AgentKind, AgentSpec, Decider, Decision, DecisionContext};
use healthscope::llm::{ConversationMessage, LLMClient, LLMResponse};
use healthscope::reports::{ReportLocation, ReportSink};
use healthscope::research::events::ProgressEvent;
use healthscope::research::state::RunState;
use healthscope::tools::{Tool, ToolRegistry};
use healthscope::types::{AppError, Result, SourceError, ToolCall, ToolDefinition};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

/// Marker present in every synthesis prompt.
pub const SYNTHESIS_MARKER: &str = "Agent Research Results";
/// Marker present in every decomposition prompt.
pub const DECOMPOSE_MARKER: &str = "Respond with only a JSON object";

/// LLM client that answers decomposition and synthesis prompts from a script.
///
/// - Decomposition returns `decomposition`, or fails when it is `None`.
/// - Synthesis pops the next scripted result, then falls back to `default_report`.
pub struct ScriptedLLMClient {
    decomposition: Option<String>,
    synthesis: Mutex<VecDeque<Result<String>>>,
    default_report: String,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLLMClient {
    pub fn new() -> Self {
        Self {
            decomposition: None,
            synthesis: Mutex::new(VecDeque::new()),
            default_report: "# Health Data Report\n\nSynthesized findings.".to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_decomposition(mut self, reply: &str) -> Self {
        self.decomposition = Some(reply.to_string());
        self
    }

    /// Queue synthesis results, consumed in order.
    pub fn with_synthesis(self, results: Vec<Result<String>>) -> Self {
        self.synthesis.lock().extend(results);
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    pub fn synthesis_prompts(&self) -> Vec<String> {
        self.prompts()
            .into_iter()
            .filter(|p| p.contains(SYNTHESIS_MARKER))
            .collect()
    }
}

#[async_trait]
impl LLMClient for ScriptedLLMClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().push(prompt.to_string());
        if prompt.contains(DECOMPOSE_MARKER) {
            return self
                .decomposition
                .clone()
                .ok_or_else(|| AppError::LLM("decomposition unavailable".to_string()));
        }
        match self.synthesis.lock().pop_front() {
            Some(result) => result,
            None => Ok(self.default_report.clone()),
        }
    }


    async fn generate_with_tools_and_history(
        &self,
        _messages: &[ConversationMessage],
        _tools: &[ToolDefinition],
    ) -> Result<LLMResponse> {
        Err(AppError::LLM("tool calling is scripted by the decider".to_string()))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// What one agent does under [`ScriptedDecider`].
#[derive(Clone)]
pub struct AgentScript {
    /// Tools called one per iteration, in order.
    pub calls: Vec<(String, Value)>,
    pub summary: String,
}

impl AgentScript {
    pub fn calls(tool: &str, times: usize, summary: impl Into<String>) -> Self {
        Self {
            calls: (0..times).map(|_| (tool.to_string(), json!({}))).collect(),
            summary: summary.into(),
        }
    }
}

/// Decider following a fixed per-agent script.
///
/// Agents without a script stop immediately with a generic summary.
#[derive(Default)]
pub struct ScriptedDecider {
    scripts: HashMap<String, AgentScript>,
    fail_for: Vec<String>,
    decisions: AtomicUsize,
}

impl ScriptedDecider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(mut self, agent_id: &str, script: AgentScript) -> Self {
        self.scripts.insert(agent_id.to_string(), script);
        self
    }

    /// Make every decision for `agent_id` fail like an LLM outage.
    pub fn failing_for(mut self, agent_id: &str) -> Self {
        self.fail_for.push(agent_id.to_string());
        self
    }

    pub fn decisions(&self) -> usize {
        self.decisions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Decider for ScriptedDecider {
    async fn decide(&self, ctx: &DecisionContext<'_>) -> Result<Decision> {
        self.decisions.fetch_add(1, Ordering::SeqCst);
        if self.fail_for.iter().any(|a| a == ctx.agent_id) {
            return Err(AppError::LLM("provider returned 500".to_string()));
        }
        let Some(script) = self.scripts.get(ctx.agent_id) else {
            return Ok(Decision::Stop {
                summary: format!("{} found nothing relevant", ctx.agent_id),
            });
        };
        match script.calls.get(ctx.iteration) {
            Some((tool, args)) => Ok(Decision::Invoke {
                calls: vec![ToolCall {
                    id: format!("{}_call_{}", ctx.agent_id, ctx.iteration),
                    name: tool.clone(),
                    arguments: args.clone(),
                }],
                message: String::new(),
            }),
            None => Ok(Decision::Stop {
                summary: script.summary.clone(),
            }),
        }
    }
}

/// Tool returning a fixed value.
pub struct StaticTool {
    pub name: String,
    pub value: Value,
}

#[async_trait]
impl Tool for StaticTool {
    fn name(&self) -> &str {
        &self.name
    }
    fn description(&self) -> &str {
        "returns canned data"
    }
    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }
    async fn execute(&self, _args: Value) -> Result<Value> {
        Ok(self.value.clone())
    }
}

/// Tool that always fails with the given source error.
pub struct FailingTool {
    pub name: String,
    pub error: SourceError,
}

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        &self.name
    }
    fn description(&self) -> &str {
        "always fails"
    }
    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }
    async fn execute(&self, _args: Value) -> Result<Value> {
        Err(self.error.clone().into())
    }
}

/// Tool that sleeps before answering.
pub struct SlowTool {
    pub name: String,
    pub delay: Duration,
}

#[async_trait]
impl Tool for SlowTool {
    fn name(&self) -> &str {
        &self.name
    }
    fn description(&self) -> &str {
        "answers slowly"
    }
    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }
    async fn execute(&self, _args: Value) -> Result<Value> {
        tokio::time::sleep(self.delay).await;
        Ok(json!({"late": true}))
    }
}

/// Sink keeping every persisted run in memory.
#[derive(Default)]
pub struct RecordingSink {
    runs: Mutex<Vec<RunState>>,
}

impl RecordingSink {
    pub fn runs(&self) -> Vec<RunState> {
        self.runs.lock().clone()
    }
}

#[async_trait]
impl ReportSink for RecordingSink {
    async fn persist(&self, state: &RunState) -> Result<ReportLocation> {
        self.runs.lock().push(state.clone());
        Ok(ReportLocation {
            report: PathBuf::from(format!("{}.md", state.short_id())),
            trace: None,
        })
    }
}

/// Sink whose every write fails like a full disk.
#[derive(Default)]
pub struct FailingSink {
    attempts: AtomicUsize,
}

impl FailingSink {
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReportSink for FailingSink {
    async fn persist(&self, _state: &RunState) -> Result<ReportLocation> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(AppError::Persistence("No space left on device".to_string()))
    }
}

/// Tool name used by [`spec_with_tool`] for `kind`.
pub fn tool_name(kind: AgentKind) -> String {
    format!("{}_lookup", kind.id())
}

/// Spec for `kind` whose only tool is `tool`.
pub fn spec_with_tool(kind: AgentKind, tool: Arc<dyn Tool>) -> AgentSpec {
    let mut registry = ToolRegistry::new();
    registry.register(tool);
    AgentSpec::new(kind, registry)
}

pub fn static_spec(kind: AgentKind) -> AgentSpec {
    spec_with_tool(
        kind,
        Arc::new(StaticTool {
            name: tool_name(kind),
            value: json!({"source": kind.id(), "rows": [1, 2, 3]}),
        }),
    )
}

pub fn failing_spec(kind: AgentKind, error: SourceError) -> AgentSpec {
    spec_with_tool(
        kind,
        Arc::new(FailingTool {
            name: tool_name(kind),
            error,
        }),
    )
}

pub fn slow_spec(kind: AgentKind, delay: Duration) -> AgentSpec {
    spec_with_tool(
        kind,
        Arc::new(SlowTool {
            name: tool_name(kind),
            delay,
        }),
    )
}

/// Drain every event already sent on `rx`.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<ProgressEvent>) -> Vec<ProgressEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Parse the `data:` lines of an SSE body into events.
pub fn parse_sse(body: &str) -> Vec<ProgressEvent> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .filter_map(|data| serde_json::from_str(data.trim()).ok())
        .collect()
}
