//! Progress events streamed to clients while a run is in flight.
//!
//! A run owns one [`EventSender`]. Every component that reports progress gets a
//! clone; the streaming gateway holds the receiving half. Sends never block and
//! never fail the run: once the client has gone away events are dropped.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Sender id for coordinator-level events.
pub const COORDINATOR: &str = "coordinator";
/// Sender id for events that concern the run as a whole.
pub const SYSTEM: &str = "system";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    PhaseUpdate,
    AgentMessage,
    ToolCall,
    ToolResponse,
    Error,
    FinalReport,
}

/// One progress event, serialized as `{type, agent, content, timestamp}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub agent: String,
    pub content: Value,
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    pub fn new(kind: EventKind, agent: impl Into<String>, content: Value) -> Self {
        Self {
            kind,
            agent: agent.into(),
            content,
            timestamp: Utc::now(),
        }
    }

    /// True for an `error` event flagged fatal.
    pub fn is_fatal_error(&self) -> bool {
        self.kind == EventKind::Error
            && self.content.get("fatal").and_then(Value::as_bool).unwrap_or(false)
    }

    /// True for the event that ends a run: the final report or a fatal error.
    pub fn is_terminal(&self) -> bool {
        self.kind == EventKind::FinalReport || self.is_fatal_error()
    }

    /// `code` of an `error` event.
    pub fn error_code(&self) -> Option<&str> {
        (self.kind == EventKind::Error)
            .then(|| self.content.get("code").and_then(Value::as_str))
            .flatten()
    }
}

/// Cloneable, non-blocking handle for emitting progress events.
#[derive(Clone, Default)]
pub struct EventSender {
    tx: Option<mpsc::UnboundedSender<ProgressEvent>>,
    trace: Option<Arc<Mutex<Vec<ProgressEvent>>>>,
}

impl EventSender {
    /// Sender relaying to `tx`.
    pub fn new(tx: mpsc::UnboundedSender<ProgressEvent>) -> Self {
        Self {
            tx: Some(tx),
            trace: None,
        }
    }

    /// Sender with no consumer; events are only traced, if tracing is on.
    pub fn detached() -> Self {
        Self::default()
    }

    /// Also record every event in an in-memory trace.
    pub fn with_trace(mut self) -> Self {
        self.trace = Some(Arc::new(Mutex::new(Vec::new())));
        self
    }

    pub fn emit(&self, event: ProgressEvent) {
        if let Some(trace) = &self.trace {
            trace.lock().push(event.clone());
        }
        if let Some(tx) = &self.tx {
            // Receiver gone means the client disconnected; keep running.
            let _ = tx.send(event);
        }
    }

    /// Snapshot of the events emitted so far, if tracing is on.
    pub fn trace(&self) -> Option<Vec<ProgressEvent>> {
        self.trace.as_ref().map(|t| t.lock().clone())
    }

    pub fn phase(&self, agent: &str, message: impl Into<String>) {
        self.emit(ProgressEvent::new(
            EventKind::PhaseUpdate,
            agent,
            Value::String(message.into()),
        ));
    }

    pub fn agent_message(&self, agent: &str, text: impl Into<String>) {
        self.emit(ProgressEvent::new(
            EventKind::AgentMessage,
            agent,
            Value::String(text.into()),
        ));
    }

    pub fn tool_call(&self, agent: &str, call_id: &str, tool: &str, args: &Value) {
        self.emit(ProgressEvent::new(
            EventKind::ToolCall,
            agent,
            json!({"call_id": call_id, "tool": tool, "args": args}),
        ));
    }

    pub fn tool_response(&self, agent: &str, content: Value) {
        self.emit(ProgressEvent::new(EventKind::ToolResponse, agent, content));
    }

    pub fn error(&self, agent: &str, code: &str, message: impl Into<String>, fatal: bool) {
        self.emit(ProgressEvent::new(
            EventKind::Error,
            agent,
            json!({"code": code, "message": message.into(), "fatal": fatal}),
        ));
    }

    pub fn final_report(&self, report: impl Into<String>) {
        self.emit(ProgressEvent::new(
            EventKind::FinalReport,
            COORDINATOR,
            Value::String(report.into()),
        ));
    }
}
