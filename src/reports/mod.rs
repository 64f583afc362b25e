//! Report persistence.
//!
//! Each finished run is written as one markdown file, optionally with a JSONL
//! trace of every progress event next to it. Files are written to a temporary
//! file in the target directory and renamed into place, so readers never see a
//! partial report.

use crate::research::state::{RunPhase, RunState};
use crate::types::{AppError, Result};
use crate::utils::text::slugify;
use async_trait::async_trait;
use std::fmt::Write as _;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const SLUG_MAX_LEN: usize = 40;

/// Where a report ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportLocation {
    pub report: PathBuf,
    pub trace: Option<PathBuf>,
}

#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn persist(&self, state: &RunState) -> Result<ReportLocation>;
}

/// Writes reports as markdown files under one directory.
#[derive(Debug, Clone)]
pub struct FileReportSink {
    directory: PathBuf,
    write_trace: bool,
}

impl FileReportSink {
    pub fn new(directory: impl Into<PathBuf>, write_trace: bool) -> Self {
        Self {
            directory: directory.into(),
            write_trace,
        }
    }

    /// `<YYYYmmdd_HHMMSS>_<slug>_<run8>`
    pub fn file_stem(state: &RunState) -> String {
        format!(
            "{}_{}_{}",
            state.started_at.format("%Y%m%d_%H%M%S"),
            slugify(state.query.as_str(), SLUG_MAX_LEN),
            state.short_id()
        )
    }

    fn write_files(&self, state: &RunState) -> Result<ReportLocation> {
        std::fs::create_dir_all(&self.directory).map_err(|e| {
            AppError::Persistence(format!(
                "cannot create report directory {}: {}",
                self.directory.display(),
                e
            ))
        })?;

        // Trace first: a report on disk always has its trace beside it.
        let stem = Self::file_stem(state);
        let trace = match (&state.trace, self.write_trace) {
            (Some(events), true) => {
                let mut body = String::new();
                for event in events {
                    let line = serde_json::to_string(event)
                        .map_err(|e| AppError::Persistence(format!("trace encoding: {}", e)))?;
                    body.push_str(&line);
                    body.push('\n');
                }
                let path = self.directory.join(format!("{}.trace.jsonl", stem));
                write_atomically(&self.directory, &path, body.as_bytes())?;
                Some(path)
            }
            _ => None,
        };

        let report = self.directory.join(format!("{}.md", stem));
        write_atomically(&self.directory, &report, render_markdown(state).as_bytes())?;

        Ok(ReportLocation { report, trace })
    }
}

#[async_trait]
impl ReportSink for FileReportSink {
    async fn persist(&self, state: &RunState) -> Result<ReportLocation> {
        let sink = self.clone();
        let state = state.clone();
        tokio::task::spawn_blocking(move || sink.write_files(&state))
            .await
            .map_err(|e| AppError::Persistence(format!("report writer task failed: {}", e)))?
    }
}

fn write_atomically(dir: &Path, target: &Path, contents: &[u8]) -> Result<()> {
    let persist_err =
        |e: std::io::Error| AppError::Persistence(format!("{}: {}", target.display(), e));

    let mut file = NamedTempFile::new_in(dir).map_err(persist_err)?;
    file.write_all(contents).map_err(persist_err)?;
    file.as_file().sync_all().map_err(persist_err)?;
    file.persist(target).map_err(|e| persist_err(e.error))?;
    Ok(())
}

fn status_label(phase: RunPhase) -> &'static str {
    match phase {
        RunPhase::Completed => "completed",
        RunPhase::Degraded => "degraded (synthesis unavailable)",
        other => other.as_str(),
    }
}

/// Markdown artifact for one run.
pub fn render_markdown(state: &RunState) -> String {
    let mut out = String::new();
    let generated = state.finished_at.unwrap_or(state.started_at);

    let _ = writeln!(out, "# Health Data Research Report\n");
    let _ = writeln!(out, "- **Generated**: {}", generated.format("%Y-%m-%d %H:%M:%S UTC"));
    let _ = writeln!(out, "- **Run**: {}", state.run_id);
    let _ = writeln!(out, "- **Status**: {}", status_label(state.phase));
    if let Some(err) = &state.synthesis_error {
        let _ = writeln!(out, "- **Synthesis error**: {}", err);
    }
    let _ = writeln!(out, "\n## Query\n\n{}\n", state.query);

    if !state.sub_prompts.is_empty() {
        let _ = writeln!(out, "## Agent Prompts\n");
        for prompt in &state.sub_prompts {
            let source = serde_json::to_value(prompt.source)
                .ok()
                .and_then(|v| v.as_str().map(String::from))
                .unwrap_or_default();
            let _ = writeln!(out, "### {} ({})\n\n{}\n", prompt.agent_id, source, prompt.text);
        }
    }

    let _ = writeln!(out, "## Agent Outcomes\n");
    let _ = writeln!(out, "| Agent | Outcome | Tool calls | Failed calls |");
    let _ = writeln!(out, "|-------|---------|------------|--------------|");
    for record in &state.agents {
        let failed = record.invocations.iter().filter(|i| !i.success).count();
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} |",
            record.agent_id,
            record.outcome.label(),
            record.invocations.len(),
            failed
        );
    }

    let _ = writeln!(out, "\n## Report\n");
    out.push_str(state.final_report.as_deref().unwrap_or("_No report was produced._"));
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::AgentOutcome;
    use crate::research::events::{COORDINATOR, EventKind, ProgressEvent};
    use crate::research::state::{AgentRecord, Query};
    use serde_json::json;

    fn finished_state() -> RunState {
        let mut state = RunState::new(Query::parse("Asthma & air quality in Ohio").unwrap());
        for phase in [
            RunPhase::Decomposing,
            RunPhase::AgentsRunning,
            RunPhase::Joining,
        ] {
            state.advance(phase).unwrap();
        }
        state
            .record_agent(AgentRecord {
                agent_id: "epht".into(),
                description: "Environmental".into(),
                outcome: AgentOutcome::Success {
                    summary: "PM2.5 trending down".into(),
                },
                invocations: Vec::new(),
            })
            .unwrap();
        state.advance(RunPhase::Synthesizing).unwrap();
        state.final_report = Some("# Findings\nAll good.".into());
        state.advance(RunPhase::Completed).unwrap();
        state.trace = Some(vec![ProgressEvent::new(
            EventKind::FinalReport,
            COORDINATOR,
            json!("# Findings"),
        )]);
        state
    }

    #[test]
    fn test_file_stem_layout() {
        let state = finished_state();
        let stem = FileReportSink::file_stem(&state);
        assert!(stem.contains("_asthma-air-quality-in-ohio_"));
        assert!(stem.ends_with(&state.short_id()));
        assert_eq!(stem.split('_').next().unwrap().len(), 8);
    }

    #[test]
    fn test_render_markdown_sections() {
        let md = render_markdown(&finished_state());
        assert!(md.contains("## Query"));
        assert!(md.contains("| epht | success | 0 | 0 |"));
        assert!(md.contains("All good."));
        assert!(md.contains("**Status**: completed"));
    }

    #[tokio::test]
    async fn test_persist_writes_report_and_trace() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileReportSink::new(dir.path().join("reports"), true);
        let location = sink.persist(&finished_state()).await.unwrap();

        let report = std::fs::read_to_string(&location.report).unwrap();
        assert!(report.starts_with("# Health Data Research Report"));

        let trace_path = location.trace.unwrap();
        let trace = std::fs::read_to_string(trace_path).unwrap();
        assert_eq!(trace.lines().count(), 1);
        let event: ProgressEvent = serde_json::from_str(trace.lines().next().unwrap()).unwrap();
        assert_eq!(event.kind, EventKind::FinalReport);

        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("reports"))
            .unwrap()
            .filter_map(|e| e.ok())
            .collect();
        assert_eq!(leftovers.len(), 2);
    }

    #[tokio::test]
    async fn test_trace_skipped_when_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileReportSink::new(dir.path(), false);
        let location = sink.persist(&finished_state()).await.unwrap();
        assert!(location.trace.is_none());
    }

    #[tokio::test]
    async fn test_trace_failure_leaves_no_orphan_report() {
        let dir = tempfile::tempdir().unwrap();
        let state = finished_state();
        let stem = FileReportSink::file_stem(&state);
        // A non-empty directory squatting on the trace path makes the rename fail.
        let blocker = dir.path().join(format!("{}.trace.jsonl", stem));
        std::fs::create_dir_all(blocker.join("occupied")).unwrap();

        let sink = FileReportSink::new(dir.path(), true);
        let err = sink.persist(&state).await.unwrap_err();
        assert_eq!(err.kind(), "persistence_failure");
        assert!(!dir.path().join(format!("{}.md", stem)).exists());
    }
}
