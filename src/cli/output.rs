//! Colored output helpers for the CLI

use crate::research::events::{EventKind, ProgressEvent};
use crate::utils::text::truncate_with_marker;
use owo_colors::OwoColorize;
use serde_json::Value;

const EVENT_PREVIEW_CHARS: usize = 160;

/// Output style configuration
pub struct Output {
    /// Whether to use colored output
    pub colored: bool,
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

impl Output {
    pub fn new() -> Self {
        Self { colored: true }
    }

    pub fn no_color() -> Self {
        Self { colored: false }
    }

    pub fn banner(&self) {
        let version = format!("v{}", env!("CARGO_PKG_VERSION"));
        if self.colored {
            println!(
                "\n   {} {}\n   {}\n",
                "healthscope".bright_cyan().bold(),
                version.dimmed(),
                "Multi-agent health data research".bright_white()
            );
        } else {
            println!("\n   healthscope {}\n   Multi-agent health data research\n", version);
        }
    }

    pub fn success(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "✓".green().bold(), message.green());
        } else {
            println!("  [OK] {}", message);
        }
    }

    pub fn info(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "•".blue(), message);
        } else {
            println!("  [INFO] {}", message);
        }
    }

    pub fn warning(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "⚠".yellow().bold(), message.yellow());
        } else {
            println!("  [WARN] {}", message);
        }
    }

    /// Print an error message to stderr
    pub fn error(&self, message: &str) {
        if self.colored {
            eprintln!("  {} {}", "✗".red().bold(), message.red());
        } else {
            eprintln!("  [ERROR] {}", message);
        }
    }

    /// Print a file creation message
    pub fn created(&self, file_type: &str, path: &str) {
        if self.colored {
            println!(
                "  {} {} {}",
                "✓".green().bold(),
                file_type.dimmed(),
                path.bright_white()
            );
        } else {
            println!("  [CREATED] {} {}", file_type, path);
        }
    }

    pub fn skipped(&self, path: &str, reason: &str) {
        if self.colored {
            println!(
                "  {} {} {}",
                "○".yellow(),
                path.dimmed(),
                format!("({})", reason).dimmed()
            );
        } else {
            println!("  [SKIPPED] {} ({})", path, reason);
        }
    }

    pub fn header(&self, title: &str) {
        if self.colored {
            println!("\n  {}\n", title.bright_white().bold().underline());
        } else {
            println!("\n  {}\n  {}\n", title, "=".repeat(title.len()));
        }
    }

    pub fn kv(&self, key: &str, value: &str) {
        if self.colored {
            println!("    {}: {}", key.dimmed(), value.bright_white());
        } else {
            println!("    {}: {}", key, value);
        }
    }

    pub fn list_item(&self, item: &str) {
        if self.colored {
            println!("    {} {}", "→".cyan(), item);
        } else {
            println!("    - {}", item);
        }
    }

    pub fn hint(&self, message: &str) {
        if self.colored {
            println!("\n  {} {}", "hint:".bright_magenta().bold(), message.dimmed());
        } else {
            println!("\n  hint: {}", message);
        }
    }

    pub fn newline(&self) {
        println!();
    }

    /// Print one progress event as a single line.
    pub fn event(&self, event: &ProgressEvent) {
        if event.kind == EventKind::FinalReport {
            return;
        }
        let line = event_line(event);
        if !self.colored {
            println!("  [{}] {}", event.agent, line);
            return;
        }
        let agent = format!("[{}]", event.agent);
        match event.kind {
            EventKind::PhaseUpdate => println!("  {} {}", agent.cyan().bold(), line),
            EventKind::AgentMessage => println!("  {} {}", agent.blue(), line.dimmed()),
            EventKind::ToolCall => println!("  {} {}", agent.magenta(), line),
            EventKind::ToolResponse => {
                if event.content.get("success").and_then(Value::as_bool) == Some(false) {
                    println!("  {} {}", agent.magenta(), line.yellow())
                } else {
                    println!("  {} {}", agent.magenta(), line.green())
                }
            }
            EventKind::Error => eprintln!("  {} {}", agent.red().bold(), line.red()),
            EventKind::FinalReport => {}
        }
    }
}

/// Human-readable single-line summary of an event.
pub fn event_line(event: &ProgressEvent) -> String {
    let content = &event.content;
    let text = match event.kind {
        EventKind::ToolCall => format!(
            "→ {} {}",
            content.get("tool").and_then(Value::as_str).unwrap_or("?"),
            content.get("args").map(Value::to_string).unwrap_or_default()
        ),
        EventKind::ToolResponse => {
            let tool = content.get("tool").and_then(Value::as_str).unwrap_or("?");
            let ms = content.get("duration_ms").and_then(Value::as_u64).unwrap_or(0);
            match content.get("error_kind").and_then(Value::as_str) {
                Some(kind) => format!("← {} failed: {} ({} ms)", tool, kind, ms),
                None => format!("← {} ok ({} ms)", tool, ms),
            }
        }
        EventKind::Error => format!(
            "{}: {}",
            content.get("code").and_then(Value::as_str).unwrap_or("error"),
            content.get("message").and_then(Value::as_str).unwrap_or("")
        ),
        _ => match content {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        },
    };
    let single = text.replace('\n', " ");
    truncate_with_marker(&single, EVENT_PREVIEW_CHARS, "…").0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_output_constructors() {
        assert!(Output::new().colored);
        assert!(!Output::no_color().colored);
        assert!(Output::default().colored);
    }

    #[test]
    fn test_event_line_tool_response() {
        let ok = ProgressEvent::new(
            EventKind::ToolResponse,
            "openfda",
            json!({"tool": "fda_drug_recalls", "success": true, "duration_ms": 12, "error_kind": null}),
        );
        assert_eq!(event_line(&ok), "← fda_drug_recalls ok (12 ms)");

        let failed = ProgressEvent::new(
            EventKind::ToolResponse,
            "openfda",
            json!({"tool": "fda_drug_recalls", "success": false, "duration_ms": 5, "error_kind": "rate_limited"}),
        );
        assert_eq!(event_line(&failed), "← fda_drug_recalls failed: rate_limited (5 ms)");
    }

    #[test]
    fn test_event_line_is_single_line_and_bounded() {
        let event = ProgressEvent::new(
            EventKind::AgentMessage,
            "epht",
            json!(format!("line one\nline two {}", "x".repeat(400))),
        );
        let line = event_line(&event);
        assert!(!line.contains('\n'));
        assert!(line.chars().count() <= EVENT_PREVIEW_CHARS + 1);
    }

    #[test]
    fn test_output_methods_no_panic() {
        for output in [Output::no_color(), Output::new()] {
            output.banner();
            output.success("test success");
            output.info("test info");
            output.warning("test warning");
            output.error("test error");
            output.created("file", "path/to/file");
            output.skipped("path", "reason");
            output.header("Test Header");
            output.kv("key", "value");
            output.list_item("item");
            output.hint("hint message");
            output.event(&ProgressEvent::new(EventKind::PhaseUpdate, "coordinator", json!("go")));
            output.newline();
        }
    }
}
