//! CLI module for healthscope
//!
//! Uses clap for argument parsing and owo-colors for colored terminal output.

pub mod init;
pub mod output;

use crate::AppState;
use crate::agents::AgentRegistry;
use crate::research::events::{EventKind, EventSender};
use crate::research::state::RunState;
use crate::types::Result;
use crate::utils::toml_config::{DEFAULT_CONFIG_FILE, ProviderKind};
use clap::{Parser, Subcommand, ValueEnum};
use output::Output;
use std::path::PathBuf;
use tokio::sync::mpsc;

/// healthscope - multi-agent health data research server
#[derive(Parser, Debug)]
#[command(
    name = "healthscope-server",
    author = "Dirmacs <build@dirmacs.com>",
    version,
    about = "Multi-agent health data research server",
    long_about = "Fans a health data question out to agents backed by CDC, FDA, Healthcare.gov\n\
                  and MedlinePlus APIs, then synthesizes one markdown report.\n\n\
                  Run without arguments to start the server.",
    after_help = "EXAMPLES:\n    \
                  healthscope-server init                         # Write healthscope.toml and .env.example\n    \
                  healthscope-server                              # Start the server\n    \
                  healthscope-server ask \"metformin recalls\"      # One-shot query in the terminal\n    \
                  healthscope-server agents                       # List the configured agents"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE, global = true)]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve {
        /// Override server.host
        #[arg(long)]
        host: Option<String>,

        /// Override server.port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Run one query and print progress and the report
    Ask {
        /// The health data question
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,

        /// Do not write the report to the reports directory
        #[arg(long)]
        no_save: bool,
    },

    /// List the configured agents and their tools
    Agents,

    /// Write a default healthscope.toml and .env.example
    Init {
        /// Directory to initialize
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Overwrite existing files
        #[arg(short, long)]
        force: bool,

        /// LLM provider to configure
        #[arg(long, value_enum, default_value_t = ProviderArg::Anthropic)]
        provider: ProviderArg,

        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        #[arg(long, default_value = "3000")]
        port: u16,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProviderArg {
    Anthropic,
    Openai,
}

impl From<ProviderArg> for ProviderKind {
    fn from(arg: ProviderArg) -> Self {
        match arg {
            ProviderArg::Anthropic => ProviderKind::Anthropic,
            ProviderArg::Openai => ProviderKind::OpenAI,
        }
    }
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn output(&self) -> Output {
        if self.no_color {
            Output::no_color()
        } else {
            Output::new()
        }
    }
}

/// Run one query, printing each progress event as it arrives.
pub async fn ask(state: &AppState, query: &str, output: &Output) -> Result<RunState> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let coordinator = state.coordinator.clone();
    let query = query.to_string();
    let run = tokio::spawn(async move { coordinator.run(&query, EventSender::new(tx)).await });

    let mut report = None;
    while let Some(event) = rx.recv().await {
        output.event(&event);
        if event.kind == EventKind::FinalReport {
            report = event.content.as_str().map(String::from);
        }
    }

    let state = run
        .await
        .map_err(|e| crate::types::AppError::Internal(format!("run task failed: {}", e)))??;

    if let Some(report) = report {
        output.header("Report");
        println!("{}", report);
    }
    Ok(state)
}

/// Print the roster with each agent's tools.
pub fn list_agents(registry: &AgentRegistry, output: &Output) {
    output.header("Configured agents");
    for info in registry.agent_infos() {
        output.kv(&info.id, &info.description);
        for tool in &info.tools {
            output.list_item(tool);
        }
        output.newline();
    }
}
