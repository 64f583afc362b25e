//! Multi-agent research coordination
//!
//! One run takes a health data question through these phases:
//!
//! 1. **Decomposition** - the LLM writes one sub-prompt per agent
//! 2. **Fan-out** - every agent runs its tool loop concurrently under its own timeout
//! 3. **Join** - exactly one [`AgentOutcome`](crate::agents::AgentOutcome) per agent
//! 4. **Synthesis** - the LLM merges the findings, with retries and a degraded fallback
//!
//! Progress is reported through [`events::EventSender`] as the run goes.
//!
//! # Usage
//!
//! ```ignore
//! use healthscope::research::{Coordinator, CoordinatorConfig, EventSender};
//!
//! let coordinator = Coordinator::new(config, llm, decider, agents);
//! let state = coordinator
//!     .run("Asthma rates and air quality in Ohio", EventSender::detached())
//!     .await?;
//! println!("{}", state.final_report.unwrap_or_default());
//! ```

/// Fan-out, join and synthesis.
pub mod coordinator;
pub mod events;
pub mod prompts;
pub mod state;

pub use coordinator::{Coordinator, CoordinatorConfig};
pub use events::{EventKind, EventSender, ProgressEvent};
pub use state::{AgentRecord, PromptSource, Query, RunPhase, RunState, SubPrompt};
