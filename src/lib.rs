//! # TeamLedger
//!
//! TeamLedger coordinates a fixed team of capability-scoped LLM worker agents (mail, calendar,
//! chat, issue tracker, a human proxy, ...) so they jointly satisfy one natural-language request.
//! An LLM acts as the oracle that decides who speaks next and whether the work is done.
//!
//! The crate provides:
//!
//! * **Ledger orchestration**: [`LedgerOrchestrator`] runs a bounded sequence of rounds. Each
//!   round the oracle fills a strict-JSON [`ledger::Ledger`] (satisfied? looping? progressing?
//!   who next? which instruction?) and exactly one agent acts.
//! * **Self-correcting workers**: a [`Worker`] wraps one capability and, when asked to reply,
//!   loops over "act, then ask the oracle for a [`ledger::Verdict`]" until its sub-task is done
//!   or stalls, then answers with a single summary.
//! * **Table-driven tools**: [`tool_protocol::ToolTable`] maps tool names to schemas and
//!   handlers. Tool failures become text the oracle can reason about, never crashes.
//! * **Explicit budgets**: [`config::RunConfig`] fixes `max_rounds`, `max_time` and behaviour
//!   switches for a run. Reconfiguring means building a new orchestrator.
//! * **Cancellation everywhere**: every oracle and tool call takes a
//!   [`tokio_util::sync::CancellationToken`].
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use teamledger::clients::openai::OpenAIClient;
//! use teamledger::config::RunConfig;
//! use teamledger::responders::ChatResponder;
//! use teamledger::{LedgerOrchestrator, Worker};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     teamledger::init_logger();
//!     let client = Arc::new(OpenAIClient::from_env()?);
//!
//!     let mut orchestrator = LedgerOrchestrator::new(
//!         client.clone(),
//!         RunConfig::default().with_max_rounds(10),
//!     );
//!     orchestrator.add_agent(Worker::new(
//!         "ChatWorker",
//!         "General knowledge, writing and summarising",
//!         client.clone(),
//!         ChatResponder::new(client.clone()),
//!     ))?;
//!
//!     let outcome = orchestrator
//!         .run("Write a haiku about ledgers", &CancellationToken::new())
//!         .await?;
//!     println!("{} after {} rounds", outcome.reason, outcome.rounds);
//!     if let Some(answer) = outcome.final_answer {
//!         println!("{}", answer);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Errors
//!
//! [`OrchestrationError`] separates transport failures (propagated untouched) from protocol
//! violations, where the oracle broke the JSON contract or named an agent outside the roster.
//! Use [`OrchestrationError::is_protocol_violation`] to tell "the oracle misbehaved" apart
//! from "the task failed". Budget exhaustion and stalls are not errors: they are
//! [`orchestration::TerminationReason`]s on a successful [`orchestration::RunOutcome`].

use std::sync::Once;

static INIT_LOGGER: Once = Once::new();

/// Initialise the global [`env_logger`] subscriber exactly once.
///
/// Applications opt in to `RUST_LOG` driven diagnostics without committing to a logging backend.
///
/// ```rust
/// teamledger::init_logger();
/// log::info!("Logger is ready");
/// ```
pub fn init_logger() {
    INIT_LOGGER.call_once(|| {
        env_logger::init();
    });
}

// Import the top-level `teamledger` module.
pub mod teamledger;

// Re-exporting key items for easier external access.
pub use teamledger::bus;
pub use teamledger::bus::{AgentRegistry, Broadcast, TeamAgent};
pub use teamledger::client_wrapper;
pub use teamledger::client_wrapper::{ClientWrapper, CompletionOptions, Message, Role};
pub use teamledger::clients;
pub use teamledger::config;
pub use teamledger::config::{RunConfig, WorkerConfig};
pub use teamledger::error;
pub use teamledger::error::OrchestrationError;
pub use teamledger::event;
pub use teamledger::event::{EventHandler, OrchestrationEvent, WorkerEvent};
pub use teamledger::ledger;
pub use teamledger::orchestration;
pub use teamledger::orchestration::{LedgerOrchestrator, RunOutcome, TerminationReason};
pub use teamledger::prompts;
pub use teamledger::responders;
pub use teamledger::stall;
pub use teamledger::tool_protocol;
pub use teamledger::transcript;
pub use teamledger::transcript::Transcript;
pub use teamledger::worker;
pub use teamledger::worker::Worker;
