//! Worker and orchestration event system.
//!
//! Implement [`EventHandler`] to follow a run as it happens:
//!
//! - **Worker steps**: each responder step, its verdict, stalls and the
//!   closing summary
//! - **Tool operations**: tool calls chosen by the model and their outcome
//! - **Orchestration lifecycle**: run start/end, rounds, ledgers, dispatch,
//!   final-check vetoes and re-planning
//!
//! Both handler methods default to no-ops, so only override what you need.
//! A handler registered with
//! [`LedgerOrchestrator::with_event_handler`](crate::orchestration::LedgerOrchestrator::with_event_handler)
//! is handed to every agent added afterwards.
//!
//! # Example
//!
//! ```rust,no_run
//! use teamledger::event::{EventHandler, OrchestrationEvent, WorkerEvent};
//! use async_trait::async_trait;
//!
//! struct PrintHandler;
//!
//! #[async_trait]
//! impl EventHandler for PrintHandler {
//!     async fn on_worker_event(&self, event: &WorkerEvent) {
//!         if let WorkerEvent::StallDetected { agent_name, reason, .. } = event {
//!             println!("{} is stuck: {}", agent_name, reason);
//!         }
//!     }
//!     async fn on_orchestration_event(&self, event: &OrchestrationEvent) {
//!         println!("{:?}", event);
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::teamledger::orchestration::{RunState, TerminationReason};

/// Events emitted by a [`Worker`](crate::Worker) while handling a reply request.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    /// The single-step responder produced an output.
    StepCompleted {
        agent_name: String,
        step: usize,
        output_length: usize,
    },
    /// The oracle judged the latest step.
    VerdictReceived {
        agent_name: String,
        step: usize,
        satisfied: bool,
        in_loop: bool,
        progress: bool,
        loop_counter: usize,
    },
    /// The inner loop was cut for lack of progress.
    StallDetected {
        agent_name: String,
        step: usize,
        reason: String,
    },
    /// The worker produced its final reply.
    SummaryProduced {
        agent_name: String,
        steps: usize,
        length: usize,
    },
    /// The model asked for a tool.
    ToolCallDetected {
        agent_name: String,
        tool_name: String,
        arguments: String,
    },
    /// A tool call finished, successfully or not.
    ToolExecutionCompleted {
        agent_name: String,
        tool_name: String,
        success: bool,
        error: Option<String>,
    },
}

/// Events emitted by the [`LedgerOrchestrator`](crate::LedgerOrchestrator).
#[derive(Debug, Clone)]
pub enum OrchestrationEvent {
    RunStarted {
        run_id: String,
        request: String,
        agent_count: usize,
    },
    StateChanged {
        run_id: String,
        state: RunState,
    },
    /// The fact sheet and plan were (re)built and broadcast.
    PlanUpdated {
        run_id: String,
        plan: String,
    },
    RoundStarted {
        run_id: String,
        round: usize,
    },
    LedgerUpdated {
        run_id: String,
        round: usize,
        satisfied: bool,
        in_loop: bool,
        progress: bool,
        next_speaker: String,
    },
    /// A stalled ledger was observed at the orchestrator level.
    OuterStallObserved {
        run_id: String,
        round: usize,
        consecutive: usize,
        reason: String,
    },
    AgentSelected {
        run_id: String,
        round: usize,
        agent_name: String,
        instruction: String,
    },
    AgentResponded {
        run_id: String,
        round: usize,
        agent_name: String,
        response_length: usize,
    },
    /// The final check rejected a "satisfied" ledger.
    FinalCheckVetoed {
        run_id: String,
        round: usize,
        reason: String,
    },
    RunCompleted {
        run_id: String,
        rounds: usize,
        reason: TerminationReason,
    },
}

/// Receives events from workers and the orchestrator.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn on_worker_event(&self, _event: &WorkerEvent) {}

    async fn on_orchestration_event(&self, _event: &OrchestrationEvent) {}
}
