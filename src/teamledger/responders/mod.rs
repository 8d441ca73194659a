//! Domain-specific single-step responders.
//!
//! A [`StepResponder`] is the part of a worker that actually touches its
//! capability: it looks at the transcript and the current task, does one
//! thing, and returns text. The [`Worker`](crate::Worker) wraps it with the
//! task-completion loop.
//!
//! - [`ToolResponder`]: model-driven tool calls against a
//!   [`ToolTable`](crate::tool_protocol::ToolTable)
//! - [`ChatResponder`]: plain model answer, no tools
//! - [`UserProxyResponder`]: relays a human's answer

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::teamledger::error::OrchestrationError;
use crate::teamledger::event::{EventHandler, WorkerEvent};
use crate::teamledger::transcript::Transcript;

pub mod chat;
pub mod tool;
pub mod user_proxy;

pub use chat::ChatResponder;
pub use tool::ToolResponder;
pub use user_proxy::UserProxyResponder;

/// Everything a responder may look at for one step.
pub struct StepContext<'a> {
    pub agent_name: &'a str,
    pub transcript: &'a Transcript,
    /// The task to act on: the latest transcript entry.
    pub task: &'a str,
    pub event_handler: Option<&'a Arc<dyn EventHandler>>,
}

impl<'a> StepContext<'a> {
    pub(crate) async fn emit(&self, event: WorkerEvent) {
        if let Some(handler) = self.event_handler {
            handler.on_worker_event(&event).await;
        }
    }
}

/// Output of one responder step.
#[derive(Clone, Debug, PartialEq)]
pub struct StepOutput {
    pub content: String,
    /// The step asks for the whole run to stop.
    pub request_halt: bool,
}

impl StepOutput {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            request_halt: false,
        }
    }

    pub fn halt(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            request_halt: true,
        }
    }
}

#[async_trait]
pub trait StepResponder: Send + Sync {
    /// Perform one step. Capability failures should come back as text in
    /// `Ok`; only transport failures and cancellation are errors.
    async fn respond(
        &self,
        ctx: &StepContext<'_>,
        cancel: &CancellationToken,
    ) -> Result<StepOutput, OrchestrationError>;
}
