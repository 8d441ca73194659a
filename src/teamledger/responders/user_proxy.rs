use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::teamledger::error::OrchestrationError;
use crate::teamledger::responders::{StepContext, StepOutput, StepResponder};

/// Reply typed by the human to stop the whole run.
pub const HALT_WORD: &str = "exit";

/// Puts a human in the roster.
///
/// Each step forwards the current task to `outbox` (if set) and waits for
/// one line on the input channel. Replying `exit`, or closing the channel,
/// asks the orchestrator to halt.
pub struct UserProxyResponder {
    input: Mutex<mpsc::Receiver<String>>,
    outbox: Option<mpsc::UnboundedSender<String>>,
}

impl UserProxyResponder {
    pub fn new(input: mpsc::Receiver<String>) -> Self {
        Self {
            input: Mutex::new(input),
            outbox: None,
        }
    }

    /// Build a responder together with the sender used to feed it replies.
    pub fn channel(buffer: usize) -> (mpsc::Sender<String>, Self) {
        let (tx, rx) = mpsc::channel(buffer);
        (tx, Self::new(rx))
    }

    /// Forward each question to a UI before waiting for the answer.
    pub fn with_outbox(mut self, outbox: mpsc::UnboundedSender<String>) -> Self {
        self.outbox = Some(outbox);
        self
    }
}

#[async_trait]
impl StepResponder for UserProxyResponder {
    async fn respond(
        &self,
        ctx: &StepContext<'_>,
        cancel: &CancellationToken,
    ) -> Result<StepOutput, OrchestrationError> {
        if let Some(outbox) = &self.outbox {
            if outbox.send(ctx.task.to_string()).is_err() {
                log::debug!("{}: outbox closed, question not forwarded", ctx.agent_name);
            }
        }

        let mut input = self.input.lock().await;
        let line = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(OrchestrationError::Cancelled),
            line = input.recv() => line,
        };

        match line {
            Some(text) if text.trim().eq_ignore_ascii_case(HALT_WORD) => Ok(StepOutput::halt(text)),
            Some(text) => Ok(StepOutput::new(text)),
            None => Ok(StepOutput::halt(HALT_WORD)),
        }
    }
}
