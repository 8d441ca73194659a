use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::teamledger::client_wrapper::{ClientWrapper, CompletionOptions, Message};
use crate::teamledger::error::OrchestrationError;
use crate::teamledger::responders::{StepContext, StepOutput, StepResponder};

/// General-purpose assistant: answers from the model alone, no tools.
pub struct ChatResponder {
    system_prompt: String,
    client: Arc<dyn ClientWrapper>,
}

impl ChatResponder {
    pub fn new(client: Arc<dyn ClientWrapper>) -> Self {
        Self {
            system_prompt: "You are a helpful general-purpose assistant working in a team of \
agents. Answer the latest request using your own knowledge, drafting text when asked."
                .to_string(),
            client,
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }
}

#[async_trait]
impl StepResponder for ChatResponder {
    async fn respond(
        &self,
        ctx: &StepContext<'_>,
        cancel: &CancellationToken,
    ) -> Result<StepOutput, OrchestrationError> {
        let mut messages = vec![Message::system(&self.system_prompt)];
        messages.extend(ctx.transcript.to_messages());
        let response = self
            .client
            .send_message(&messages, &CompletionOptions::text(), cancel)
            .await?;
        Ok(StepOutput::new(response.content.to_string()))
    }
}
