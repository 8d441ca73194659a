use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::teamledger::client_wrapper::{ClientWrapper, CompletionOptions, Message, ToolCall};
use crate::teamledger::error::OrchestrationError;
use crate::teamledger::event::WorkerEvent;
use crate::teamledger::prompts::Prompts;
use crate::teamledger::responders::{StepContext, StepOutput, StepResponder};
use crate::teamledger::tool_protocol::{describe_outcome, ToolError, ToolResult, ToolTable};

/// Single-step responder for a tool-backed capability.
///
/// One step is: ask the model (with the tool schemas attached) what to do;
/// if it answers in text, that text is the output; if it calls tools, run
/// each through the [`ToolTable`] and have the model present successful
/// results. Failed calls, including undecodable arguments, are returned as a
/// plain description so the completion check can react to them.
pub struct ToolResponder {
    capability: String,
    system_prompt: String,
    client: Arc<dyn ClientWrapper>,
    tools: ToolTable,
    prompts: Prompts,
}

impl ToolResponder {
    /// `capability` names the service in prompts, e.g. `"the mail service"`.
    pub fn new(capability: impl Into<String>, client: Arc<dyn ClientWrapper>, tools: ToolTable) -> Self {
        let capability = capability.into();
        let system_prompt = format!(
            "You are an agent that operates {} through the tools provided. Call a tool whenever \
the task needs data from it or an action on it; otherwise answer directly.",
            capability
        );
        Self {
            capability,
            system_prompt,
            client,
            tools,
            prompts: Prompts::default(),
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    pub fn with_autoform(mut self, autoform: bool) -> Self {
        self.prompts = Prompts::new(autoform);
        self
    }

    pub fn tools(&self) -> &ToolTable {
        &self.tools
    }

    async fn run_tool(
        &self,
        call: &ToolCall,
        cancel: &CancellationToken,
    ) -> Result<Result<ToolResult, ToolError>, OrchestrationError> {
        let args: JsonValue = match serde_json::from_str(&call.arguments) {
            Ok(args) => args,
            Err(e) => {
                return Ok(Err(ToolError::InvalidParameters(format!(
                    "arguments are not valid JSON ({})",
                    e
                ))))
            }
        };
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(OrchestrationError::Cancelled),
            outcome = self.tools.execute(&call.name, args) => Ok(outcome),
        }
    }

    async fn present(
        &self,
        task: &str,
        tool_name: &str,
        output: &str,
        cancel: &CancellationToken,
    ) -> Result<String, OrchestrationError> {
        let messages = vec![
            Message::system(self.prompts.result_presentation_system(&self.capability)),
            Message::user(self.prompts.result_presentation(task, tool_name, output)),
        ];
        let response = self
            .client
            .send_message(&messages, &CompletionOptions::text(), cancel)
            .await?;
        Ok(response.content.to_string())
    }
}

#[async_trait]
impl StepResponder for ToolResponder {
    async fn respond(
        &self,
        ctx: &StepContext<'_>,
        cancel: &CancellationToken,
    ) -> Result<StepOutput, OrchestrationError> {
        let mut messages = vec![Message::system(&self.system_prompt)];
        messages.extend(ctx.transcript.to_messages());

        let options = CompletionOptions::text().with_tools(self.tools.list());
        let response = self.client.send_message(&messages, &options, cancel).await?;
        if response.tool_calls.is_empty() {
            return Ok(StepOutput::new(response.content.to_string()));
        }

        let mut parts = Vec::with_capacity(response.tool_calls.len());
        for call in &response.tool_calls {
            ctx.emit(WorkerEvent::ToolCallDetected {
                agent_name: ctx.agent_name.to_string(),
                tool_name: call.name.clone(),
                arguments: call.arguments.clone(),
            })
            .await;

            let outcome = self.run_tool(call, cancel).await?;
            let succeeded = matches!(&outcome, Ok(result) if result.success);
            let description = describe_outcome(&call.name, &outcome);

            ctx.emit(WorkerEvent::ToolExecutionCompleted {
                agent_name: ctx.agent_name.to_string(),
                tool_name: call.name.clone(),
                success: succeeded,
                error: if succeeded { None } else { Some(description.clone()) },
            })
            .await;

            if succeeded {
                parts.push(self.present(ctx.task, &call.name, &description, cancel).await?);
            } else {
                log::warn!("{}: {}", ctx.agent_name, description);
                parts.push(description);
            }
        }
        Ok(StepOutput::new(parts.join("\n\n")))
    }
}
