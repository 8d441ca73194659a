//! Capability worker with a self-correcting task-completion loop.
//!
//! On a reply request the worker takes the latest entry of its transcript as
//! the task. With multi-step mode off it calls its [`StepResponder`] once and
//! returns the output. With multi-step mode on it iterates:
//!
//! ```text
//!   ┌─> responder step ─> oracle verdict (strict JSON)
//!   │        append: raw output, status line, next instruction
//!   │        update loop counter
//!   └── not satisfied and not stalled
//!   exit ─> reset loop counter ─> oracle summary ─> reply
//! ```
//!
//! The loop has no depth limit other than the stall rule: a verdict that is
//! "in a loop and not progressing" more than `stall_threshold` times in a
//! row ends it.
//!
//! # Example
//!
//! ```rust,no_run
//! use teamledger::responders::ChatResponder;
//! use teamledger::clients::openai::OpenAIClient;
//! use teamledger::Worker;
//! use std::sync::Arc;
//!
//! let client = Arc::new(OpenAIClient::new_with_model_string("sk-...", "gpt-4o-mini"));
//! let worker = Worker::new(
//!     "ChatWorker",
//!     "General knowledge and drafting",
//!     client.clone(),
//!     ChatResponder::new(client),
//! )
//! .with_multi_step(false);
//! ```

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::teamledger::bus::{AgentReply, Broadcast, TeamAgent};
use crate::teamledger::client_wrapper::{ClientWrapper, CompletionOptions, Message, Role};
use crate::teamledger::config::WorkerConfig;
use crate::teamledger::error::OrchestrationError;
use crate::teamledger::event::{EventHandler, WorkerEvent};
use crate::teamledger::ledger::Verdict;
use crate::teamledger::prompts::Prompts;
use crate::teamledger::responders::{StepContext, StepOutput, StepResponder};
use crate::teamledger::stall::LoopCounter;
use crate::teamledger::transcript::Transcript;

/// State accumulated across the steps of one reply request.
#[derive(Debug, Default)]
struct TaskLoop {
    /// Raw step outputs, shown to the oracle on each completion check and
    /// summarised when the loop exits.
    outputs: Vec<String>,
    steps: usize,
    request_halt: bool,
    /// Set when the loop counter fires; the summary prompt reports it.
    stall_reason: Option<String>,
}

impl TaskLoop {
    fn record(&mut self, output: &StepOutput) {
        self.steps += 1;
        self.outputs.push(output.content.clone());
        self.request_halt |= output.request_halt;
    }
}

pub struct Worker {
    name: String,
    description: String,
    client: Arc<dyn ClientWrapper>,
    responder: Box<dyn StepResponder>,
    transcript: Transcript,
    config: WorkerConfig,
    loop_counter: LoopCounter,
    event_handler: Option<Arc<dyn EventHandler>>,
}

impl Worker {
    pub fn new<R: StepResponder + 'static>(
        name: impl Into<String>,
        description: impl Into<String>,
        client: Arc<dyn ClientWrapper>,
        responder: R,
    ) -> Self {
        let config = WorkerConfig::default();
        Self {
            name: name.into(),
            description: description.into(),
            client,
            responder: Box::new(responder),
            transcript: Transcript::new(),
            loop_counter: LoopCounter::new(config.stall_threshold),
            config,
            event_handler: None,
        }
    }

    pub fn with_config(mut self, config: WorkerConfig) -> Self {
        self.loop_counter = LoopCounter::new(config.stall_threshold);
        self.config = config;
        self
    }

    pub fn with_multi_step(mut self, enabled: bool) -> Self {
        self.config.multi_step = enabled;
        self
    }

    pub fn with_autoform(mut self, enabled: bool) -> Self {
        self.config.autoform = enabled;
        self
    }

    pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.event_handler = Some(handler);
        self
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn loop_counter(&self) -> &LoopCounter {
        &self.loop_counter
    }

    /// Add an entry as if it had been broadcast to this worker.
    pub fn push_message(&mut self, role: Role, content: impl Into<String>, source: impl Into<String>) {
        self.transcript.push(role, content, source);
    }

    async fn emit(&self, event: WorkerEvent) {
        if let Some(handler) = &self.event_handler {
            handler.on_worker_event(&event).await;
        }
    }

    fn prompts(&self) -> Prompts {
        Prompts::new(self.config.autoform)
    }

    /// Turn the current task into a reply, running the completion loop if
    /// multi-step mode is on. Does not record the reply itself.
    pub async fn generate_reply(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<AgentReply, OrchestrationError> {
        let task = match self.transcript.last() {
            Some(entry) => entry.content.clone(),
            None => return Err(OrchestrationError::EmptyTask(self.name.clone())),
        };

        if !self.config.multi_step {
            let output = self.step(&task, cancel).await?;
            return Ok(AgentReply {
                content: output.content,
                request_halt: output.request_halt,
            });
        }

        let mut state = TaskLoop::default();
        let mut current_task = task.clone();
        loop {
            if cancel.is_cancelled() {
                return Err(OrchestrationError::Cancelled);
            }

            let output = self.step(&current_task, cancel).await?;
            state.record(&output);
            self.emit(WorkerEvent::StepCompleted {
                agent_name: self.name.clone(),
                step: state.steps,
                output_length: output.content.len(),
            })
            .await;

            let verdict = self
                .check_completion(&current_task, &state, &output.content, cancel)
                .await?;

            // Only a fully parsed verdict reaches the transcript.
            self.transcript
                .push(Role::User, output.content.clone(), self.name.clone());
            self.transcript
                .push(Role::User, verdict.status_line(), self.name.clone());
            self.transcript.push(
                Role::User,
                verdict.instruction_or_question.clone(),
                self.name.clone(),
            );

            let stalled = self
                .loop_counter
                .observe(verdict.is_in_loop, verdict.is_progress_being_made);
            self.emit(WorkerEvent::VerdictReceived {
                agent_name: self.name.clone(),
                step: state.steps,
                satisfied: verdict.is_request_satisfied,
                in_loop: verdict.is_in_loop,
                progress: verdict.is_progress_being_made,
                loop_counter: self.loop_counter.count(),
            })
            .await;

            if stalled {
                log::warn!(
                    "{}: task in loop for the following reason: {}. Exiting.",
                    self.name,
                    verdict.loop_reason
                );
                state.stall_reason = Some(verdict.loop_reason.clone());
                self.emit(WorkerEvent::StallDetected {
                    agent_name: self.name.clone(),
                    step: state.steps,
                    reason: verdict.loop_reason.clone(),
                })
                .await;
                break;
            }
            if verdict.is_request_satisfied || state.request_halt {
                break;
            }
            current_task = verdict.instruction_or_question;
        }

        self.loop_counter.reset();
        let summary = self.summarize(&task, &state, cancel).await?;
        self.emit(WorkerEvent::SummaryProduced {
            agent_name: self.name.clone(),
            steps: state.steps,
            length: summary.len(),
        })
        .await;

        Ok(AgentReply {
            content: summary,
            request_halt: state.request_halt,
        })
    }

    async fn step(
        &self,
        task: &str,
        cancel: &CancellationToken,
    ) -> Result<StepOutput, OrchestrationError> {
        let ctx = StepContext {
            agent_name: &self.name,
            transcript: &self.transcript,
            task,
            event_handler: self.event_handler.as_ref(),
        };
        self.responder.respond(&ctx, cancel).await
    }

    async fn check_completion(
        &self,
        task: &str,
        state: &TaskLoop,
        result: &str,
        cancel: &CancellationToken,
    ) -> Result<Verdict, OrchestrationError> {
        let prompts = self.prompts();
        // The raw result is embedded as a JSON string literal.
        let result_json = serde_json::Value::String(result.to_string()).to_string();
        let messages = vec![
            Message::system(prompts.completion_check_system()),
            Message::user(prompts.completion_check(
                &self.name,
                &self.transcript.render(),
                task,
                &state.outputs.join("\n"),
                &result_json,
            ))
            .with_source(self.name.clone()),
        ];

        let response = self
            .client
            .send_message(&messages, &CompletionOptions::json(), cancel)
            .await?;
        log::debug!(
            "{}: completion verdict received ({} chars)",
            self.name,
            response.content.len()
        );
        Verdict::parse(&response.content, &self.name)
    }

    async fn summarize(
        &self,
        task: &str,
        state: &TaskLoop,
        cancel: &CancellationToken,
    ) -> Result<String, OrchestrationError> {
        let prompts = self.prompts();
        let messages = vec![
            Message::system(prompts.summary_system()),
            Message::user(prompts.summary(
                task,
                &state.outputs.join("\n"),
                state.stall_reason.as_deref(),
            ))
            .with_source(self.name.clone()),
        ];
        let response = self
            .client
            .send_message(&messages, &CompletionOptions::text(), cancel)
            .await?;
        Ok(response.content.to_string())
    }
}

#[async_trait]
impl TeamAgent for Worker {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    async fn handle_broadcast(&mut self, message: &Broadcast) {
        self.transcript
            .push(Role::User, message.content.clone(), message.source.clone());
    }

    async fn handle_reset(&mut self) {
        self.transcript.clear();
        self.loop_counter.reset();
    }

    /// Generate the reply and record it as this worker's own assistant turn.
    /// The orchestrator broadcasts it to everyone else.
    async fn handle_reply_request(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<AgentReply, OrchestrationError> {
        let reply = self.generate_reply(cancel).await?;
        self.transcript
            .push(Role::Assistant, reply.content.clone(), self.name.clone());
        Ok(reply)
    }

    fn set_event_handler(&mut self, handler: Arc<dyn EventHandler>) {
        self.event_handler = Some(handler);
    }
}
