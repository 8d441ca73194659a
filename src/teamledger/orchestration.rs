//! Ledger-driven orchestration of a worker team.
//!
//! The [`LedgerOrchestrator`] owns a roster of agents and a transcript of
//! its own. A run moves through a fixed set of states:
//!
//! ```text
//! INIT ──(broadcast request)──> ROUND_DECIDE ⇄ ROUND_DISPATCH ──> FINALIZE ──> TERMINATED
//! ```
//!
//! Before every `ROUND_DECIDE` the budgets are checked, in this order:
//!
//! 1. elapsed wall-clock time ≥ `max_time` → "time budget exceeded"
//! 2. rounds executed ≥ `max_rounds` → "round budget exceeded"
//!
//! `ROUND_DECIDE` asks the oracle for a [`Ledger`] (strict JSON). A
//! satisfied ledger ends the run with "request satisfied", unless the
//! optional final check vetoes it. Otherwise `ROUND_DISPATCH` hands the
//! ledger's instruction to `next_speaker`, requests its reply, and then
//! shares instruction and reply with the rest of the team.
//!
//! The time budget is only checked between rounds (and once before
//! planning). A slow oracle call or a long worker loop can overrun it by up
//! to one round.
//!
//! # Example
//!
//! ```rust,no_run
//! use teamledger::clients::openai::OpenAIClient;
//! use teamledger::config::RunConfig;
//! use teamledger::responders::ChatResponder;
//! use teamledger::{LedgerOrchestrator, Worker};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Arc::new(OpenAIClient::new_with_model_string("sk-...", "gpt-4o"));
//! let mut orchestrator = LedgerOrchestrator::new(client.clone(), RunConfig::default());
//! orchestrator.add_agent(Worker::new(
//!     "ChatWorker",
//!     "Answers general questions and drafts text",
//!     client.clone(),
//!     ChatResponder::new(client.clone()),
//! ))?;
//!
//! let outcome = orchestrator
//!     .run("Draft a two-line thank-you note", &CancellationToken::new())
//!     .await?;
//! println!("{}: {:?}", outcome.reason, outcome.final_answer);
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::teamledger::bus::{AgentRegistry, AgentReply, Broadcast, BusMessage, TeamAgent};
use crate::teamledger::client_wrapper::{ClientWrapper, CompletionOptions, Message, Role};
use crate::teamledger::config::RunConfig;
use crate::teamledger::error::OrchestrationError;
use crate::teamledger::event::{EventHandler, OrchestrationEvent};
use crate::teamledger::ledger::{CompletionConfirmation, Ledger};
use crate::teamledger::prompts::Prompts;
use crate::teamledger::stall::{LoopCounter, DEFAULT_STALL_THRESHOLD};
use crate::teamledger::transcript::Transcript;

/// Name the orchestrator uses as the source of its own messages.
pub const ORCHESTRATOR_NAME: &str = "Orchestrator";
/// Source recorded for the user's request.
pub const USER_SOURCE: &str = "user";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    Init,
    RoundDecide,
    RoundDispatch,
    Finalize,
    Terminated,
}

/// Why a run ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TerminationReason {
    TimeBudgetExceeded,
    RoundBudgetExceeded,
    RequestSatisfied,
    /// Outer loop escalation, carrying the ledger's loop reason.
    Stalled(String),
    /// An agent (normally the user proxy) asked to stop.
    HaltRequested(String),
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationReason::TimeBudgetExceeded => write!(f, "time budget exceeded"),
            TerminationReason::RoundBudgetExceeded => write!(f, "round budget exceeded"),
            TerminationReason::RequestSatisfied => write!(f, "request satisfied"),
            TerminationReason::Stalled(reason) => write!(f, "stalled: {}", reason),
            TerminationReason::HaltRequested(agent) => write!(f, "halt requested by {}", agent),
        }
    }
}

/// Result of a completed run.
#[derive(Clone, Debug)]
pub struct RunOutcome {
    pub run_id: String,
    pub reason: TerminationReason,
    /// User-facing answer, only when satisfied and `return_final_answer` is set.
    pub final_answer: Option<String>,
    /// The oracle's explanation of why the request is satisfied.
    pub satisfaction_reason: Option<String>,
    /// Ledger rounds executed.
    pub rounds: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunOutcome {
    pub fn is_satisfied(&self) -> bool {
        self.reason == TerminationReason::RequestSatisfied
    }
}

pub struct LedgerOrchestrator {
    name: String,
    client: Arc<dyn ClientWrapper>,
    config: RunConfig,
    prompts: Prompts,
    registry: AgentRegistry,
    transcript: Transcript,
    outer_counter: LoopCounter,
    state: RunState,
    task: String,
    facts: Option<String>,
    plan: Option<String>,
    event_handler: Option<Arc<dyn EventHandler>>,
    run_id: String,
}

impl LedgerOrchestrator {
    pub fn new(client: Arc<dyn ClientWrapper>, config: RunConfig) -> Self {
        let prompts = Prompts::new(config.autoform);
        let outer_counter = LoopCounter::new(
            config
                .effective_outer_stall_limit()
                .unwrap_or(DEFAULT_STALL_THRESHOLD),
        );
        Self {
            name: ORCHESTRATOR_NAME.to_string(),
            client,
            config,
            prompts,
            registry: AgentRegistry::new(),
            transcript: Transcript::new(),
            outer_counter,
            state: RunState::Init,
            task: String::new(),
            facts: None,
            plan: None,
            event_handler: None,
            run_id: String::new(),
        }
    }

    /// Set the handler and hand it to every agent already registered.
    pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.registry.set_event_handler(handler.clone());
        self.event_handler = Some(handler);
        self
    }

    /// Register an agent. Names must be unique and differ from the
    /// orchestrator's own name.
    pub fn add_agent<A: TeamAgent + 'static>(&mut self, agent: A) -> Result<(), OrchestrationError> {
        let mut agent: Box<dyn TeamAgent> = Box::new(agent);
        if agent.name() == self.name {
            return Err(OrchestrationError::DuplicateAgent(self.name.clone()));
        }
        if let Some(handler) = &self.event_handler {
            agent.set_event_handler(handler.clone());
        }
        self.registry.register_boxed(agent)
    }

    /// Register an agent built by `factory` from `name`.
    pub fn register_with<F, A>(&mut self, name: impl Into<String>, factory: F) -> Result<(), OrchestrationError>
    where
        F: FnOnce(String) -> A,
        A: TeamAgent + 'static,
    {
        let name = name.into();
        if name == self.name || self.registry.contains(&name) {
            return Err(OrchestrationError::DuplicateAgent(name));
        }
        self.add_agent(factory(name))
    }

    pub fn roster(&self) -> Vec<String> {
        self.registry.names()
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn agent_transcript(&self, name: &str) -> Option<&Transcript> {
        self.registry.get(name).map(|agent| agent.transcript())
    }

    /// Current fact sheet and plan, when planning is enabled.
    pub fn plan(&self) -> Option<(&str, &str)> {
        match (&self.facts, &self.plan) {
            (Some(facts), Some(plan)) => Some((facts.as_str(), plan.as_str())),
            _ => None,
        }
    }

    async fn emit(&self, event: OrchestrationEvent) {
        if let Some(handler) = &self.event_handler {
            handler.on_orchestration_event(&event).await;
        }
    }

    async fn set_state(&mut self, state: RunState) {
        self.state = state;
        self.emit(OrchestrationEvent::StateChanged {
            run_id: self.run_id.clone(),
            state,
        })
        .await;
    }

    /// Drive one request to a terminal state.
    ///
    /// Transport failures, protocol violations and cancellation are returned
    /// as errors. Budget exhaustion, satisfaction, stalls and halts are
    /// normal outcomes.
    ///
    /// When a speaker's reply fails, the instruction stays only in that
    /// speaker's transcript. The orchestrator and the other agents never
    /// record a round without its reply.
    pub async fn run(
        &mut self,
        request: &str,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, OrchestrationError> {
        let result = self.run_inner(request, cancel).await;
        if let Err(err) = &result {
            log::error!("Run {} aborted: {}", self.run_id, err);
            self.state = RunState::Terminated;
        }
        result
    }

    async fn run_inner(
        &mut self,
        request: &str,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, OrchestrationError> {
        if self.registry.is_empty() {
            return Err(OrchestrationError::EmptyRoster);
        }

        self.run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let clock = Instant::now();
        self.set_state(RunState::Init).await;

        if !self.config.infinite_conversation {
            self.transcript.clear();
            self.registry.reset_all().await;
            self.facts = None;
            self.plan = None;
        }
        self.outer_counter.reset();
        self.task = request.to_string();

        log::info!(
            "Run {} started with {} agents: {}",
            self.run_id,
            self.registry.len(),
            self.registry.names().join(", ")
        );
        self.emit(OrchestrationEvent::RunStarted {
            run_id: self.run_id.clone(),
            request: request.to_string(),
            agent_count: self.registry.len(),
        })
        .await;

        self.transcript.push(Role::User, request, USER_SOURCE);
        self.registry
            .publish(&Broadcast::new(request, USER_SOURCE), None)
            .await;

        // A budget that is already spent ends the run before any oracle call.
        if self.config.planning && self.exhausted_budget(clock, 0).is_none() {
            self.build_plan(cancel).await?;
        }

        let mut rounds = 0;
        let mut advisory: Option<String> = None;
        let mut satisfaction_reason = None;

        let reason = loop {
            if cancel.is_cancelled() {
                return Err(OrchestrationError::Cancelled);
            }
            if let Some(reason) = self.exhausted_budget(clock, rounds) {
                break reason;
            }

            self.set_state(RunState::RoundDecide).await;
            rounds += 1;
            self.emit(OrchestrationEvent::RoundStarted {
                run_id: self.run_id.clone(),
                round: rounds,
            })
            .await;

            let ledger = self.decide(advisory.as_deref(), cancel).await?;
            log::debug!(
                "Round {}: satisfied={} in_loop={} progress={} next={}",
                rounds,
                ledger.is_satisfied(),
                ledger.is_in_loop.answer,
                ledger.is_progress_being_made.answer,
                ledger.next_speaker()
            );
            self.emit(OrchestrationEvent::LedgerUpdated {
                run_id: self.run_id.clone(),
                round: rounds,
                satisfied: ledger.is_satisfied(),
                in_loop: ledger.is_in_loop.answer,
                progress: ledger.is_progress_being_made.answer,
                next_speaker: ledger.next_speaker().to_string(),
            })
            .await;

            if ledger.is_satisfied() {
                if !self.config.final_check {
                    satisfaction_reason = Some(ledger.is_request_satisfied.reason.clone());
                    break TerminationReason::RequestSatisfied;
                }
                let confirmation = self.confirm_completion(cancel).await?;
                if confirmation.request_satisfied {
                    satisfaction_reason = Some(confirmation.reason);
                    break TerminationReason::RequestSatisfied;
                }
                log::warn!("Round {}: final check vetoed completion: {}", rounds, confirmation.reason);
                self.emit(OrchestrationEvent::FinalCheckVetoed {
                    run_id: self.run_id.clone(),
                    round: rounds,
                    reason: confirmation.reason.clone(),
                })
                .await;
                self.broadcast_completion_plan(&confirmation.reason, cancel)
                    .await?;
            }

            let escalate = self.outer_counter.observe(
                ledger.is_in_loop.answer,
                ledger.is_progress_being_made.answer,
            );
            if ledger.is_stalled() {
                let loop_reason = ledger.is_in_loop.reason.clone();
                log::warn!(
                    "Round {}: team looping without progress ({} in a row): {}",
                    rounds,
                    self.outer_counter.count(),
                    loop_reason
                );
                self.emit(OrchestrationEvent::OuterStallObserved {
                    run_id: self.run_id.clone(),
                    round: rounds,
                    consecutive: self.outer_counter.count(),
                    reason: loop_reason.clone(),
                })
                .await;
                if escalate && self.config.effective_outer_stall_limit().is_some() {
                    break TerminationReason::Stalled(loop_reason);
                }
                advisory = Some(format!(
                    "the team seems stuck in a loop ({}). Prefer a different approach or a different team member.",
                    loop_reason
                ));
                if self.config.planning {
                    self.update_plan(cancel).await?;
                }
            } else {
                advisory = None;
            }

            self.set_state(RunState::RoundDispatch).await;
            let reply = self.dispatch(rounds, &ledger, cancel).await?;
            if reply.request_halt {
                break TerminationReason::HaltRequested(ledger.next_speaker().to_string());
            }
        };

        self.set_state(RunState::Finalize).await;
        let final_answer =
            if reason == TerminationReason::RequestSatisfied && self.config.return_final_answer {
                Some(self.final_answer(cancel).await?)
            } else {
                None
            };

        self.set_state(RunState::Terminated).await;
        log::info!("Run {} finished after {} rounds: {}", self.run_id, rounds, reason);
        self.emit(OrchestrationEvent::RunCompleted {
            run_id: self.run_id.clone(),
            rounds,
            reason: reason.clone(),
        })
        .await;

        Ok(RunOutcome {
            run_id: self.run_id.clone(),
            reason,
            final_answer,
            satisfaction_reason,
            rounds,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Budgets are checked in a fixed order: time first, then rounds.
    fn exhausted_budget(&self, clock: Instant, rounds: usize) -> Option<TerminationReason> {
        if clock.elapsed() >= self.config.max_time {
            Some(TerminationReason::TimeBudgetExceeded)
        } else if rounds >= self.config.max_rounds {
            Some(TerminationReason::RoundBudgetExceeded)
        } else {
            None
        }
    }

    /// Ask the oracle for this round's ledger. Nothing is recorded unless
    /// the ledger parses and names a roster member.
    async fn decide(
        &self,
        advisory: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Ledger, OrchestrationError> {
        let names = self.registry.names();
        let prompt = self.prompts.ledger(
            &self.task,
            &self.registry.team_description(),
            &names,
            advisory,
        );
        let mut messages = self.transcript.to_messages();
        messages.push(Message::user(prompt).with_source(self.name.clone()));

        let response = self
            .client
            .send_message(&messages, &CompletionOptions::json(), cancel)
            .await?;
        Ledger::parse(&response.content, &names)
    }

    async fn dispatch(
        &mut self,
        round: usize,
        ledger: &Ledger,
        cancel: &CancellationToken,
    ) -> Result<AgentReply, OrchestrationError> {
        let speaker = ledger.next_speaker().to_string();
        let instruction = ledger.instruction().to_string();
        log::info!("Round {}: {} -> {}", round, speaker, instruction);
        self.emit(OrchestrationEvent::AgentSelected {
            run_id: self.run_id.clone(),
            round,
            agent_name: speaker.clone(),
            instruction: instruction.clone(),
        })
        .await;

        // Only the speaker sees the instruction before replying. The rest of
        // the team and the orchestrator record it once the reply is in, so a
        // failed or cancelled reply leaves their transcripts untouched.
        let instruction_broadcast = Broadcast::new(instruction.clone(), self.name.clone());
        self.registry
            .deliver(
                &speaker,
                BusMessage::Broadcast(instruction_broadcast.clone()),
                cancel,
            )
            .await?;
        let reply = self.registry.request_reply(&speaker, cancel).await?;

        self.transcript
            .push(Role::Assistant, instruction, self.name.clone());
        self.registry
            .publish(&instruction_broadcast, Some(&speaker))
            .await;
        self.transcript
            .push(Role::User, reply.content.clone(), speaker.clone());
        let broadcast = Broadcast {
            content: reply.content.clone(),
            source: speaker.clone(),
            request_halt: reply.request_halt,
        };
        // The speaker already recorded its own reply.
        self.registry.publish(&broadcast, Some(&speaker)).await;

        self.emit(OrchestrationEvent::AgentResponded {
            run_id: self.run_id.clone(),
            round,
            agent_name: speaker,
            response_length: reply.content.len(),
        })
        .await;
        Ok(reply)
    }

    async fn complete_text(
        &self,
        messages: Vec<Message>,
        cancel: &CancellationToken,
    ) -> Result<String, OrchestrationError> {
        let response = self
            .client
            .send_message(&messages, &CompletionOptions::text(), cancel)
            .await?;
        Ok(response.content.to_string())
    }

    /// Summarise the steps so far and ask whether the request is really done.
    async fn confirm_completion(
        &self,
        cancel: &CancellationToken,
    ) -> Result<CompletionConfirmation, OrchestrationError> {
        let steps = self
            .complete_text(
                vec![
                    Message::system(self.prompts.steps_summary_system()),
                    Message::user(
                        self.prompts
                            .steps_summary(&self.task, &self.transcript.render()),
                    ),
                ],
                cancel,
            )
            .await?;

        let messages = vec![Message::user(
            self.prompts.completion_confirmation(&self.task, &steps),
        )];
        let response = self
            .client
            .send_message(&messages, &CompletionOptions::json(), cancel)
            .await?;
        CompletionConfirmation::parse(&response.content, &self.name)
    }

    async fn broadcast_completion_plan(
        &mut self,
        reason: &str,
        cancel: &CancellationToken,
    ) -> Result<(), OrchestrationError> {
        let plan = self
            .complete_text(
                vec![
                    Message::system(self.prompts.completion_plan_system()),
                    Message::user(self.prompts.completion_plan(&self.task, reason)),
                ],
                cancel,
            )
            .await?;
        self.announce(plan).await;
        Ok(())
    }

    async fn build_plan(&mut self, cancel: &CancellationToken) -> Result<(), OrchestrationError> {
        let team = self.registry.team_description();
        let survey = Message::user(self.prompts.closed_book(&self.task));
        let facts = self.complete_text(vec![survey.clone()], cancel).await?;
        let plan = self
            .complete_text(
                vec![
                    survey,
                    Message::assistant(&facts),
                    Message::user(self.prompts.plan(&team)),
                ],
                cancel,
            )
            .await?;
        self.publish_plan(facts, plan).await;
        Ok(())
    }

    async fn update_plan(&mut self, cancel: &CancellationToken) -> Result<(), OrchestrationError> {
        let team = self.registry.team_description();
        let old_facts = self.facts.clone().unwrap_or_default();

        let mut messages = self.transcript.to_messages();
        messages.push(Message::user(self.prompts.update_facts(&self.task, &old_facts)));
        let facts = self.complete_text(messages, cancel).await?;

        let mut messages = self.transcript.to_messages();
        messages.push(Message::user(self.prompts.update_plan(&team)));
        let plan = self.complete_text(messages, cancel).await?;

        self.publish_plan(facts, plan).await;
        Ok(())
    }

    async fn publish_plan(&mut self, facts: String, plan: String) {
        let briefing = self.prompts.synthesize(
            &self.task,
            &self.registry.team_description(),
            &facts,
            &plan,
        );
        self.facts = Some(facts);
        self.plan = Some(plan.clone());
        self.announce(briefing).await;
        self.emit(OrchestrationEvent::PlanUpdated {
            run_id: self.run_id.clone(),
            plan,
        })
        .await;
    }

    /// Record content as the orchestrator's own turn and share it with the team.
    async fn announce(&mut self, content: String) {
        self.transcript
            .push(Role::Assistant, content.clone(), self.name.clone());
        self.registry
            .publish(&Broadcast::new(content, self.name.clone()), None)
            .await;
    }

    async fn final_answer(&mut self, cancel: &CancellationToken) -> Result<String, OrchestrationError> {
        let mut messages = self.transcript.to_messages();
        messages.push(Message::user(self.prompts.final_answer(&self.task)));
        let answer = self.complete_text(messages, cancel).await?;
        self.announce(answer.clone()).await;
        Ok(answer)
    }
}
