//! Message delivery between the orchestrator and its agents.
//!
//! Three message kinds exist: a broadcast (append to transcript), a
//! reply-request (act on the latest transcript entry and answer) and a reset
//! (clear all per-agent state). The [`AgentRegistry`] is an in-process bus:
//! it owns the agents and delivers messages by awaiting each handler in
//! turn, so delivery to any single agent is FIFO by construction.

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::teamledger::error::OrchestrationError;
use crate::teamledger::event::EventHandler;
use crate::teamledger::transcript::Transcript;

/// Content published to every agent.
#[derive(Clone, Debug, PartialEq)]
pub struct Broadcast {
    pub content: String,
    /// Name of the agent (or `"user"`) the content comes from.
    pub source: String,
    /// The source asks for the whole run to stop.
    pub request_halt: bool,
}

impl Broadcast {
    pub fn new(content: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            source: source.into(),
            request_halt: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum BusMessage {
    Broadcast(Broadcast),
    RequestReply,
    Reset,
}

/// What an agent returns for a reply request.
#[derive(Clone, Debug, PartialEq)]
pub struct AgentReply {
    pub content: String,
    pub request_halt: bool,
}

/// The capability surface the orchestrator relies on.
///
/// Concrete capabilities (mail, calendar, chat, ...) normally do not
/// implement this directly; they plug a
/// [`StepResponder`](crate::responders::StepResponder) into a
/// [`Worker`](crate::Worker).
#[async_trait]
pub trait TeamAgent: Send + Sync {
    fn name(&self) -> &str;

    /// One-line capability description shown to the orchestrator's oracle.
    fn description(&self) -> &str;

    fn transcript(&self) -> &Transcript;

    /// Append broadcast content to the transcript.
    async fn handle_broadcast(&mut self, message: &Broadcast);

    /// Clear the transcript and any loop bookkeeping.
    async fn handle_reset(&mut self);

    /// Act on the latest transcript entry and produce a reply.
    async fn handle_reply_request(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<AgentReply, OrchestrationError>;

    fn set_event_handler(&mut self, _handler: Arc<dyn EventHandler>) {}
}

/// Name-keyed, ordered set of registered agents.
#[derive(Default)]
pub struct AgentRegistry {
    agents: Vec<Box<dyn TeamAgent>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent under its own name. Names must be unique.
    pub fn register<A: TeamAgent + 'static>(&mut self, agent: A) -> Result<(), OrchestrationError> {
        self.register_boxed(Box::new(agent))
    }

    /// Register an agent built by `factory` from the given name.
    pub fn register_with<F, A>(
        &mut self,
        name: impl Into<String>,
        factory: F,
    ) -> Result<(), OrchestrationError>
    where
        F: FnOnce(String) -> A,
        A: TeamAgent + 'static,
    {
        let name = name.into();
        if self.contains(&name) {
            return Err(OrchestrationError::DuplicateAgent(name));
        }
        self.register(factory(name))
    }

    pub fn register_boxed(&mut self, agent: Box<dyn TeamAgent>) -> Result<(), OrchestrationError> {
        if self.contains(agent.name()) {
            return Err(OrchestrationError::DuplicateAgent(agent.name().to_string()));
        }
        self.agents.push(agent);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.agents.iter().any(|agent| agent.name() == name)
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Roster names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.agents.iter().map(|agent| agent.name().to_string()).collect()
    }

    /// `name: description` lines for the ledger prompt.
    pub fn team_description(&self) -> String {
        self.agents
            .iter()
            .map(|agent| format!("{}: {}", agent.name(), agent.description()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn get(&self, name: &str) -> Option<&dyn TeamAgent> {
        self.agents
            .iter()
            .find(|agent| agent.name() == name)
            .map(|agent| &**agent)
    }

    fn get_mut(&mut self, name: &str) -> Result<&mut Box<dyn TeamAgent>, OrchestrationError> {
        self.agents
            .iter_mut()
            .find(|agent| agent.name() == name)
            .ok_or_else(|| OrchestrationError::AgentNotFound(name.to_string()))
    }

    pub fn set_event_handler(&mut self, handler: Arc<dyn EventHandler>) {
        for agent in self.agents.iter_mut() {
            agent.set_event_handler(handler.clone());
        }
    }

    /// Deliver one message to one agent. Only reply requests produce a reply.
    pub async fn deliver(
        &mut self,
        target: &str,
        message: BusMessage,
        cancel: &CancellationToken,
    ) -> Result<Option<AgentReply>, OrchestrationError> {
        let agent = self.get_mut(target)?;
        match message {
            BusMessage::Broadcast(broadcast) => {
                agent.handle_broadcast(&broadcast).await;
                Ok(None)
            }
            BusMessage::Reset => {
                agent.handle_reset().await;
                Ok(None)
            }
            BusMessage::RequestReply => agent.handle_reply_request(cancel).await.map(Some),
        }
    }

    /// Broadcast to every agent, optionally skipping one (usually the author).
    pub async fn publish(&mut self, broadcast: &Broadcast, except: Option<&str>) {
        for agent in self.agents.iter_mut() {
            if Some(agent.name()) == except {
                continue;
            }
            agent.handle_broadcast(broadcast).await;
        }
    }

    pub async fn request_reply(
        &mut self,
        target: &str,
        cancel: &CancellationToken,
    ) -> Result<AgentReply, OrchestrationError> {
        match self.deliver(target, BusMessage::RequestReply, cancel).await? {
            Some(reply) => Ok(reply),
            None => Err(OrchestrationError::AgentNotFound(target.to_string())),
        }
    }

    pub async fn reset_all(&mut self) {
        for agent in self.agents.iter_mut() {
            agent.handle_reset().await;
        }
    }
}
