use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::teamledger::tool_protocol::ToolMetadata;

/// A ClientWrapper is the oracle every agent and the orchestrator consult.
/// It takes an ordered message list and returns exactly one completion.
/// It keeps no conversation state of its own; transcripts live with the
/// agents that own them.
// src/teamledger/client_wrapper

/// Represents the possible roles for a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    // a message from a human user or from another agent
    User,
    // content generated by the model (or by the agent owning the transcript)
    Assistant,
}

/// A tool invocation requested by the model in place of (or next to) text.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Raw argument text exactly as the model produced it. It is expected
    /// to be a JSON object but nothing guarantees that.
    pub arguments: String,
}

/// Represents a generic message exchanged with the oracle.
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    /// The role associated with the message.
    pub role: Role,
    /// The actual content of the message.
    pub content: Arc<str>,
    /// Name of the agent that produced the content, when known.
    pub source: Option<String>,
    /// Tool calls requested by the model. Always empty on outgoing messages.
    pub tool_calls: Vec<ToolCall>,
}

impl Message {
    pub fn new(role: Role, content: impl AsRef<str>) -> Self {
        Self {
            role,
            content: Arc::from(content.as_ref()),
            source: None,
            tool_calls: Vec::new(),
        }
    }

    pub fn system(content: impl AsRef<str>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl AsRef<str>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl AsRef<str>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Tag the message with the name of the agent that wrote it.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Attach tool calls, used by clients when decoding a model response.
    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.tool_calls = tool_calls;
        self
    }
}

/// Per-call knobs for [`ClientWrapper::send_message`].
#[derive(Clone, Debug, Default)]
pub struct CompletionOptions {
    /// Tool schemas the model may call. Empty means no tools are offered.
    pub tools: Vec<ToolMetadata>,
    /// Demand a single strict JSON object as the completion content.
    pub json_output: bool,
}

impl CompletionOptions {
    /// Plain text completion, no tools.
    pub fn text() -> Self {
        Self::default()
    }

    /// Strict JSON completion, no tools.
    pub fn json() -> Self {
        Self {
            tools: Vec::new(),
            json_output: true,
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolMetadata>) -> Self {
        self.tools = tools;
        self
    }
}

/// Failures raised by the oracle transport itself.
#[derive(Debug, Clone, PartialEq)]
pub enum OracleError {
    /// Network, HTTP status or response decoding failure.
    Transport(String),
    /// The cancellation token fired while the call was in flight.
    Cancelled,
}

impl fmt::Display for OracleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OracleError::Transport(msg) => write!(f, "Oracle transport error: {}", msg),
            OracleError::Cancelled => write!(f, "Oracle call cancelled"),
        }
    }
}

impl Error for OracleError {}

/// Trait defining the completion call every oracle backend must provide.
#[async_trait]
pub trait ClientWrapper: Send + Sync {
    /// Send the messages to the model and return one completion.
    ///
    /// When `options.json_output` is set the returned content must be a single
    /// JSON object. Callers validate it; clients only pass the flag along.
    /// Implementations must stop waiting as soon as `cancel` fires.
    async fn send_message(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
        cancel: &CancellationToken,
    ) -> Result<Message, OracleError>;

    /// Identifier of the backing model, used in logs.
    fn model_name(&self) -> &str;
}
