//! Error taxonomy shared by workers and the orchestrator.
//!
//! Three families matter to callers:
//!
//! - transport failures ([`OrchestrationError::Oracle`]) bubble up untouched;
//! - protocol violations ([`OrchestrationError::InvalidLedger`] and
//!   [`OrchestrationError::OracleFormat`]) mean the oracle broke its JSON
//!   contract and the run cannot continue;
//! - setup and usage errors (empty task, unknown or duplicate agents).
//!
//! Tool failures are not represented here. They are rendered into text and
//! fed back to the oracle, see [`crate::tool_protocol::describe_outcome`].

use std::error::Error;
use std::fmt;

use crate::teamledger::client_wrapper::OracleError;

#[derive(Debug, Clone, PartialEq)]
pub enum OrchestrationError {
    /// The oracle call failed at the transport level.
    Oracle(OracleError),
    /// The ledger JSON was malformed or named a speaker outside the roster.
    InvalidLedger(String),
    /// A worker-side JSON judgment (verdict or completion confirmation)
    /// could not be parsed.
    OracleFormat { agent: String, detail: String },
    /// A reply was requested from an agent whose transcript is empty.
    EmptyTask(String),
    /// A message was addressed to a name that is not registered.
    AgentNotFound(String),
    /// An agent with the same name is already registered.
    DuplicateAgent(String),
    /// A run was started without any registered agent.
    EmptyRoster,
    /// The run was cancelled between two oracle calls.
    Cancelled,
}

impl OrchestrationError {
    /// True when the oracle produced output that violates the JSON contract.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            OrchestrationError::InvalidLedger(_) | OrchestrationError::OracleFormat { .. }
        )
    }

    /// True when the error stems from the cancellation token.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            OrchestrationError::Cancelled | OrchestrationError::Oracle(OracleError::Cancelled)
        )
    }
}

impl fmt::Display for OrchestrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrchestrationError::Oracle(err) => write!(f, "{}", err),
            OrchestrationError::InvalidLedger(msg) => write!(f, "Invalid ledger: {}", msg),
            OrchestrationError::OracleFormat { agent, detail } => {
                write!(f, "Malformed oracle output for {}: {}", agent, detail)
            }
            OrchestrationError::EmptyTask(agent) => {
                write!(f, "Agent {} has no task in its transcript", agent)
            }
            OrchestrationError::AgentNotFound(name) => write!(f, "Agent not found: {}", name),
            OrchestrationError::DuplicateAgent(name) => {
                write!(f, "Agent already registered: {}", name)
            }
            OrchestrationError::EmptyRoster => write!(f, "No agents registered"),
            OrchestrationError::Cancelled => write!(f, "Run cancelled"),
        }
    }
}

impl Error for OrchestrationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            OrchestrationError::Oracle(err) => Some(err),
            _ => None,
        }
    }
}

impl From<OracleError> for OrchestrationError {
    fn from(err: OracleError) -> Self {
        OrchestrationError::Oracle(err)
    }
}
