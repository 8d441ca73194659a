//! Structured judgments returned by the oracle.
//!
//! Three JSON shapes are exchanged:
//!
//! - the orchestrator [`Ledger`], one per round;
//! - the worker [`Verdict`], one per inner step;
//! - the [`CompletionConfirmation`] used by the optional final check.
//!
//! Ledger and verdict share the wire convention of wrapping every judgment in
//! a `{"reason": ..., "answer": ...}` object:
//!
//! ```json
//! {
//!   "is_request_satisfied":    {"reason": "...", "answer": false},
//!   "is_in_loop":              {"reason": "...", "answer": false},
//!   "is_progress_being_made":  {"reason": "...", "answer": true},
//!   "next_speaker":            {"reason": "...", "answer": "MailWorker"},
//!   "instruction_or_question": {"reason": "...", "answer": "List unread mail"}
//! }
//! ```
//!
//! The verdict omits `next_speaker`. Parsing is strict: the content must be a
//! single JSON object and nothing else. Code fences or surrounding prose are
//! treated as a protocol violation rather than repaired.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::teamledger::error::OrchestrationError;

/// One judgment on the wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Judgment<T> {
    pub reason: String,
    pub answer: T,
}

/// The orchestrator's per-round decision.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    pub is_request_satisfied: Judgment<bool>,
    pub is_in_loop: Judgment<bool>,
    pub is_progress_being_made: Judgment<bool>,
    pub next_speaker: Judgment<String>,
    pub instruction_or_question: Judgment<String>,
}

impl Ledger {
    /// Parse a ledger and check that `next_speaker` names a roster member.
    ///
    /// Both a malformed payload and an unknown speaker are reported as
    /// [`OrchestrationError::InvalidLedger`]. There is no fallback speaker.
    pub fn parse(raw: &str, roster: &[String]) -> Result<Ledger, OrchestrationError> {
        let ledger: Ledger = parse_strict(raw).map_err(OrchestrationError::InvalidLedger)?;
        if !roster.iter().any(|name| name == &ledger.next_speaker.answer) {
            return Err(OrchestrationError::InvalidLedger(format!(
                "next_speaker '{}' is not one of [{}]",
                ledger.next_speaker.answer,
                roster.join(", ")
            )));
        }
        Ok(ledger)
    }

    pub fn is_satisfied(&self) -> bool {
        self.is_request_satisfied.answer
    }

    /// In a loop and not making progress.
    pub fn is_stalled(&self) -> bool {
        self.is_in_loop.answer && !self.is_progress_being_made.answer
    }

    pub fn next_speaker(&self) -> &str {
        &self.next_speaker.answer
    }

    pub fn instruction(&self) -> &str {
        &self.instruction_or_question.answer
    }
}

#[derive(Deserialize)]
struct VerdictWire {
    is_request_satisfied: Judgment<bool>,
    is_in_loop: Judgment<bool>,
    is_progress_being_made: Judgment<bool>,
    instruction_or_question: Judgment<String>,
}

/// A worker's self-judgment after one inner step, flattened for use.
#[derive(Clone, Debug, PartialEq)]
pub struct Verdict {
    pub is_request_satisfied: bool,
    pub reason: String,
    pub instruction_or_question: String,
    pub is_in_loop: bool,
    pub loop_reason: String,
    pub is_progress_being_made: bool,
    pub progress_reason: String,
}

impl Verdict {
    /// Parse a verdict produced for `agent`. Failures are
    /// [`OrchestrationError::OracleFormat`] and are never retried.
    pub fn parse(raw: &str, agent: &str) -> Result<Verdict, OrchestrationError> {
        let wire: VerdictWire =
            parse_strict(raw).map_err(|detail| OrchestrationError::OracleFormat {
                agent: agent.to_string(),
                detail,
            })?;
        Ok(Verdict {
            is_request_satisfied: wire.is_request_satisfied.answer,
            reason: wire.is_request_satisfied.reason,
            instruction_or_question: wire.instruction_or_question.answer,
            is_in_loop: wire.is_in_loop.answer,
            loop_reason: wire.is_in_loop.reason,
            is_progress_being_made: wire.is_progress_being_made.answer,
            progress_reason: wire.is_progress_being_made.reason,
        })
    }

    pub fn is_stalled(&self) -> bool {
        self.is_in_loop && !self.is_progress_being_made
    }

    /// The status entry a worker appends to its transcript after each step.
    pub fn status_line(&self) -> String {
        let status = if self.is_request_satisfied {
            "Complete"
        } else {
            "Incomplete"
        };
        format!("Task completion status: {}\nReason: {}.", status, self.reason)
    }
}

/// Answer to the post-hoc "is the request truly satisfied?" question.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompletionConfirmation {
    pub request_satisfied: bool,
    pub reason: String,
}

impl CompletionConfirmation {
    pub fn parse(raw: &str, agent: &str) -> Result<Self, OrchestrationError> {
        parse_strict(raw).map_err(|detail| OrchestrationError::OracleFormat {
            agent: agent.to_string(),
            detail,
        })
    }
}

fn parse_strict<T: DeserializeOwned>(raw: &str) -> Result<T, String> {
    let trimmed = raw.trim();
    if !trimmed.starts_with('{') {
        return Err(format!("expected a JSON object, got: {}", preview(trimmed)));
    }
    serde_json::from_str(trimmed).map_err(|e| format!("{} in: {}", e, preview(trimmed)))
}

fn preview(text: &str) -> String {
    const MAX: usize = 120;
    if text.chars().count() <= MAX {
        text.to_string()
    } else {
        let cut: String = text.chars().take(MAX).collect();
        format!("{}...", cut)
    }
}
