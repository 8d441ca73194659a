//! Run and worker configuration.
//!
//! Both structs are plain values built in code; no config-file format is
//! involved. A [`RunConfig`] is handed to
//! [`LedgerOrchestrator::new`](crate::orchestration::LedgerOrchestrator::new)
//! by value and never changes afterwards. To run with different settings,
//! build a new orchestrator.
//!
//! # Example
//!
//! ```rust
//! use teamledger::config::RunConfig;
//! use std::time::Duration;
//!
//! let config = RunConfig::default()
//!     .with_max_rounds(10)
//!     .with_max_time(Duration::from_secs(120))
//!     .with_final_check(true);
//!
//! assert_eq!(config.max_rounds, 10);
//! assert!(config.return_final_answer);
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::teamledger::stall::DEFAULT_STALL_THRESHOLD;

/// Budget and behaviour switches for one orchestrated run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Upper bound on ledger rounds.
    pub max_rounds: usize,
    /// Wall-clock budget, checked before each round only.
    pub max_time: Duration,
    /// Ask the oracle for a user-facing answer once the request is satisfied.
    pub return_final_answer: bool,
    /// Keep transcripts between successive requests (multi-turn chat).
    pub infinite_conversation: bool,
    /// Double-check a "satisfied" ledger against a summary of the steps taken.
    pub final_check: bool,
    /// Use structured-output prompt wording.
    pub autoform: bool,
    /// Survey facts and draft a plan before the first round, and re-plan on
    /// outer stalls.
    pub planning: bool,
    /// Consecutive stalled rounds tolerated before the run ends as stalled.
    /// Only honoured when `infinite_conversation` is false.
    pub outer_stall_limit: Option<usize>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_rounds: 30,
            max_time: Duration::from_secs(25 * 60),
            return_final_answer: true,
            infinite_conversation: false,
            final_check: false,
            autoform: false,
            planning: false,
            outer_stall_limit: None,
        }
    }
}

impl RunConfig {
    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn with_max_time(mut self, max_time: Duration) -> Self {
        self.max_time = max_time;
        self
    }

    pub fn with_return_final_answer(mut self, enabled: bool) -> Self {
        self.return_final_answer = enabled;
        self
    }

    pub fn with_infinite_conversation(mut self, enabled: bool) -> Self {
        self.infinite_conversation = enabled;
        self
    }

    pub fn with_final_check(mut self, enabled: bool) -> Self {
        self.final_check = enabled;
        self
    }

    pub fn with_autoform(mut self, enabled: bool) -> Self {
        self.autoform = enabled;
        self
    }

    pub fn with_planning(mut self, enabled: bool) -> Self {
        self.planning = enabled;
        self
    }

    pub fn with_outer_stall_limit(mut self, limit: usize) -> Self {
        self.outer_stall_limit = Some(limit);
        self
    }

    /// The stall limit that actually applies to this run, if any.
    pub fn effective_outer_stall_limit(&self) -> Option<usize> {
        if self.infinite_conversation {
            None
        } else {
            self.outer_stall_limit
        }
    }
}

/// Settings of a single worker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Run the task-completion loop. When false the responder is called once.
    pub multi_step: bool,
    /// Use structured-output prompt wording.
    pub autoform: bool,
    /// Consecutive stalled verdicts tolerated before the inner loop is cut.
    pub stall_threshold: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            multi_step: true,
            autoform: false,
            stall_threshold: DEFAULT_STALL_THRESHOLD,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outer_stall_limit_ignored_in_infinite_conversation() {
        let config = RunConfig::default().with_outer_stall_limit(2);
        assert_eq!(config.effective_outer_stall_limit(), Some(2));

        let config = config.with_infinite_conversation(true);
        assert_eq!(config.effective_outer_stall_limit(), None);
    }

    #[test]
    fn test_run_config_serde() {
        let config = RunConfig::default().with_max_rounds(3).with_autoform(true);
        let json = serde_json::to_string(&config).unwrap();
        let back: RunConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_worker_defaults() {
        let config = WorkerConfig::default();
        assert!(config.multi_step);
        assert_eq!(config.stall_threshold, 3);
    }
}
