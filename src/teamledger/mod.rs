// src/teamledger/mod.rs

pub mod bus;
pub mod client_wrapper;
pub mod clients;
pub mod config;
pub mod error;
pub mod event;
pub mod ledger;
pub mod orchestration;
pub mod prompts;
pub mod responders;
pub mod stall;
pub mod tool_protocol;
pub mod transcript;
pub mod worker;

// Shorter paths for the two types every caller touches.
pub use orchestration::LedgerOrchestrator;
pub use worker::Worker;
