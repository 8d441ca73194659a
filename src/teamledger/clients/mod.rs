//! Concrete [`ClientWrapper`](crate::client_wrapper::ClientWrapper) implementations.
//!
//! Only an OpenAI-compatible Chat Completions client ships with the crate.
//! Any other backend (or a scripted fake for tests) just implements the trait.

pub mod common;
pub mod openai;
