//! Per-agent conversation record.
//!
//! Every agent (workers and the orchestrator alike) owns exactly one
//! [`Transcript`]. Entries are only ever appended while a run is in progress;
//! [`Transcript::clear`] is reserved for an explicit reset.

use crate::teamledger::client_wrapper::{Message, Role};

/// One typed chat entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TranscriptEntry {
    pub role: Role,
    pub content: String,
    /// Name of the agent (or `"user"`) that produced the entry.
    pub source: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, role: Role, content: impl Into<String>, source: impl Into<String>) {
        self.entries.push(TranscriptEntry {
            role,
            content: content.into(),
            source: source.into(),
        });
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The most recent entry. For a worker this is its current task.
    pub fn last(&self) -> Option<&TranscriptEntry> {
        self.entries.last()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Convert to oracle messages, preserving order and sources.
    pub fn to_messages(&self) -> Vec<Message> {
        self.entries
            .iter()
            .map(|entry| Message::new(entry.role, &entry.content).with_source(entry.source.clone()))
            .collect()
    }

    /// Flatten into `source: content` lines for embedding inside a prompt.
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|entry| format!("{}: {}", entry.source, entry.content))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
