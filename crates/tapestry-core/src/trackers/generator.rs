//! Generator status tracker: flat message log for a whole generation run.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorMessage {
    pub message: String,
    pub is_failure: bool,
}

/// Collects messages across every step of a run for an end-of-run summary.
///
/// No hierarchy and no per-step typing; printing is left to whoever reads
/// `messages()`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneratorStatus {
    messages: Vec<GeneratorMessage>,
    failure_count: usize,
}

impl GeneratorStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_message(&mut self, message: impl Into<String>, is_failure: bool) {
        if is_failure {
            self.failure_count += 1;
        }
        self.messages.push(GeneratorMessage {
            message: message.into(),
            is_failure,
        });
    }

    pub fn add_failure(&mut self, message: impl Into<String>) {
        self.add_message(message, true);
    }

    pub fn has_failures(&self) -> bool {
        self.failure_count > 0
    }

    pub fn failure_count(&self) -> usize {
        self.failure_count
    }

    /// All messages in the order they were added.
    pub fn messages(&self) -> &[GeneratorMessage] {
        &self.messages
    }

    pub fn failures(&self) -> impl Iterator<Item = &GeneratorMessage> {
        self.messages.iter().filter(|m| m.is_failure)
    }
}
