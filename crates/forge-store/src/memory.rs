//! In-memory store implementations for tests.

use std::collections::HashMap;

use chrono::Utc;
use parking_lot::Mutex;
use serde_json::Value;

use forge_core::ids::{ConversationId, MessageId, RunId};

use crate::errors::Result;
use crate::store::{MessageStore, NewMessage, StepLog, StoredMessage};

/// In-memory [`MessageStore`].
#[derive(Default)]
pub struct MemoryMessageStore {
    messages: Mutex<Vec<StoredMessage>>,
}

impl MemoryMessageStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored messages (all conversations).
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }

    /// Snapshot of all stored messages, insertion order.
    #[must_use]
    pub fn all(&self) -> Vec<StoredMessage> {
        self.messages.lock().clone()
    }
}

impl MessageStore for MemoryMessageStore {
    fn find_recent(
        &self,
        conversation_id: &ConversationId,
        limit: usize,
    ) -> Result<Vec<StoredMessage>> {
        let messages = self.messages.lock();
        let mut matching: Vec<StoredMessage> = messages
            .iter()
            .filter(|m| &m.conversation_id == conversation_id)
            .cloned()
            .collect();
        if matching.len() > limit {
            matching.drain(..matching.len() - limit);
        }
        Ok(matching)
    }

    fn create(&self, message: NewMessage) -> Result<StoredMessage> {
        let stored = StoredMessage {
            id: MessageId::new(),
            conversation_id: message.conversation_id,
            role: message.role,
            kind: message.kind,
            content: message.content,
            fragment: message.fragment,
            created_at: Utc::now(),
        };
        self.messages.lock().push(stored.clone());
        Ok(stored)
    }
}

/// In-memory [`StepLog`].
#[derive(Default)]
pub struct MemoryStepLog {
    steps: Mutex<HashMap<(RunId, String), Value>>,
}

impl MemoryStepLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.lock().len()
    }

    /// Whether the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.lock().is_empty()
    }

    /// Recorded step names for a run, unordered.
    #[must_use]
    pub fn step_names(&self, run_id: &RunId) -> Vec<String> {
        self.steps
            .lock()
            .keys()
            .filter(|(run, _)| run == run_id)
            .map(|(_, name)| name.clone())
            .collect()
    }
}

impl StepLog for MemoryStepLog {
    fn get(&self, run_id: &RunId, step_name: &str) -> Result<Option<Value>> {
        Ok(self
            .steps
            .lock()
            .get(&(run_id.clone(), step_name.to_owned()))
            .cloned())
    }

    fn record(&self, run_id: &RunId, step_name: &str, result: &Value) -> Result<()> {
        let mut steps = self.steps.lock();
        let _ = steps
            .entry((run_id.clone(), step_name.to_owned()))
            .or_insert_with(|| result.clone());
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
