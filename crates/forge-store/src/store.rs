//! # Store Traits
//!
//! The persistence boundary the runtime depends on. Implementations are
//! synchronous — callers hold no locks across them, and SQLite operations
//! at this scale are sub-millisecond.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use forge_core::ids::{ConversationId, MessageId, RunId};
use forge_core::state::{Fragment, MessageKind, OutcomeRecord, Role};

use crate::errors::Result;

/// Input for creating a message.
#[derive(Clone, Debug)]
pub struct NewMessage {
    /// Conversation the message belongs to.
    pub conversation_id: ConversationId,
    /// Author role.
    pub role: Role,
    /// Message kind.
    pub kind: MessageKind,
    /// Message text.
    pub content: String,
    /// Fragment attached to RESULT messages.
    pub fragment: Option<Fragment>,
}

impl NewMessage {
    /// A user-authored RESULT message (the conversation input side).
    #[must_use]
    pub fn user(conversation_id: ConversationId, content: String) -> Self {
        Self {
            conversation_id,
            role: Role::User,
            kind: MessageKind::Result,
            content,
            fragment: None,
        }
    }

    /// Convert a run outcome into the assistant message to persist.
    #[must_use]
    pub fn from_outcome(outcome: OutcomeRecord) -> Self {
        Self {
            conversation_id: outcome.conversation_id,
            role: Role::Assistant,
            kind: outcome.kind,
            content: outcome.content,
            fragment: outcome.fragment,
        }
    }
}

/// A persisted message.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMessage {
    /// Message id.
    pub id: MessageId,
    /// Conversation the message belongs to.
    pub conversation_id: ConversationId,
    /// Author role.
    pub role: Role,
    /// Message kind.
    pub kind: MessageKind,
    /// Message text.
    pub content: String,
    /// Fragment attached to RESULT messages.
    pub fragment: Option<Fragment>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Message persistence boundary.
pub trait MessageStore: Send + Sync {
    /// The most recent `limit` messages of a conversation, oldest first.
    fn find_recent(
        &self,
        conversation_id: &ConversationId,
        limit: usize,
    ) -> Result<Vec<StoredMessage>>;

    /// Persist a message.
    fn create(&self, message: NewMessage) -> Result<StoredMessage>;
}

/// Append-only log of durable step results, keyed by `(run_id, step_name)`.
///
/// `record` is first-write-wins: once a result exists for a key, later
/// writes are ignored. Replays of a run therefore converge on the results
/// of the first execution.
pub trait StepLog: Send + Sync {
    /// Fetch a previously recorded result.
    fn get(&self, run_id: &RunId, step_name: &str) -> Result<Option<Value>>;

    /// Record a result unless one already exists for this key.
    fn record(&self, run_id: &RunId, step_name: &str, result: &Value) -> Result<()>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use forge_core::state::RunState;
    use std::collections::BTreeMap;

    #[test]
    fn from_outcome_maps_fields() {
        let state = RunState {
            summary: "done".into(),
            files: BTreeMap::from([("a.txt".to_owned(), "x".to_owned())]),
        };
        let outcome = OutcomeRecord::classify(
            ConversationId::from("c1"),
            &state,
            "Title".into(),
            "Response".into(),
            "https://host".into(),
        );
        let message = NewMessage::from_outcome(outcome);
        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.kind, MessageKind::Result);
        assert_eq!(message.content, "Response");
        assert!(message.fragment.is_some());
    }

    #[test]
    fn user_message_has_no_fragment() {
        let message = NewMessage::user(ConversationId::from("c1"), "build a page".into());
        assert_eq!(message.role, Role::User);
        assert!(message.fragment.is_none());
    }

    #[test]
    fn traits_are_object_safe() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn MessageStore>();
        assert_send_sync::<dyn StepLog>();
    }
}
