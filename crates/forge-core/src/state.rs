//! Run state and persisted outcome types.
//!
//! [`RunState`] is the shared mutable result a run accumulates across agent
//! iterations: a summary (empty until the agent signals completion) and the
//! map of files the agent has created or updated. The router owns the state
//! and is its single writer; tools report effects back to it rather than
//! mutating ambient shared data.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::constants::INCOMPLETE_RUN_MESSAGE;
use crate::ids::ConversationId;

/// Mutable result accumulated over one workflow run.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunState {
    /// Agent summary. Empty means the run has not completed yet.
    pub summary: String,
    /// Files created or updated in the sandbox, keyed by path.
    pub files: BTreeMap<String, String>,
}

impl RunState {
    /// Whether the agent has produced a summary.
    ///
    /// Once true, the router stops scheduling the agent and no further
    /// mutation of `files` or `summary` occurs.
    #[must_use]
    pub fn has_summary(&self) -> bool {
        !self.summary.is_empty()
    }

    /// Merge a batch of file writes into the state (last write per path wins).
    pub fn merge_files(&mut self, updates: BTreeMap<String, String>) {
        self.files.extend(updates);
    }

    /// Outcome classification: a run is incomplete iff the summary is empty
    /// OR no files were produced.
    #[must_use]
    pub fn is_incomplete(&self) -> bool {
        self.summary.is_empty() || self.files.is_empty()
    }
}

/// Role of a conversation entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A message authored by the end user.
    User,
    /// A message authored by the agent.
    Assistant,
}

impl Role {
    /// Stable string form used in persistence.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// Kind of a persisted outcome message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageKind {
    /// Successful run carrying a fragment.
    Result,
    /// Business-level incompleteness with a user-readable message.
    Error,
}

impl MessageKind {
    /// Stable string form used in persistence.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Result => "RESULT",
            Self::Error => "ERROR",
        }
    }
}

/// One prior conversation entry, read-only input to the agent.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationEntry {
    /// Who authored the entry.
    pub role: Role,
    /// The entry text.
    pub content: String,
}

/// Artifact bundle attached to a successful outcome.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fragment {
    /// Short generated title for the result.
    pub title: String,
    /// Externally reachable preview URL of the sandbox.
    pub sandbox_url: String,
    /// Full file map produced by the run.
    pub files: BTreeMap<String, String>,
}

/// The single persisted result of a run. Created exactly once, immutable.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeRecord {
    /// Conversation this outcome belongs to.
    pub conversation_id: ConversationId,
    /// User-facing content (formatted response, or the fixed error message).
    pub content: String,
    /// RESULT or ERROR.
    pub kind: MessageKind,
    /// Present only for RESULT outcomes.
    pub fragment: Option<Fragment>,
}

impl OutcomeRecord {
    /// Classify a finished run into the record to persist.
    ///
    /// Error iff the summary is empty OR the file map is empty; error
    /// outcomes carry the fixed message and no fragment.
    #[must_use]
    pub fn classify(
        conversation_id: ConversationId,
        state: &RunState,
        title: String,
        response: String,
        sandbox_url: String,
    ) -> Self {
        if state.is_incomplete() {
            Self {
                conversation_id,
                content: INCOMPLETE_RUN_MESSAGE.to_owned(),
                kind: MessageKind::Error,
                fragment: None,
            }
        } else {
            Self {
                conversation_id,
                content: response,
                kind: MessageKind::Result,
                fragment: Some(Fragment {
                    title,
                    sandbox_url,
                    files: state.files.clone(),
                }),
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
