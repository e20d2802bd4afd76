//! Completion-marker detection and output sanitization.
//!
//! The agent signals completion by emitting `<task_summary>…</task_summary>`
//! in its free text. Detection happens once, in the agent's response hook;
//! user-facing strings (titles, formatted responses) are sanitized so the
//! marker never leaks out of the orchestrator.

use crate::constants::{TASK_SUMMARY_CLOSE, TASK_SUMMARY_OPEN};

/// Whether the text contains the completion marker.
#[must_use]
pub fn contains_task_summary(text: &str) -> bool {
    text.contains(TASK_SUMMARY_OPEN)
}

/// Extract the content between the marker tags, if both are present.
///
/// Returns the inner text trimmed. A lone opening tag yields everything
/// after it (the model occasionally drops the closing tag).
#[must_use]
pub fn extract_task_summary(text: &str) -> Option<String> {
    let start = text.find(TASK_SUMMARY_OPEN)? + TASK_SUMMARY_OPEN.len();
    let rest = &text[start..];
    let inner = match rest.find(TASK_SUMMARY_CLOSE) {
        Some(end) => &rest[..end],
        None => rest,
    };
    Some(inner.trim().to_owned())
}

/// Strip marker tags (keeping the enclosed text) and trim whitespace.
#[must_use]
pub fn sanitize(text: &str) -> String {
    text.replace(TASK_SUMMARY_OPEN, "")
        .replace(TASK_SUMMARY_CLOSE, "")
        .trim()
        .to_owned()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
