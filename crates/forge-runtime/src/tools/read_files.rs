//! `read_files` — batch reads from the sandbox. Never mutates run state.

use std::sync::Arc;

use serde_json::json;

use forge_core::ids::SandboxId;
use forge_sandbox::{SandboxError, SandboxProvider};

use crate::errors::WorkflowResult;

/// Read a batch of files, returning a JSON array of `{path, content}` or an
/// error description string.
pub(crate) async fn run(
    sandbox: Arc<dyn SandboxProvider>,
    id: &SandboxId,
    paths: &[String],
) -> WorkflowResult<String> {
    let mut contents = Vec::with_capacity(paths.len());
    for path in paths {
        match sandbox.read_file(id, path).await {
            Ok(content) => contents.push(json!({"path": path, "content": content})),
            Err(e @ SandboxError::Unavailable { .. }) => return Err(e.into()),
            Err(e) => return Ok(format!("Error reading {path}: {e}")),
        }
    }
    Ok(serde_json::to_string(&contents)?)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
