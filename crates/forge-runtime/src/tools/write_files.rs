//! `create_or_update_files` — ordered batch writes into the sandbox.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use forge_core::ids::SandboxId;
use forge_core::tools::FileSpec;
use forge_sandbox::{SandboxError, SandboxProvider};

use crate::errors::WorkflowResult;

/// Durable result of one write batch.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteStepResult {
    /// The writes that succeeded, to merge into run state. On partial
    /// failure this is the successful prefix of the batch.
    pub written: BTreeMap<String, String>,
    /// Result text for the model: the full updated file map as JSON, or an
    /// error description.
    pub message: String,
}

/// Apply a write batch in order. Writes are applied one at a time; a failure
/// stops the batch and reports the files written so far, so run state only
/// ever reflects writes that actually happened.
pub(crate) async fn run(
    sandbox: Arc<dyn SandboxProvider>,
    id: &SandboxId,
    specs: &[FileSpec],
    current: &BTreeMap<String, String>,
) -> WorkflowResult<WriteStepResult> {
    let mut written = BTreeMap::new();

    for spec in specs {
        match sandbox.write_file(id, &spec.path, &spec.content).await {
            Ok(()) => {
                let _ = written.insert(spec.path.clone(), spec.content.clone());
            }
            Err(e @ SandboxError::Unavailable { .. }) => return Err(e.into()),
            Err(e) => {
                warn!(path = %spec.path, error = %e, "write batch stopped at failing file");
                return Ok(WriteStepResult {
                    written,
                    message: format!("Error writing {}: {e}", spec.path),
                });
            }
        }
    }

    let mut updated = current.clone();
    updated.extend(written.clone());
    let message = serde_json::to_string(&updated)?;
    Ok(WriteStepResult { written, message })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use forge_sandbox::testutil::FakeSandbox;

    fn spec(path: &str, content: &str) -> FileSpec {
        FileSpec {
            path: path.into(),
            content: content.into(),
        }
    }

    async fn setup() -> (Arc<FakeSandbox>, SandboxId) {
        let sandbox = Arc::new(FakeSandbox::new());
        let id = sandbox.create("t").await.unwrap();
        (sandbox, id)
    }

    #[tokio::test]
    async fn batch_writes_all_files_in_order() {
        let (sandbox, id) = setup().await;
        let result = run(
            Arc::clone(&sandbox) as Arc<dyn SandboxProvider>,
            &id,
            &[spec("a.txt", "1"), spec("b.txt", "2")],
            &BTreeMap::new(),
        )
        .await
        .unwrap();

        assert_eq!(result.written.len(), 2);
        assert_eq!(sandbox.files(&id)["a.txt"], "1");
        assert_eq!(sandbox.files(&id)["b.txt"], "2");
    }

    #[tokio::test]
    async fn last_write_per_path_wins_within_batch() {
        let (sandbox, id) = setup().await;
        let result = run(
            Arc::clone(&sandbox) as Arc<dyn SandboxProvider>,
            &id,
            &[spec("a.txt", "first"), spec("a.txt", "second")],
            &BTreeMap::new(),
        )
        .await
        .unwrap();

        assert_eq!(result.written["a.txt"], "second");
        assert_eq!(sandbox.files(&id)["a.txt"], "second");
    }

    #[tokio::test]
    async fn message_reports_full_updated_map() {
        let (sandbox, id) = setup().await;
        let current = BTreeMap::from([("existing.txt".to_owned(), "old".to_owned())]);
        let result = run(
            Arc::clone(&sandbox) as Arc<dyn SandboxProvider>,
            &id,
            &[spec("new.txt", "fresh")],
            &current,
        )
        .await
        .unwrap();

        let map: BTreeMap<String, String> = serde_json::from_str(&result.message).unwrap();
        assert_eq!(map["existing.txt"], "old");
        assert_eq!(map["new.txt"], "fresh");
        // Only the batch's own writes go back to run state
        assert_eq!(result.written.len(), 1);
    }

    #[tokio::test]
    async fn partial_failure_keeps_successful_prefix() {
        let (sandbox, id) = setup().await;
        sandbox.fail_writes_to("bad.txt");

        let result = run(
            Arc::clone(&sandbox) as Arc<dyn SandboxProvider>,
            &id,
            &[
                spec("ok.txt", "fine"),
                spec("bad.txt", "nope"),
                spec("after.txt", "never"),
            ],
            &BTreeMap::new(),
        )
        .await
        .unwrap();

        assert_eq!(result.written.len(), 1);
        assert!(result.written.contains_key("ok.txt"));
        assert!(result.message.contains("Error writing bad.txt"));
        assert!(!sandbox.files(&id).contains_key("after.txt"));
    }
}
