//! # Tool Layer
//!
//! The three capability-scoped tools the agent can call, each executed as a
//! durable step wrapping sandbox operations. Tool failures are data: they
//! come back as descriptive result strings the model reads and reacts to.
//! The only failure that escapes as an error is a vanished sandbox
//! ([`forge_sandbox::SandboxError::Unavailable`]), which no amount of agent
//! cleverness can recover from.

mod read_files;
mod terminal;
mod write_files;

pub use write_files::WriteStepResult;

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::warn;

use forge_core::ids::SandboxId;
use forge_core::tools::ToolRequest;
use forge_llm::ToolCall;
use forge_sandbox::SandboxProvider;

use crate::errors::WorkflowResult;
use crate::steps::StepExecutor;

/// Effect of one executed tool call.
#[derive(Clone, Debug, Default)]
pub struct ToolOutcome {
    /// Result text fed back to the model.
    pub result_text: String,
    /// File writes to merge into run state (empty for non-mutating tools).
    pub file_updates: BTreeMap<String, String>,
}

/// Executes tool calls against the run's sandbox.
pub struct ToolSet {
    sandbox: Arc<dyn SandboxProvider>,
}

impl ToolSet {
    /// Create a tool set over a sandbox provider.
    #[must_use]
    pub fn new(sandbox: Arc<dyn SandboxProvider>) -> Self {
        Self { sandbox }
    }

    /// Execute one tool call as a durable step.
    ///
    /// `iteration` and `index` key the step name, so a replayed run maps each
    /// recorded result back to the same call. `files` is the run's current
    /// file map, used to report the full updated map after a write batch.
    pub async fn execute(
        &self,
        steps: &StepExecutor,
        call: &ToolCall,
        sandbox_id: &SandboxId,
        iteration: u32,
        index: usize,
        files: &BTreeMap<String, String>,
    ) -> WorkflowResult<ToolOutcome> {
        let request = match ToolRequest::parse(&call.name, &call.arguments) {
            Ok(request) => request,
            Err(e) => {
                // Parse failures go back to the model as a result string so
                // it can correct the call on the next turn.
                warn!(tool = %call.name, error = %e, "rejecting malformed tool call");
                return Ok(ToolOutcome {
                    result_text: format!("Tool call failed: {e}"),
                    file_updates: BTreeMap::new(),
                });
            }
        };

        let step_name = format!("{}:{iteration}:{index}", request.name());
        metrics::counter!("tool_calls_total", "tool" => request.name()).increment(1);

        match request {
            ToolRequest::TerminalCommand { command } => {
                let result_text: String = steps
                    .run_step(&step_name, || {
                        let sandbox = Arc::clone(&self.sandbox);
                        let id = sandbox_id.clone();
                        let command = command.clone();
                        async move { terminal::run(sandbox, &id, &command).await }
                    })
                    .await?;
                Ok(ToolOutcome {
                    result_text,
                    file_updates: BTreeMap::new(),
                })
            }
            ToolRequest::CreateOrUpdateFiles { files: specs } => {
                let result: WriteStepResult = steps
                    .run_step(&step_name, || {
                        let sandbox = Arc::clone(&self.sandbox);
                        let id = sandbox_id.clone();
                        let specs = specs.clone();
                        let current = files.clone();
                        async move { write_files::run(sandbox, &id, &specs, &current).await }
                    })
                    .await?;
                Ok(ToolOutcome {
                    result_text: result.message,
                    file_updates: result.written,
                })
            }
            ToolRequest::ReadFiles { paths } => {
                let result_text: String = steps
                    .run_step(&step_name, || {
                        let sandbox = Arc::clone(&self.sandbox);
                        let id = sandbox_id.clone();
                        let paths = paths.clone();
                        async move { read_files::run(sandbox, &id, &paths).await }
                    })
                    .await?;
                Ok(ToolOutcome {
                    result_text,
                    file_updates: BTreeMap::new(),
                })
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use forge_core::ids::RunId;
    use forge_core::retry::RetryConfig;
    use forge_sandbox::testutil::FakeSandbox;
    use forge_sandbox::SandboxError;
    use forge_store::{MemoryStepLog, StepLog};
    use serde_json::json;

    use crate::errors::WorkflowError;

    fn steps(log: &Arc<MemoryStepLog>) -> StepExecutor {
        StepExecutor::new(
            RunId::from("run-1"),
            Arc::clone(log) as Arc<dyn StepLog>,
            RetryConfig {
                max_retries: 1,
                base_delay_ms: 1,
                max_delay_ms: 2,
                jitter_factor: 0.0,
            },
        )
    }

    fn call(name: &str, arguments: serde_json::Value) -> ToolCall {
        ToolCall {
            id: "call_1".into(),
            name: name.into(),
            arguments,
        }
    }

    async fn setup() -> (Arc<FakeSandbox>, ToolSet, SandboxId) {
        let sandbox = Arc::new(FakeSandbox::new());
        let id = sandbox.create("t").await.unwrap();
        let tools = ToolSet::new(Arc::clone(&sandbox) as Arc<dyn SandboxProvider>);
        (sandbox, tools, id)
    }

    #[tokio::test]
    async fn unknown_tool_becomes_result_string() {
        let (_sandbox, tools, id) = setup().await;
        let log = Arc::new(MemoryStepLog::new());

        let outcome = tools
            .execute(
                &steps(&log),
                &call("launch_rockets", json!({})),
                &id,
                0,
                0,
                &BTreeMap::new(),
            )
            .await
            .unwrap();
        assert!(outcome.result_text.contains("unknown tool"));
        assert!(outcome.file_updates.is_empty());
        // No step recorded for a rejected call
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn invalid_parameters_become_result_string() {
        let (_sandbox, tools, id) = setup().await;
        let log = Arc::new(MemoryStepLog::new());

        let outcome = tools
            .execute(
                &steps(&log),
                &call("run_terminal_command", json!({"cmd": "ls"})),
                &id,
                0,
                0,
                &BTreeMap::new(),
            )
            .await
            .unwrap();
        assert!(outcome.result_text.contains("invalid parameters"));
    }

    #[tokio::test]
    async fn terminal_tool_returns_stdout() {
        let (sandbox, tools, id) = setup().await;
        sandbox.push_command_output("node_modules installed");
        let log = Arc::new(MemoryStepLog::new());

        let outcome = tools
            .execute(
                &steps(&log),
                &call("run_terminal_command", json!({"command": "npm install"})),
                &id,
                0,
                0,
                &BTreeMap::new(),
            )
            .await
            .unwrap();
        assert_eq!(outcome.result_text, "node_modules installed\n");
        assert_eq!(sandbox.commands(), vec!["npm install".to_owned()]);
    }

    #[tokio::test]
    async fn write_tool_updates_files_and_is_durable() {
        let (sandbox, tools, id) = setup().await;
        let log = Arc::new(MemoryStepLog::new());
        let executor = steps(&log);

        let arguments = json!({"files": [{"path": "README.md", "content": "hello"}]});
        let outcome = tools
            .execute(
                &executor,
                &call("create_or_update_files", arguments.clone()),
                &id,
                1,
                0,
                &BTreeMap::new(),
            )
            .await
            .unwrap();
        assert_eq!(outcome.file_updates["README.md"], "hello");
        assert_eq!(sandbox.files(&id)["README.md"], "hello");

        // Replay with the same step key: cached, sandbox untouched
        let replay = tools
            .execute(
                &executor,
                &call("create_or_update_files", arguments),
                &id,
                1,
                0,
                &BTreeMap::new(),
            )
            .await
            .unwrap();
        assert_eq!(replay.file_updates, outcome.file_updates);
        assert_eq!(
            log.step_names(&RunId::from("run-1")),
            vec!["create_or_update_files:1:0"]
        );
    }

    #[tokio::test]
    async fn identical_batch_under_new_step_key_leaves_state_unchanged() {
        let (sandbox, tools, id) = setup().await;
        let log = Arc::new(MemoryStepLog::new());
        let executor = steps(&log);
        let arguments = json!({"files": [{"path": "README.md", "content": "hello"}]});

        let first = tools
            .execute(
                &executor,
                &call("create_or_update_files", arguments.clone()),
                &id,
                1,
                0,
                &BTreeMap::new(),
            )
            .await
            .unwrap();

        // Same batch again on a later iteration: a genuinely new step, not
        // a cache replay.
        let second = tools
            .execute(
                &executor,
                &call("create_or_update_files", arguments),
                &id,
                2,
                0,
                &first.file_updates,
            )
            .await
            .unwrap();

        assert_eq!(second.file_updates, first.file_updates);
        assert_eq!(second.result_text, first.result_text);
        assert_eq!(sandbox.files(&id)["README.md"], "hello");
        assert_eq!(sandbox.files(&id).len(), 1);
        let mut names = log.step_names(&RunId::from("run-1"));
        names.sort();
        assert_eq!(
            names,
            vec!["create_or_update_files:1:0", "create_or_update_files:2:0"]
        );
    }

    #[tokio::test]
    async fn read_tool_returns_structured_contents() {
        let (sandbox, tools, id) = setup().await;
        sandbox.seed_file(&id, "a.txt", "alpha");
        let log = Arc::new(MemoryStepLog::new());

        let outcome = tools
            .execute(
                &steps(&log),
                &call("read_files", json!({"paths": ["a.txt"]})),
                &id,
                0,
                0,
                &BTreeMap::new(),
            )
            .await
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&outcome.result_text).unwrap();
        assert_eq!(parsed[0]["path"], "a.txt");
        assert_eq!(parsed[0]["content"], "alpha");
    }

    #[tokio::test]
    async fn unavailable_sandbox_is_fatal() {
        let (sandbox, tools, id) = setup().await;
        sandbox.expire(&id);
        let log = Arc::new(MemoryStepLog::new());

        let result = tools
            .execute(
                &steps(&log),
                &call("run_terminal_command", json!({"command": "ls"})),
                &id,
                0,
                0,
                &BTreeMap::new(),
            )
            .await;
        assert_matches!(
            result,
            Err(WorkflowError::Sandbox(SandboxError::Unavailable { .. }))
        );
    }
}
