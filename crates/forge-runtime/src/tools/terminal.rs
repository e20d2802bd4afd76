//! `run_terminal_command` — shell execution with output accumulation.

use std::sync::Arc;

use parking_lot::Mutex;

use forge_core::ids::SandboxId;
use forge_sandbox::{CommandSink, SandboxError, SandboxProvider};

use crate::errors::WorkflowResult;

/// Accumulates streamed command output into string buffers.
#[derive(Default)]
struct BufferSink {
    stdout: Mutex<String>,
    stderr: Mutex<String>,
}

impl BufferSink {
    fn stdout_buffer(&self) -> String {
        self.stdout.lock().clone()
    }

    fn stderr_buffer(&self) -> String {
        self.stderr.lock().clone()
    }
}

impl CommandSink for BufferSink {
    fn stdout(&self, chunk: &str) {
        let mut buffer = self.stdout.lock();
        buffer.push_str(chunk);
        buffer.push('\n');
    }

    fn stderr(&self, chunk: &str) {
        let mut buffer = self.stderr.lock();
        buffer.push_str(chunk);
        buffer.push('\n');
    }
}

/// Run a shell command, returning captured stdout on success or a composed
/// failure string. Only a vanished sandbox escapes as an error.
pub(crate) async fn run(
    sandbox: Arc<dyn SandboxProvider>,
    id: &SandboxId,
    command: &str,
) -> WorkflowResult<String> {
    let sink = BufferSink::default();
    match sandbox.run_command(id, command, &sink).await {
        Ok(output) if output.success() => Ok(sink.stdout_buffer()),
        Ok(output) => Ok(format!(
            "Command failed with exit code {}\nstdout: {}\nstderr: {}",
            output.exit_code, output.stdout, output.stderr
        )),
        Err(e @ SandboxError::Unavailable { .. }) => Err(e.into()),
        Err(e) => Ok(format!(
            "Command failed: {e}\nstdout: {}\nstderr: {}",
            sink.stdout_buffer(),
            sink.stderr_buffer()
        )),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
