//! Test doubles for the [`SandboxProvider`] trait.
//!
//! [`FakeSandbox`] keeps files in memory, replays scripted command results,
//! and records everything the caller does, so orchestration tests can run
//! without touching the filesystem or spawning processes.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use forge_core::ids::SandboxId;

use crate::provider::{
    CommandOutput, CommandSink, SandboxError, SandboxProvider, SandboxResult, SandboxSession,
};

/// In-memory sandbox fake with scripted results and failure injection.
#[derive(Default)]
pub struct FakeSandbox {
    command_script: Mutex<VecDeque<SandboxResult<CommandOutput>>>,
    commands: Mutex<Vec<String>>,
    files: Mutex<HashMap<SandboxId, BTreeMap<String, String>>>,
    timeouts: Mutex<Vec<Duration>>,
    fail_create_remaining: Mutex<u32>,
    write_failures: Mutex<HashSet<String>>,
}

impl FakeSandbox {
    /// Create an empty fake.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a result for the next `run_command` call. When the script is
    /// empty, commands succeed with empty output.
    pub fn push_command(&self, result: SandboxResult<CommandOutput>) {
        self.command_script.lock().push_back(result);
    }

    /// Queue a successful command with the given stdout.
    pub fn push_command_output(&self, stdout: &str) {
        self.push_command(Ok(CommandOutput {
            stdout: stdout.to_owned(),
            stderr: String::new(),
            exit_code: 0,
        }));
    }

    /// Make the next `count` calls to `create` fail with a transport error.
    pub fn fail_next_creates(&self, count: u32) {
        *self.fail_create_remaining.lock() = count;
    }

    /// Make writes to `path` fail.
    pub fn fail_writes_to(&self, path: &str) {
        let _ = self.write_failures.lock().insert(path.to_owned());
    }

    /// Drop a sandbox so every further operation on it is `Unavailable`.
    pub fn expire(&self, id: &SandboxId) {
        let _ = self.files.lock().remove(id);
    }

    /// Commands run so far, in order.
    #[must_use]
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().clone()
    }

    /// Snapshot of a sandbox's files.
    #[must_use]
    pub fn files(&self, id: &SandboxId) -> BTreeMap<String, String> {
        self.files.lock().get(id).cloned().unwrap_or_default()
    }

    /// Seed a file directly, bypassing `write_file` bookkeeping.
    pub fn seed_file(&self, id: &SandboxId, path: &str, content: &str) {
        let mut files = self.files.lock();
        let _ = files
            .entry(id.clone())
            .or_default()
            .insert(path.to_owned(), content.to_owned());
    }

    /// TTLs passed to `set_timeout`, in order.
    #[must_use]
    pub fn timeouts(&self) -> Vec<Duration> {
        self.timeouts.lock().clone()
    }

    /// Number of sandboxes created so far.
    #[must_use]
    pub fn created_count(&self) -> usize {
        self.files.lock().len()
    }

    fn check_live(&self, id: &SandboxId) -> SandboxResult<()> {
        if self.files.lock().contains_key(id) {
            Ok(())
        } else {
            Err(SandboxError::Unavailable { id: id.clone() })
        }
    }
}

#[async_trait]
impl SandboxProvider for FakeSandbox {
    async fn create(&self, _template: &str) -> SandboxResult<SandboxId> {
        {
            let mut remaining = self.fail_create_remaining.lock();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(SandboxError::Transport {
                    message: "injected create failure".to_owned(),
                });
            }
        }
        let id = SandboxId::new();
        let _ = self.files.lock().insert(id.clone(), BTreeMap::new());
        Ok(id)
    }

    async fn set_timeout(&self, id: &SandboxId, ttl: Duration) -> SandboxResult<()> {
        self.check_live(id)?;
        self.timeouts.lock().push(ttl);
        Ok(())
    }

    async fn resolve(&self, id: &SandboxId) -> SandboxResult<SandboxSession> {
        self.check_live(id)?;
        Ok(SandboxSession {
            id: id.clone(),
            ttl: Duration::from_secs(600),
            endpoint_host: format!("{id}.sandbox.test"),
            resolved_at: chrono::Utc::now(),
        })
    }

    async fn run_command(
        &self,
        id: &SandboxId,
        command: &str,
        sink: &dyn CommandSink,
    ) -> SandboxResult<CommandOutput> {
        self.check_live(id)?;
        self.commands.lock().push(command.to_owned());
        let result = self
            .command_script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(CommandOutput::default()));
        if let Ok(ref output) = result {
            for line in output.stdout.lines() {
                sink.stdout(line);
            }
            for line in output.stderr.lines() {
                sink.stderr(line);
            }
        }
        result
    }

    async fn write_file(&self, id: &SandboxId, path: &str, content: &str) -> SandboxResult<()> {
        self.check_live(id)?;
        if self.write_failures.lock().contains(path) {
            return Err(SandboxError::Internal {
                message: format!("injected write failure for {path}"),
            });
        }
        let mut files = self.files.lock();
        let _ = files
            .entry(id.clone())
            .or_default()
            .insert(path.to_owned(), content.to_owned());
        Ok(())
    }

    async fn read_file(&self, id: &SandboxId, path: &str) -> SandboxResult<String> {
        self.check_live(id)?;
        self.files
            .lock()
            .get(id)
            .and_then(|files| files.get(path).cloned())
            .ok_or_else(|| SandboxError::Internal {
                message: format!("failed to read {path}: no such file"),
            })
    }

    async fn get_host(&self, id: &SandboxId, port: u16) -> SandboxResult<String> {
        self.check_live(id)?;
        Ok(format!("{id}-{port}.sandbox.test"))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
