//! # Sandbox Provider Trait
//!
//! Backend-agnostic interface to ephemeral sandboxes. The orchestrator only
//! ever talks to a `dyn SandboxProvider`: create a sandbox from a template,
//! extend its TTL, run commands, move files in and out, and resolve the
//! preview host for a port.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use forge_core::ids::SandboxId;

/// Result type alias for sandbox operations.
pub type SandboxResult<T> = Result<T, SandboxError>;

/// Errors from sandbox operations.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    /// The sandbox no longer exists or its TTL expired.
    ///
    /// Never retryable: an expired sandbox will not come back, and the run
    /// that owned it cannot make further progress.
    #[error("sandbox {id} is unavailable")]
    Unavailable {
        /// The missing sandbox.
        id: SandboxId,
    },

    /// Transient failure reaching the sandbox backend.
    #[error("sandbox transport error: {message}")]
    Transport {
        /// Error description.
        message: String,
    },

    /// Backend-internal failure.
    #[error("sandbox internal error: {message}")]
    Internal {
        /// Error description.
        message: String,
    },
}

impl SandboxError {
    /// Whether this error is retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Unavailable { .. } | Self::Internal { .. } => false,
        }
    }

    /// Error category string for logging.
    #[must_use]
    pub fn category(&self) -> &str {
        match self {
            Self::Unavailable { .. } => "unavailable",
            Self::Transport { .. } => "transport",
            Self::Internal { .. } => "internal",
        }
    }
}

/// A live handle to a resolved sandbox.
#[derive(Clone, Debug)]
pub struct SandboxSession {
    /// Sandbox identifier.
    pub id: SandboxId,
    /// Remaining time before the sandbox expires.
    pub ttl: Duration,
    /// Host the sandbox is reachable at, without port or scheme.
    pub endpoint_host: String,
    /// When this handle was resolved. Handles are not held across steps;
    /// each step re-resolves by id.
    pub resolved_at: DateTime<Utc>,
}

/// Captured output of one sandbox command.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Full stdout.
    pub stdout: String,
    /// Full stderr.
    pub stderr: String,
    /// Process exit code (`-1` when terminated by signal or timeout).
    pub exit_code: i32,
}

impl CommandOutput {
    /// Whether the command exited successfully.
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Receives command output incrementally as the process produces it.
///
/// Implementations must be cheap and non-blocking; the full output is still
/// returned in [`CommandOutput`] when the command finishes.
pub trait CommandSink: Send + Sync {
    /// A chunk of stdout arrived.
    fn stdout(&self, chunk: &str);
    /// A chunk of stderr arrived.
    fn stderr(&self, chunk: &str);
}

/// A sink that discards all chunks.
pub struct NullSink;

impl CommandSink for NullSink {
    fn stdout(&self, _chunk: &str) {}
    fn stderr(&self, _chunk: &str) {}
}

/// Sandbox backend trait.
#[async_trait]
pub trait SandboxProvider: Send + Sync {
    /// Provision a new sandbox from a named template.
    async fn create(&self, template: &str) -> SandboxResult<SandboxId>;

    /// Set the sandbox lifetime, measured from now.
    async fn set_timeout(&self, id: &SandboxId, ttl: Duration) -> SandboxResult<()>;

    /// Re-resolve a sandbox by id, failing with [`SandboxError::Unavailable`]
    /// if it has expired or never existed.
    async fn resolve(&self, id: &SandboxId) -> SandboxResult<SandboxSession>;

    /// Run a shell command inside the sandbox, streaming output to `sink`.
    async fn run_command(
        &self,
        id: &SandboxId,
        command: &str,
        sink: &dyn CommandSink,
    ) -> SandboxResult<CommandOutput>;

    /// Create or overwrite a file at a sandbox-relative path.
    async fn write_file(&self, id: &SandboxId, path: &str, content: &str) -> SandboxResult<()>;

    /// Read a file at a sandbox-relative path.
    async fn read_file(&self, id: &SandboxId, path: &str) -> SandboxResult<String>;

    /// Resolve the externally reachable host for a port, without scheme
    /// (e.g. `"abc123-3000.preview.example.dev"`).
    async fn get_host(&self, id: &SandboxId, port: u16) -> SandboxResult<String>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
