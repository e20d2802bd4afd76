//! Local sandbox provider backed by directories and `bash -c`.
//!
//! Each sandbox is a directory under a root path; commands run with
//! `tokio::process::Command` using the sandbox directory as the working
//! directory. TTLs are tracked in memory, so sandboxes expire when the
//! process restarts — fine for development and tests, where this backend
//! is meant to be used.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use forge_core::constants::DEFAULT_SANDBOX_TTL_MS;
use forge_core::ids::SandboxId;

use crate::provider::{
    CommandOutput, CommandSink, SandboxError, SandboxProvider, SandboxResult, SandboxSession,
};

/// Default per-command wall-clock limit.
const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

struct LocalSession {
    dir: PathBuf,
    deadline: Instant,
}

/// Directory-backed sandbox provider.
pub struct LocalSandboxProvider {
    root: PathBuf,
    command_timeout: Duration,
    sessions: Mutex<HashMap<SandboxId, LocalSession>>,
}

impl LocalSandboxProvider {
    /// Create a provider rooted at `root`. The directory is created lazily
    /// on first sandbox creation.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Override the per-command timeout.
    #[must_use]
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Look up a live session's directory, evicting it if expired.
    fn session_dir(&self, id: &SandboxId) -> SandboxResult<PathBuf> {
        let mut sessions = self.sessions.lock();
        match sessions.get(id) {
            Some(session) if session.deadline > Instant::now() => Ok(session.dir.clone()),
            Some(_) => {
                let _ = sessions.remove(id);
                warn!(sandbox_id = %id, "sandbox expired");
                Err(SandboxError::Unavailable { id: id.clone() })
            }
            None => Err(SandboxError::Unavailable { id: id.clone() }),
        }
    }
}

/// Reject absolute paths and parent-directory escapes.
fn resolve_path(dir: &Path, path: &str) -> SandboxResult<PathBuf> {
    let relative = Path::new(path);
    if relative.is_absolute()
        || relative
            .components()
            .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(SandboxError::Internal {
            message: format!("path escapes sandbox: {path}"),
        });
    }
    Ok(dir.join(relative))
}

enum Stream {
    Out,
    Err,
}

#[async_trait]
impl SandboxProvider for LocalSandboxProvider {
    async fn create(&self, template: &str) -> SandboxResult<SandboxId> {
        let id = SandboxId::new();
        let dir = self.root.join(id.as_str());
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| SandboxError::Internal {
                message: format!("failed to create sandbox directory: {e}"),
            })?;

        let deadline = Instant::now() + Duration::from_millis(DEFAULT_SANDBOX_TTL_MS);
        let _ = self
            .sessions
            .lock()
            .insert(id.clone(), LocalSession { dir, deadline });

        info!(sandbox_id = %id, template, "local sandbox created");
        Ok(id)
    }

    async fn set_timeout(&self, id: &SandboxId, ttl: Duration) -> SandboxResult<()> {
        let mut sessions = self.sessions.lock();
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| SandboxError::Unavailable { id: id.clone() })?;
        session.deadline = Instant::now() + ttl;
        debug!(sandbox_id = %id, ttl_ms = ttl.as_millis() as u64, "sandbox TTL updated");
        Ok(())
    }

    async fn resolve(&self, id: &SandboxId) -> SandboxResult<SandboxSession> {
        let _ = self.session_dir(id)?;
        let sessions = self.sessions.lock();
        let session = sessions
            .get(id)
            .ok_or_else(|| SandboxError::Unavailable { id: id.clone() })?;
        Ok(SandboxSession {
            id: id.clone(),
            ttl: session.deadline.saturating_duration_since(Instant::now()),
            endpoint_host: "localhost".to_owned(),
            resolved_at: chrono::Utc::now(),
        })
    }

    async fn run_command(
        &self,
        id: &SandboxId,
        command: &str,
        sink: &dyn CommandSink,
    ) -> SandboxResult<CommandOutput> {
        let dir = self.session_dir(id)?;

        let mut cmd = tokio::process::Command::new("bash");
        let _ = cmd
            .arg("-c")
            .arg(command)
            .current_dir(&dir)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped());

        debug!(sandbox_id = %id, command, "spawning sandbox command");

        let mut child = cmd.spawn().map_err(|e| SandboxError::Internal {
            message: format!("failed to spawn command: {e}"),
        })?;

        // Readers run in spawned tasks; lines are forwarded to the caller's
        // sink from this task, since the sink borrow is not 'static.
        let (tx, mut rx) = mpsc::unbounded_channel::<(Stream, String)>();

        let stdout_pipe = child.stdout.take();
        let tx_out = tx.clone();
        let _ = tokio::spawn(async move {
            if let Some(pipe) = stdout_pipe {
                let mut lines = BufReader::new(pipe).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if tx_out.send((Stream::Out, line)).is_err() {
                        break;
                    }
                }
            }
        });

        let stderr_pipe = child.stderr.take();
        let _ = tokio::spawn(async move {
            if let Some(pipe) = stderr_pipe {
                let mut lines = BufReader::new(pipe).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if tx.send((Stream::Err, line)).is_err() {
                        break;
                    }
                }
            }
        });

        let mut stdout = String::new();
        let mut stderr = String::new();

        // The channel closes at EOF on both pipes, which happens when the
        // process exits, so draining before wait() cannot hang.
        let run = async {
            while let Some((stream, line)) = rx.recv().await {
                match stream {
                    Stream::Out => {
                        sink.stdout(&line);
                        stdout.push_str(&line);
                        stdout.push('\n');
                    }
                    Stream::Err => {
                        sink.stderr(&line);
                        stderr.push_str(&line);
                        stderr.push('\n');
                    }
                }
            }
            child.wait().await
        };

        tokio::select! {
            status = run => {
                let status = status.map_err(|e| SandboxError::Internal {
                    message: format!("command wait failed: {e}"),
                })?;
                let exit_code = status.code().unwrap_or(-1);
                debug!(sandbox_id = %id, exit_code, "sandbox command completed");
                Ok(CommandOutput { stdout, stderr, exit_code })
            }
            () = tokio::time::sleep(self.command_timeout) => {
                warn!(sandbox_id = %id, command, "sandbox command timed out");
                Ok(CommandOutput {
                    stdout,
                    stderr: "Command timed out".into(),
                    exit_code: -1,
                })
            }
        }
    }

    async fn write_file(&self, id: &SandboxId, path: &str, content: &str) -> SandboxResult<()> {
        let dir = self.session_dir(id)?;
        let target = resolve_path(&dir, path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SandboxError::Internal {
                    message: format!("failed to create parent directories for {path}: {e}"),
                })?;
        }
        tokio::fs::write(&target, content)
            .await
            .map_err(|e| SandboxError::Internal {
                message: format!("failed to write {path}: {e}"),
            })
    }

    async fn read_file(&self, id: &SandboxId, path: &str) -> SandboxResult<String> {
        let dir = self.session_dir(id)?;
        let target = resolve_path(&dir, path)?;
        tokio::fs::read_to_string(&target)
            .await
            .map_err(|e| SandboxError::Internal {
                message: format!("failed to read {path}: {e}"),
            })
    }

    async fn get_host(&self, id: &SandboxId, port: u16) -> SandboxResult<String> {
        let _ = self.session_dir(id)?;
        Ok(format!("localhost:{port}"))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::NullSink;
    use assert_matches::assert_matches;

    struct CollectingSink {
        out: Mutex<Vec<String>>,
        err: Mutex<Vec<String>>,
    }

    impl CollectingSink {
        fn new() -> Self {
            Self {
                out: Mutex::new(Vec::new()),
                err: Mutex::new(Vec::new()),
            }
        }
    }

    impl CommandSink for CollectingSink {
        fn stdout(&self, chunk: &str) {
            self.out.lock().push(chunk.to_owned());
        }
        fn stderr(&self, chunk: &str) {
            self.err.lock().push(chunk.to_owned());
        }
    }

    fn provider(dir: &tempfile::TempDir) -> LocalSandboxProvider {
        LocalSandboxProvider::new(dir.path())
    }

    #[tokio::test]
    async fn create_and_resolve() {
        let dir = tempfile::tempdir().unwrap();
        let provider = provider(&dir);
        let id = provider.create("forge-nextjs").await.unwrap();

        let session = provider.resolve(&id).await.unwrap();
        assert_eq!(session.id, id);
        assert!(session.ttl > Duration::from_secs(0));
        assert_eq!(session.endpoint_host, "localhost");
        assert!(dir.path().join(id.as_str()).is_dir());
    }

    #[tokio::test]
    async fn resolve_unknown_id_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let provider = provider(&dir);
        let err = provider.resolve(&SandboxId::new()).await.unwrap_err();
        assert_matches!(err, SandboxError::Unavailable { .. });
    }

    #[tokio::test]
    async fn expired_sandbox_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let provider = provider(&dir);
        let id = provider.create("forge-nextjs").await.unwrap();
        provider
            .set_timeout(&id, Duration::from_millis(0))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        let err = provider.resolve(&id).await.unwrap_err();
        assert_matches!(err, SandboxError::Unavailable { .. });
    }

    #[tokio::test]
    async fn run_command_captures_output_and_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let provider = provider(&dir);
        let id = provider.create("forge-nextjs").await.unwrap();

        let output = provider
            .run_command(&id, "echo hello && echo oops >&2 && exit 3", &NullSink)
            .await
            .unwrap();
        assert_eq!(output.stdout.trim(), "hello");
        assert_eq!(output.stderr.trim(), "oops");
        assert_eq!(output.exit_code, 3);
        assert!(!output.success());
    }

    #[tokio::test]
    async fn run_command_streams_to_sink() {
        let dir = tempfile::tempdir().unwrap();
        let provider = provider(&dir);
        let id = provider.create("forge-nextjs").await.unwrap();

        let sink = CollectingSink::new();
        let output = provider
            .run_command(&id, "echo one; echo two", &sink)
            .await
            .unwrap();
        assert!(output.success());
        assert_eq!(*sink.out.lock(), vec!["one".to_owned(), "two".to_owned()]);
        assert!(sink.err.lock().is_empty());
    }

    #[tokio::test]
    async fn run_command_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let provider =
            LocalSandboxProvider::new(dir.path()).with_command_timeout(Duration::from_millis(100));
        let id = provider.create("forge-nextjs").await.unwrap();

        let start = Instant::now();
        let output = provider.run_command(&id, "sleep 30", &NullSink).await.unwrap();
        assert_eq!(output.exit_code, -1);
        assert_eq!(output.stderr, "Command timed out");
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn write_and_read_file() {
        let dir = tempfile::tempdir().unwrap();
        let provider = provider(&dir);
        let id = provider.create("forge-nextjs").await.unwrap();

        provider
            .write_file(&id, "app/page.tsx", "export default function Page() {}")
            .await
            .unwrap();
        let content = provider.read_file(&id, "app/page.tsx").await.unwrap();
        assert_eq!(content, "export default function Page() {}");
    }

    #[tokio::test]
    async fn commands_run_in_sandbox_directory() {
        let dir = tempfile::tempdir().unwrap();
        let provider = provider(&dir);
        let id = provider.create("forge-nextjs").await.unwrap();

        provider.write_file(&id, "note.txt", "inside").await.unwrap();
        let output = provider
            .run_command(&id, "cat note.txt", &NullSink)
            .await
            .unwrap();
        assert_eq!(output.stdout.trim(), "inside");
    }

    #[tokio::test]
    async fn path_traversal_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let provider = provider(&dir);
        let id = provider.create("forge-nextjs").await.unwrap();

        let err = provider
            .write_file(&id, "../escape.txt", "nope")
            .await
            .unwrap_err();
        assert_matches!(err, SandboxError::Internal { .. });

        let err = provider.read_file(&id, "/etc/hostname").await.unwrap_err();
        assert_matches!(err, SandboxError::Internal { .. });
    }

    #[tokio::test]
    async fn missing_file_read_fails() {
        let dir = tempfile::tempdir().unwrap();
        let provider = provider(&dir);
        let id = provider.create("forge-nextjs").await.unwrap();

        let err = provider.read_file(&id, "absent.txt").await.unwrap_err();
        assert_matches!(err, SandboxError::Internal { .. });
    }

    #[tokio::test]
    async fn get_host_includes_port() {
        let dir = tempfile::tempdir().unwrap();
        let provider = provider(&dir);
        let id = provider.create("forge-nextjs").await.unwrap();

        let host = provider.get_host(&id, 3000).await.unwrap();
        assert_eq!(host, "localhost:3000");
    }
}
