//! # forge
//!
//! Forge command-line binary — wires together all crates and runs one
//! workflow to completion, printing the outcome as JSON.

#![deny(unsafe_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use forge_core::ids::{ConversationId, RunId};
use forge_llm::{OpenAiConfig, OpenAiProvider, Provider};
use forge_runtime::{run_workflow, RunRequest, WorkflowDeps};
use forge_sandbox::{LocalSandboxProvider, SandboxProvider};
use forge_settings::ForgeSettings;
use forge_store::sqlite::{new_file, ConnectionConfig};
use forge_store::{MessageStore, NewMessage, SqliteMessageStore, SqliteStepLog, StepLog};

/// Forge workflow runner.
#[derive(Parser, Debug)]
#[command(name = "forge", about = "Run an agentic build workflow")]
struct Cli {
    /// Instruction for the agent.
    value: String,

    /// Conversation the run belongs to.
    #[arg(long, default_value = "default")]
    conversation_id: String,

    /// Resume an interrupted run by id instead of starting a fresh one.
    #[arg(long)]
    run_id: Option<String>,

    /// Path to the `SQLite` database (overrides settings).
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Path to the settings file (defaults to `~/.forge/forge.json`).
    #[arg(long)]
    settings_path: Option<PathBuf>,

    /// Root directory for local sandboxes.
    #[arg(long)]
    sandbox_root: Option<PathBuf>,
}

impl Cli {
    fn default_sandbox_root() -> PathBuf {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
        PathBuf::from(home).join(".forge").join("sandboxes")
    }
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}

/// Load settings from disk and install them as the global singleton, so any
/// later `get_settings` caller sees the same snapshot the run was wired with.
fn load_settings(args: &Cli) -> Arc<ForgeSettings> {
    let path = args
        .settings_path
        .clone()
        .unwrap_or_else(forge_settings::settings_path);
    let settings = forge_settings::load_settings_from_path(&path).unwrap_or_else(|e| {
        tracing::warn!(error = %e, path = %path.display(), "failed to load settings, using defaults");
        ForgeSettings::default()
    });
    forge_settings::init_settings(settings);
    forge_settings::get_settings()
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Cli::parse();
    let settings = load_settings(&args);

    // Database (messages + step log share one SQLite file)
    let db_path = args
        .db_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(&settings.store.db_path));
    ensure_parent_dir(&db_path)?;
    let db_str = db_path.to_string_lossy();
    let pool = new_file(&db_str, &ConnectionConfig::default()).context("Failed to open database")?;
    let store = Arc::new(
        SqliteMessageStore::new(pool.clone()).context("Failed to initialize message store")?,
    );
    let step_log =
        Arc::new(SqliteStepLog::new(pool).context("Failed to initialize step log")?);

    // Providers (agent model + post-processing model, same endpoint and key)
    let api_key = std::env::var(&settings.llm.api_key_env).with_context(|| {
        format!(
            "No API key found — set the {} environment variable",
            settings.llm.api_key_env
        )
    })?;
    let provider = Arc::new(OpenAiProvider::new(OpenAiConfig {
        base_url: settings.llm.base_url.clone(),
        model: settings.llm.model.clone(),
        api_key: api_key.clone(),
    }));
    let small_provider = Arc::new(OpenAiProvider::new(OpenAiConfig {
        base_url: settings.llm.base_url.clone(),
        model: settings.llm.small_model.clone(),
        api_key,
    }));

    let sandbox_root = args
        .sandbox_root
        .clone()
        .unwrap_or_else(Cli::default_sandbox_root);
    std::fs::create_dir_all(&sandbox_root)
        .with_context(|| format!("Failed to create sandbox root: {}", sandbox_root.display()))?;
    let sandbox = Arc::new(LocalSandboxProvider::new(sandbox_root));

    let conversation_id = ConversationId::from(args.conversation_id.clone());
    let request = match args.run_id {
        Some(ref run_id) => RunRequest {
            run_id: RunId::from(run_id.clone()),
            conversation_id: conversation_id.clone(),
            value: args.value.clone(),
        },
        None => RunRequest::new(conversation_id.clone(), args.value.clone()),
    };

    // Fresh runs record the user side of the conversation before triggering;
    // resumed runs already did on their first attempt.
    if args.run_id.is_none() {
        let _ = store
            .create(NewMessage::user(conversation_id, args.value.clone()))
            .context("Failed to persist user message")?;
    }

    tracing::info!(run_id = %request.run_id, "starting workflow");
    let deps = WorkflowDeps {
        provider: provider as Arc<dyn Provider>,
        small_provider: small_provider as Arc<dyn Provider>,
        sandbox: sandbox as Arc<dyn SandboxProvider>,
        store: store as Arc<dyn MessageStore>,
        step_log: step_log as Arc<dyn StepLog>,
        settings,
    };
    let output = run_workflow(&deps, request)
        .await
        .context("Workflow failed")?;

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_requires_value() {
        assert!(Cli::try_parse_from(["forge"]).is_err());
    }

    #[test]
    fn cli_default_conversation() {
        let cli = Cli::parse_from(["forge", "build a page"]);
        assert_eq!(cli.value, "build a page");
        assert_eq!(cli.conversation_id, "default");
        assert_eq!(cli.run_id, None);
    }

    #[test]
    fn cli_custom_flags() {
        let cli = Cli::parse_from([
            "forge",
            "build",
            "--conversation-id",
            "c7",
            "--run-id",
            "r1",
            "--db-path",
            "/tmp/forge-test.db",
        ]);
        assert_eq!(cli.conversation_id, "c7");
        assert_eq!(cli.run_id.as_deref(), Some("r1"));
        assert_eq!(cli.db_path, Some(PathBuf::from("/tmp/forge-test.db")));
    }

    #[test]
    fn default_sandbox_root_under_forge_dir() {
        let root = Cli::default_sandbox_root();
        assert!(root.to_string_lossy().contains(".forge"));
    }

    #[test]
    fn ensure_parent_dir_creates_nested() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("forge.db");
        ensure_parent_dir(&path).unwrap();
        assert!(path.parent().unwrap().exists());
    }

    /// Tests that install the global settings singleton must hold this lock
    /// to avoid racing with each other.
    static SETTINGS_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

    #[test]
    fn missing_settings_file_falls_back_to_defaults() {
        let _lock = SETTINGS_MUTEX.lock().unwrap();
        let cli = Cli::parse_from([
            "forge",
            "build",
            "--settings-path",
            "/tmp/forge-test-no-such-settings.json",
        ]);
        let settings = load_settings(&cli);
        assert_eq!(settings.agent.max_iterations, 10);
    }

    #[test]
    fn load_settings_installs_global_singleton() {
        let _lock = SETTINGS_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forge.json");
        std::fs::write(&path, r#"{"agent": {"maxIterations": 4}}"#).unwrap();

        let cli = Cli::parse_from([
            "forge",
            "build",
            "--settings-path",
            path.to_str().unwrap(),
        ]);
        let settings = load_settings(&cli);
        assert_eq!(settings.agent.max_iterations, 4);
        // The wired snapshot and the global access path agree
        assert_eq!(forge_settings::get_settings().agent.max_iterations, 4);
    }
}
