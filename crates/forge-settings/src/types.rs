//! Settings type definitions with serde defaults per field.
//!
//! Every field has a `#[serde(default)]` so a partial settings file merges
//! cleanly over compiled defaults. Prompt contents are opaque strings as far
//! as the orchestrator is concerned — they carry no control-flow contract
//! beyond the completion marker convention.

use forge_core::constants::{
    DEFAULT_MAX_ITERATIONS, DEFAULT_PREVIEW_PORT, DEFAULT_SANDBOX_TTL_MS,
    CONVERSATION_CONTEXT_WINDOW,
};
use forge_core::retry::RetryConfig;
use serde::{Deserialize, Serialize};

/// Default system prompt for the coding agent.
const DEFAULT_CODER_PROMPT: &str = "You are a senior software engineer working in a sandboxed \
development environment. You have tools to run terminal commands, create or update files, and \
read files. Build exactly what the user asks for. When the task is fully complete, finish your \
final message with <task_summary>a short description of what you built</task_summary>.";

/// Default prompt for the fragment title generator.
const DEFAULT_TITLE_PROMPT: &str = "You are a title generator. Given a summary of work an agent \
performed, respond with a short descriptive title (at most six words). Respond with the title \
only, no punctuation around it.";

/// Default prompt for the response formatter.
const DEFAULT_RESPONSE_PROMPT: &str = "You are a response formatter. Given a summary of work an \
agent performed, rewrite it as a short friendly message telling the user what was built. Respond \
with the message only.";

/// Top-level Forge settings.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ForgeSettings {
    /// LLM provider settings.
    #[serde(default)]
    pub llm: LlmSettings,
    /// Prompt strings (opaque to the orchestrator).
    #[serde(default)]
    pub prompts: PromptSettings,
    /// Sandbox provisioning settings.
    #[serde(default)]
    pub sandbox: SandboxSettings,
    /// Agent loop settings.
    #[serde(default)]
    pub agent: AgentSettings,
    /// Durable-step retry settings.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Persistence settings.
    #[serde(default)]
    pub store: StoreSettings,
}

/// LLM provider settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmSettings {
    /// Base URL of the OpenAI-compatible endpoint.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Model used for the tool-driving agent.
    #[serde(default = "default_model")]
    pub model: String,
    /// Model used for the post-processing calls (title, response).
    #[serde(default = "default_small_model")]
    pub small_model: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Max tokens per completion.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_owned()
}
fn default_model() -> String {
    "gpt-4.1".to_owned()
}
fn default_small_model() -> String {
    "gpt-4o-mini".to_owned()
}
fn default_api_key_env() -> String {
    "FORGE_API_KEY".to_owned()
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_temperature() -> f64 {
    0.1
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            small_model: default_small_model(),
            api_key_env: default_api_key_env(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

/// Prompt settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptSettings {
    /// System prompt for the coding agent.
    #[serde(default = "default_coder_prompt")]
    pub coder: String,
    /// System prompt for the fragment title generator.
    #[serde(default = "default_title_prompt")]
    pub title: String,
    /// System prompt for the response formatter.
    #[serde(default = "default_response_prompt")]
    pub response: String,
}

fn default_coder_prompt() -> String {
    DEFAULT_CODER_PROMPT.to_owned()
}
fn default_title_prompt() -> String {
    DEFAULT_TITLE_PROMPT.to_owned()
}
fn default_response_prompt() -> String {
    DEFAULT_RESPONSE_PROMPT.to_owned()
}

impl Default for PromptSettings {
    fn default() -> Self {
        Self {
            coder: default_coder_prompt(),
            title: default_title_prompt(),
            response: default_response_prompt(),
        }
    }
}

/// Sandbox provisioning settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxSettings {
    /// Template identifier passed to the sandbox provider on create.
    #[serde(default = "default_template")]
    pub template: String,
    /// Sandbox time-to-live in milliseconds.
    #[serde(default = "default_ttl_ms")]
    pub ttl_ms: u64,
    /// Port the preview server listens on.
    #[serde(default = "default_preview_port")]
    pub preview_port: u16,
}

fn default_template() -> String {
    "forge-nextjs".to_owned()
}
fn default_ttl_ms() -> u64 {
    DEFAULT_SANDBOX_TTL_MS
}
fn default_preview_port() -> u16 {
    DEFAULT_PREVIEW_PORT
}

impl Default for SandboxSettings {
    fn default() -> Self {
        Self {
            template: default_template(),
            ttl_ms: default_ttl_ms(),
            preview_port: default_preview_port(),
        }
    }
}

/// Agent loop settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSettings {
    /// Maximum router iterations per run.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Number of prior conversation entries loaded as context.
    #[serde(default = "default_context_window")]
    pub context_window: usize,
}

fn default_max_iterations() -> u32 {
    DEFAULT_MAX_ITERATIONS
}
fn default_context_window() -> usize {
    CONVERSATION_CONTEXT_WINDOW
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            context_window: default_context_window(),
        }
    }
}

/// Persistence settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSettings {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_owned());
    format!("{home}/.forge/forge.db")
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let settings = ForgeSettings::default();
        assert_eq!(settings.agent.max_iterations, 10);
        assert_eq!(settings.agent.context_window, 5);
        assert_eq!(settings.sandbox.preview_port, 3000);
        assert_eq!(settings.sandbox.ttl_ms, 600_000);
        assert_eq!(settings.llm.base_url, "https://api.openai.com/v1");
        assert!(settings.prompts.coder.contains("<task_summary>"));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let settings: ForgeSettings =
            serde_json::from_str(r#"{"agent": {"maxIterations": 3}}"#).unwrap();
        assert_eq!(settings.agent.max_iterations, 3);
        assert_eq!(settings.agent.context_window, 5);
        assert_eq!(settings.retry.max_retries, 3);
    }

    #[test]
    fn unknown_top_level_field_rejected() {
        let result = serde_json::from_str::<ForgeSettings>(r#"{"nonsense": true}"#);
        assert!(result.is_err());
    }
}
