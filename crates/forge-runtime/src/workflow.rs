//! # Workflow
//!
//! The end-to-end run: provision a sandbox, seed the agent with recent
//! conversation context, drive the router to a terminal state, post-process,
//! and persist exactly one outcome record. Infrastructure failures abort
//! with `Err` and no record; business incompleteness persists an error-kind
//! record and returns `Ok`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, instrument};

use forge_core::ids::{ConversationId, RunId};
use forge_core::state::{ConversationEntry, OutcomeRecord, Role, RunState};
use forge_core::text::sanitize;
use forge_llm::{ChatMessage, Provider};
use forge_sandbox::SandboxProvider;
use forge_settings::ForgeSettings;
use forge_store::{MessageStore, NewMessage, StepLog, StoredMessage};

use crate::agent::Agent;
use crate::errors::WorkflowResult;
use crate::pipeline::Pipeline;
use crate::router::Router;
use crate::session::SessionManager;
use crate::steps::StepExecutor;
use crate::tools::ToolSet;

/// Step name for conversation context loading.
const STEP_LOAD_CONTEXT: &str = "load-conversation-context";
/// Step name for outcome persistence.
const STEP_SAVE_RESULT: &str = "save-result";

/// Everything a workflow run needs, injected behind traits.
pub struct WorkflowDeps {
    /// Provider driving the tool-calling agent.
    pub provider: Arc<dyn Provider>,
    /// Provider for the post-processing calls (typically a smaller model).
    pub small_provider: Arc<dyn Provider>,
    /// Sandbox backend.
    pub sandbox: Arc<dyn SandboxProvider>,
    /// Message persistence.
    pub store: Arc<dyn MessageStore>,
    /// Durable step log.
    pub step_log: Arc<dyn StepLog>,
    /// Settings snapshot for this run.
    pub settings: Arc<ForgeSettings>,
}

/// One trigger event.
#[derive(Clone, Debug)]
pub struct RunRequest {
    /// Run identity; replaying under the same id resumes from the step log.
    pub run_id: RunId,
    /// Conversation the run belongs to.
    pub conversation_id: ConversationId,
    /// The user's natural-language instruction.
    pub value: String,
}

impl RunRequest {
    /// Create a request with a fresh run id.
    #[must_use]
    pub fn new(conversation_id: ConversationId, value: String) -> Self {
        Self {
            run_id: RunId::new(),
            conversation_id,
            value,
        }
    }
}

/// Mirror of the persisted outcome, returned to the trigger layer.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutput {
    /// Preview URL of the sandbox.
    pub url: String,
    /// Generated fragment title.
    pub title: String,
    /// Files produced by the run.
    pub files: BTreeMap<String, String>,
    /// Sanitized run summary (empty for incomplete runs).
    pub summary: String,
}

/// Execute one workflow run to completion.
#[instrument(skip_all, fields(run_id = %request.run_id, conversation_id = %request.conversation_id))]
pub async fn run_workflow(deps: &WorkflowDeps, request: RunRequest) -> WorkflowResult<RunOutput> {
    metrics::counter!("runs_total").increment(1);
    let settings = &deps.settings;

    let steps = StepExecutor::new(
        request.run_id.clone(),
        Arc::clone(&deps.step_log),
        settings.retry.clone(),
    );

    let session = SessionManager::new(
        Arc::clone(&deps.sandbox),
        settings.sandbox.template.clone(),
        Duration::from_millis(settings.sandbox.ttl_ms),
    );
    let sandbox_id = session.create(&steps).await?;

    let entries: Vec<ConversationEntry> = steps
        .run_step(STEP_LOAD_CONTEXT, || {
            let store = Arc::clone(&deps.store);
            let conversation_id = request.conversation_id.clone();
            let window = settings.agent.context_window;
            async move {
                let messages = store.find_recent(&conversation_id, window)?;
                Ok(messages
                    .into_iter()
                    .map(|m| ConversationEntry {
                        role: m.role,
                        content: m.content,
                    })
                    .collect())
            }
        })
        .await?;

    let mut transcript: Vec<ChatMessage> = entries
        .into_iter()
        .map(|entry| match entry.role {
            Role::User => ChatMessage::User {
                content: entry.content,
            },
            Role::Assistant => ChatMessage::Assistant {
                content: entry.content,
                tool_calls: vec![],
            },
        })
        .collect();
    transcript.push(ChatMessage::User {
        content: request.value.clone(),
    });

    let agent = Agent::new(
        Arc::clone(&deps.provider),
        ToolSet::new(Arc::clone(&deps.sandbox)),
        settings.prompts.coder.clone(),
        settings.llm.max_tokens,
        settings.llm.temperature,
    );
    let router = Router::new(settings.agent.max_iterations);
    let mut state = RunState::default();
    let outcome = router
        .drive(&agent, &steps, &sandbox_id, &mut transcript, &mut state)
        .await?;
    info!(?outcome, files = state.files.len(), "router finished");

    let pipeline = Pipeline::new(
        Arc::clone(&deps.small_provider),
        settings.prompts.title.clone(),
        settings.prompts.response.clone(),
    );
    let title = pipeline.generate_title(&steps, &state.summary).await?;
    let response = pipeline.format_response(&steps, &state.summary).await?;
    let url = session
        .preview_url(&steps, &sandbox_id, settings.sandbox.preview_port)
        .await?;

    let record = OutcomeRecord::classify(
        request.conversation_id.clone(),
        &state,
        title.clone(),
        response,
        url.clone(),
    );

    // The single point where the run becomes visible to the conversation.
    // Durable, so a replayed run never writes a second record.
    let _saved: StoredMessage = steps
        .run_step(STEP_SAVE_RESULT, || {
            let store = Arc::clone(&deps.store);
            let record = record.clone();
            async move { Ok(store.create(NewMessage::from_outcome(record))?) }
        })
        .await?;

    Ok(RunOutput {
        url,
        title,
        files: state.files,
        summary: sanitize(&state.summary),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
