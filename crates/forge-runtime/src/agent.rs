//! # Agent
//!
//! One agent turn: invoke the provider over the accumulated transcript,
//! execute any requested tool calls in order, and report completion to the
//! router as a tagged [`AgentTurn`]. The agent holds no state of its own —
//! the transcript and the file map are owned by the caller.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, instrument};

use forge_core::ids::SandboxId;
use forge_core::text::contains_task_summary;
use forge_core::tools::tool_definitions;
use forge_llm::{ChatMessage, ChatRequest, Completion, Provider};

use crate::errors::WorkflowResult;
use crate::steps::StepExecutor;
use crate::tools::ToolSet;

/// Result of one agent turn, as seen by the router.
#[derive(Clone, Debug)]
pub enum AgentTurn {
    /// The agent emitted the completion marker; the run is done.
    Done {
        /// The full assistant text of the completing turn, marker included.
        /// Sanitization happens at the output boundary, not here.
        summary: String,
        /// File writes performed during this turn.
        file_updates: BTreeMap<String, String>,
    },
    /// The agent has more work to do.
    Continue {
        /// File writes performed during this turn.
        file_updates: BTreeMap<String, String>,
    },
}

/// Drives individual agent turns.
pub struct Agent {
    provider: Arc<dyn Provider>,
    tools: ToolSet,
    system_prompt: String,
    max_tokens: u32,
    temperature: f64,
}

impl Agent {
    /// Create an agent.
    #[must_use]
    pub fn new(
        provider: Arc<dyn Provider>,
        tools: ToolSet,
        system_prompt: String,
        max_tokens: u32,
        temperature: f64,
    ) -> Self {
        Self {
            provider,
            tools,
            system_prompt,
            max_tokens,
            temperature,
        }
    }

    /// Run one turn.
    ///
    /// The provider call is a durable step keyed by iteration; tool calls are
    /// durable steps keyed by iteration and call index. The assistant message
    /// and all tool results are appended to `transcript`, so the next turn
    /// sees everything this one did.
    #[instrument(skip_all, fields(iteration, model = self.provider.model()))]
    pub async fn run_turn(
        &self,
        steps: &StepExecutor,
        sandbox_id: &SandboxId,
        transcript: &mut Vec<ChatMessage>,
        files: &BTreeMap<String, String>,
        iteration: u32,
    ) -> WorkflowResult<AgentTurn> {
        let request = ChatRequest {
            system: self.system_prompt.clone(),
            messages: transcript.clone(),
            tools: tool_definitions(),
            max_tokens: Some(self.max_tokens),
            temperature: Some(self.temperature),
        };

        let completion: Completion = steps
            .run_step(&format!("agent:{iteration}"), || {
                let provider = Arc::clone(&self.provider);
                let request = request.clone();
                async move { Ok(provider.invoke(&request).await?) }
            })
            .await?;

        debug!(
            iteration,
            tool_calls = completion.tool_calls.len(),
            "agent turn completed"
        );

        transcript.push(ChatMessage::Assistant {
            content: completion.text.clone(),
            tool_calls: completion.tool_calls.clone(),
        });

        // Tool calls run serially; each call sees the files written by the
        // calls before it within this turn.
        let mut file_updates: BTreeMap<String, String> = BTreeMap::new();
        let mut working = files.clone();
        for (index, call) in completion.tool_calls.iter().enumerate() {
            let outcome = self
                .tools
                .execute(steps, call, sandbox_id, iteration, index, &working)
                .await?;
            working.extend(outcome.file_updates.clone());
            file_updates.extend(outcome.file_updates);
            transcript.push(ChatMessage::Tool {
                tool_call_id: call.id.clone(),
                content: outcome.result_text,
            });
        }

        if contains_task_summary(&completion.text) {
            info!(iteration, "agent signalled completion");
            Ok(AgentTurn::Done {
                summary: completion.text,
                file_updates,
            })
        } else {
            Ok(AgentTurn::Continue { file_updates })
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
