//! # Post-Processing Pipeline
//!
//! Two single-shot provider calls that run after the router stops: a
//! fragment title generator and a response formatter. Both take the final
//! summary as their only input, run without tools, and sanitize their
//! output so the completion marker never reaches the user.

use std::sync::Arc;

use tracing::debug;

use forge_core::constants::DEFAULT_FRAGMENT_TITLE;
use forge_core::text::sanitize;
use forge_llm::{ChatMessage, ChatRequest, Provider};

use crate::errors::WorkflowResult;
use crate::steps::StepExecutor;

/// Step name for title generation.
const STEP_GENERATE_TITLE: &str = "generate-fragment-title";
/// Step name for response formatting.
const STEP_GENERATE_RESPONSE: &str = "generate-response";

/// Token budget for the short post-processing completions.
const POST_PROCESSING_MAX_TOKENS: u32 = 256;

/// Post-processing over the run summary.
pub struct Pipeline {
    provider: Arc<dyn Provider>,
    title_prompt: String,
    response_prompt: String,
}

impl Pipeline {
    /// Create a pipeline. `provider` is typically the small model.
    #[must_use]
    pub fn new(provider: Arc<dyn Provider>, title_prompt: String, response_prompt: String) -> Self {
        Self {
            provider,
            title_prompt,
            response_prompt,
        }
    }

    /// Generate the fragment title. Falls back to a fixed default when the
    /// model produces nothing usable.
    pub async fn generate_title(
        &self,
        steps: &StepExecutor,
        summary: &str,
    ) -> WorkflowResult<String> {
        let title = self
            .single_shot(steps, STEP_GENERATE_TITLE, &self.title_prompt, summary)
            .await?;
        if title.is_empty() {
            debug!("empty generated title, using default");
            Ok(DEFAULT_FRAGMENT_TITLE.to_owned())
        } else {
            Ok(title)
        }
    }

    /// Format the user-facing response. Falls back to the sanitized summary
    /// when the model produces nothing usable.
    pub async fn format_response(
        &self,
        steps: &StepExecutor,
        summary: &str,
    ) -> WorkflowResult<String> {
        let response = self
            .single_shot(steps, STEP_GENERATE_RESPONSE, &self.response_prompt, summary)
            .await?;
        if response.is_empty() {
            Ok(sanitize(summary))
        } else {
            Ok(response)
        }
    }

    /// One durable no-tools completion, sanitized.
    async fn single_shot(
        &self,
        steps: &StepExecutor,
        step_name: &str,
        system: &str,
        input: &str,
    ) -> WorkflowResult<String> {
        steps
            .run_step(step_name, || {
                let provider = Arc::clone(&self.provider);
                let request = ChatRequest {
                    system: system.to_owned(),
                    messages: vec![ChatMessage::User {
                        content: input.to_owned(),
                    }],
                    tools: vec![],
                    max_tokens: Some(POST_PROCESSING_MAX_TOKENS),
                    temperature: None,
                };
                async move {
                    let completion = provider.invoke(&request).await?;
                    Ok(sanitize(&completion.text))
                }
            })
            .await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
