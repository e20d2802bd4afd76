//! Test doubles for the [`Provider`] trait.
//!
//! [`ScriptedProvider`] plays back a queue of canned results and records
//! every request it receives, so orchestration tests can assert both what
//! was sent to the model and how the caller reacts to each response.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::provider::{
    ChatRequest, Completion, Provider, ProviderError, ProviderResult, ToolCall,
};

/// A provider that replays scripted results in order.
///
/// When the script runs dry it returns `ProviderError::Other`, which keeps
/// a test failure loud instead of hanging the caller's loop.
pub struct ScriptedProvider {
    model: String,
    script: Mutex<VecDeque<ProviderResult<Completion>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedProvider {
    /// Create an empty scripted provider.
    #[must_use]
    pub fn new() -> Self {
        Self {
            model: "scripted-model".to_owned(),
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a raw result.
    pub fn push(&self, result: ProviderResult<Completion>) {
        self.script.lock().push_back(result);
    }

    /// Queue a text-only completion.
    pub fn push_text(&self, text: &str) {
        self.push(Ok(Completion {
            text: text.to_owned(),
            tool_calls: vec![],
        }));
    }

    /// Queue a completion with a single tool call.
    pub fn push_tool_call(&self, name: &str, arguments: Value) {
        self.push(Ok(Completion {
            text: String::new(),
            tool_calls: vec![ToolCall {
                id: format!("call_{}", self.script.lock().len()),
                name: name.to_owned(),
                arguments,
            }],
        }));
    }

    /// Queue a failure.
    pub fn push_error(&self, error: ProviderError) {
        self.push(Err(error));
    }

    /// All requests received so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().clone()
    }

    /// Number of invocations so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn model(&self) -> &str {
        &self.model
    }

    async fn invoke(&self, request: &ChatRequest) -> ProviderResult<Completion> {
        self.requests.lock().push(request.clone());
        self.script.lock().pop_front().unwrap_or_else(|| {
            Err(ProviderError::Other {
                message: "scripted provider exhausted".to_owned(),
            })
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
