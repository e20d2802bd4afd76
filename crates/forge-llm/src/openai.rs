//! OpenAI-compatible provider implementing the [`Provider`] trait.
//!
//! Sends non-streaming requests to a `/chat/completions` endpoint with
//! API-key bearer auth. Works against any OpenAI-compatible backend; the
//! base URL and model come from settings.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use forge_core::tools::ToolDefinition;

use crate::provider::{
    ChatMessage, ChatRequest, Completion, Provider, ProviderError, ProviderResult, ToolCall,
};

/// Default fallback when a 429 response has no usable `Retry-After` header.
const DEFAULT_RETRY_AFTER_MS: u64 = 5_000;

/// Configuration for the OpenAI-compatible provider.
#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    /// Base URL, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    /// Model ID.
    pub model: String,
    /// API key sent as a bearer token.
    pub api_key: String,
}

/// OpenAI-compatible LLM provider.
pub struct OpenAiProvider {
    config: OpenAiConfig,
    /// HTTP client (reused across requests).
    client: reqwest::Client,
}

impl OpenAiProvider {
    /// Create a new provider.
    #[must_use]
    pub fn new(config: OpenAiConfig) -> Self {
        info!(model = %config.model, base_url = %config.base_url, "OpenAI provider initialized");
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn headers(&self) -> ProviderResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let bearer = format!("Bearer {}", self.config.api_key);
        let value = HeaderValue::from_str(&bearer).map_err(|_| ProviderError::Auth {
            message: "API key contains invalid header characters".to_owned(),
        })?;
        let _ = headers.insert(AUTHORIZATION, value);
        Ok(headers)
    }

    fn build_body(&self, request: &ChatRequest) -> Value {
        let mut messages = vec![json!({"role": "system", "content": request.system})];
        for message in &request.messages {
            messages.push(wire_message(message));
        }

        let mut body = json!({
            "model": self.config.model,
            "messages": messages,
        });
        if !request.tools.is_empty() {
            body["tools"] = Value::Array(request.tools.iter().map(wire_tool).collect());
            body["tool_choice"] = json!("auto");
        }
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }
        body
    }
}

/// Convert a transcript message to the chat-completions wire shape.
fn wire_message(message: &ChatMessage) -> Value {
    match message {
        ChatMessage::User { content } => json!({"role": "user", "content": content}),
        ChatMessage::Assistant {
            content,
            tool_calls,
        } => {
            let mut wire = json!({"role": "assistant", "content": content});
            if !tool_calls.is_empty() {
                wire["tool_calls"] = Value::Array(
                    tool_calls
                        .iter()
                        .map(|tc| {
                            json!({
                                "id": tc.id,
                                "type": "function",
                                "function": {
                                    "name": tc.name,
                                    // The wire format carries arguments as a JSON string.
                                    "arguments": tc.arguments.to_string(),
                                }
                            })
                        })
                        .collect(),
                );
            }
            wire
        }
        ChatMessage::Tool {
            tool_call_id,
            content,
        } => json!({"role": "tool", "tool_call_id": tool_call_id, "content": content}),
    }
}

fn wire_tool(def: &ToolDefinition) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": def.name,
            "description": def.description,
            "parameters": def.parameters,
        }
    })
}

#[derive(Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireMessage,
}

#[derive(Deserialize)]
struct WireMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Deserialize)]
struct WireToolCall {
    id: String,
    function: WireFunction,
}

#[derive(Deserialize)]
struct WireFunction {
    name: String,
    arguments: String,
}

/// Error body shape returned by OpenAI-compatible endpoints.
#[derive(Deserialize, Serialize)]
struct WireError {
    error: WireErrorBody,
}

#[derive(Deserialize, Serialize)]
struct WireErrorBody {
    message: String,
}

fn parse_error_message(body: &str) -> String {
    serde_json::from_str::<WireError>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_owned())
}

fn parse_retry_after(headers: &HeaderMap) -> u64 {
    headers
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(DEFAULT_RETRY_AFTER_MS, |seconds| seconds * 1000)
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn model(&self) -> &str {
        &self.config.model
    }

    async fn invoke(&self, request: &ChatRequest) -> ProviderResult<Completion> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let body = self.build_body(request);

        debug!(
            model = %self.config.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "sending completion request"
        );

        let response = self
            .client
            .post(&url)
            .headers(self.headers()?)
            .json(&body)
            .send()
            .await
            .map_err(ProviderError::Http)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after_ms = parse_retry_after(response.headers());
            let text = response.text().await.unwrap_or_default();
            let message = parse_error_message(&text);
            return Err(match status.as_u16() {
                401 | 403 => ProviderError::Auth { message },
                429 => ProviderError::RateLimited {
                    retry_after_ms,
                    message,
                },
                status_code => ProviderError::Api {
                    status: status_code,
                    message,
                    retryable: status.is_server_error(),
                },
            });
        }

        let wire: WireResponse = response.json().await.map_err(ProviderError::Http)?;
        let choice = wire.choices.into_iter().next().ok_or(ProviderError::Other {
            message: "response contained no choices".to_owned(),
        })?;

        let tool_calls = choice
            .message
            .tool_calls
            .into_iter()
            .map(|tc| {
                // Malformed argument strings become null arguments; the tool
                // boundary turns those into a parse-failure result the agent
                // can read and correct.
                let arguments = serde_json::from_str(&tc.function.arguments).unwrap_or_else(|e| {
                    warn!(tool = %tc.function.name, error = %e, "unparseable tool arguments");
                    Value::Null
                });
                ToolCall {
                    id: tc.id,
                    name: tc.function.name,
                    arguments,
                }
            })
            .collect();

        Ok(Completion {
            text: choice.message.content.unwrap_or_default(),
            tool_calls,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
