//! # forge-llm
//!
//! LLM provider abstraction for the Forge orchestrator.
//!
//! The orchestrator's contract with an LLM vendor is a single-shot
//! [`Provider::invoke`] call: system prompt + messages + tool definitions in,
//! free text + tool calls out. Vendor specifics stay behind the trait;
//! [`openai::OpenAiProvider`] is the bundled OpenAI-compatible implementation.

#![deny(unsafe_code)]

pub mod openai;
pub mod provider;
pub mod testutil;

pub use openai::{OpenAiConfig, OpenAiProvider};
pub use provider::{
    ChatMessage, ChatRequest, Completion, Provider, ProviderError, ProviderResult, ToolCall,
};
