//! # forge-core
//!
//! Foundation types for the Forge agentic workflow orchestrator.
//!
//! This crate provides the shared vocabulary the other Forge crates depend on:
//!
//! - **Branded IDs**: [`ids::RunId`], [`ids::ConversationId`], [`ids::SandboxId`] as newtypes
//! - **Run state**: [`state::RunState`] — the per-run summary + file map
//! - **Outcomes**: [`state::OutcomeRecord`] and [`state::Fragment`]
//! - **Tool requests**: [`tools::ToolRequest`] — the statically typed tool-call union
//! - **Retry**: [`retry::RetryConfig`] and backoff calculation
//! - **Text**: completion-marker detection and sanitization in [`text`]
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by all other forge crates.

#![deny(unsafe_code)]

pub mod constants;
pub mod ids;
pub mod retry;
pub mod state;
pub mod text;
pub mod tools;
