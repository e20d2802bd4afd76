//! # forge-sandbox
//!
//! Ephemeral sandbox abstraction for the Forge orchestrator.
//!
//! A sandbox is an isolated workspace with a TTL: the agent runs shell
//! commands and reads/writes files inside it, and a preview host can be
//! resolved for a given port. Backends stay behind [`SandboxProvider`];
//! [`local::LocalSandboxProvider`] runs everything in a local directory,
//! which is enough for development and tests.

#![deny(unsafe_code)]

pub mod local;
pub mod provider;
pub mod testutil;

pub use local::LocalSandboxProvider;
pub use provider::{
    CommandOutput, CommandSink, NullSink, SandboxError, SandboxProvider, SandboxResult,
    SandboxSession,
};
