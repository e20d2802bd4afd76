//! # forge-store
//!
//! Persistence for the Forge orchestrator: conversation messages and the
//! append-only durable step log.
//!
//! Two traits define the boundary — [`MessageStore`] for outcome messages
//! and conversation history, [`StepLog`] for recorded step results. The
//! SQLite implementations back production; in-memory implementations back
//! tests that don't care about storage.

#![deny(unsafe_code)]

pub mod errors;
pub mod memory;
pub mod sqlite;
pub mod store;

pub use errors::{Result, StoreError};
pub use memory::{MemoryMessageStore, MemoryStepLog};
pub use sqlite::{SqliteMessageStore, SqliteStepLog};
pub use store::{MessageStore, NewMessage, StepLog, StoredMessage};
