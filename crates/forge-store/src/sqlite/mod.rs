//! `SQLite` persistence backend.

pub mod connection;
pub mod messages;
pub mod migrations;
pub mod steps;

pub use connection::{new_file, new_in_memory, ConnectionConfig, ConnectionPool};
pub use messages::SqliteMessageStore;
pub use steps::SqliteStepLog;
