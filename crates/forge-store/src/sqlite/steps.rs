//! Step log repository — durable step results keyed by `(run_id, step_name)`.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use tracing::debug;

use forge_core::ids::RunId;

use crate::errors::Result;
use crate::sqlite::connection::ConnectionPool;
use crate::sqlite::migrations::run_migrations;
use crate::store::StepLog;

/// Step log repository — stateless, every method takes `&Connection`.
pub struct StepRepo;

impl StepRepo {
    /// Fetch a previously recorded step result.
    pub fn get(conn: &Connection, run_id: &RunId, step_name: &str) -> Result<Option<Value>> {
        let result: Option<String> = conn
            .query_row(
                "SELECT result FROM run_steps WHERE run_id = ?1 AND step_name = ?2",
                params![run_id.as_str(), step_name],
                |row| row.get(0),
            )
            .optional()?;
        match result {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Record a step result unless one already exists for this key.
    ///
    /// `INSERT OR IGNORE` on the primary key makes the write first-wins,
    /// so concurrent replays of the same run converge on one result.
    pub fn record(
        conn: &Connection,
        run_id: &RunId,
        step_name: &str,
        result: &Value,
    ) -> Result<()> {
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO run_steps (run_id, step_name, result, recorded_at) \
             VALUES (?1, ?2, ?3, ?4)",
            params![
                run_id.as_str(),
                step_name,
                serde_json::to_string(result)?,
                Utc::now().to_rfc3339(),
            ],
        )?;
        if inserted == 0 {
            debug!(run_id = %run_id, step_name, "step result already recorded, keeping first");
        }
        Ok(())
    }
}

/// Pool-backed [`StepLog`] implementation.
pub struct SqliteStepLog {
    pool: ConnectionPool,
}

impl SqliteStepLog {
    /// Create a step log over a pool, running pending migrations.
    pub fn new(pool: ConnectionPool) -> Result<Self> {
        let conn = pool.get()?;
        let _ = run_migrations(&conn)?;
        drop(conn);
        Ok(Self { pool })
    }
}

impl StepLog for SqliteStepLog {
    fn get(&self, run_id: &RunId, step_name: &str) -> Result<Option<Value>> {
        let conn = self.pool.get()?;
        StepRepo::get(&conn, run_id, step_name)
    }

    fn record(&self, run_id: &RunId, step_name: &str, result: &Value) -> Result<()> {
        let conn = self.pool.get()?;
        StepRepo::record(&conn, run_id, step_name, result)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
