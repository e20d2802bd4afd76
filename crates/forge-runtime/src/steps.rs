//! # Durable Step Executor
//!
//! Every effectful operation in a run executes as a named step. Before
//! running, the executor consults the append-only step log keyed by
//! `(run_id, step_name)`; a cached result short-circuits execution entirely,
//! which is what makes replaying a crashed run safe. Uncached steps run with
//! bounded exponential-backoff retries for retryable errors, and the final
//! result is recorded first-write-wins.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use forge_core::ids::RunId;
use forge_core::retry::RetryConfig;
use forge_store::StepLog;

use crate::errors::{WorkflowError, WorkflowResult};

/// Executes named durable steps for one run.
pub struct StepExecutor {
    run_id: RunId,
    log: Arc<dyn StepLog>,
    retry: RetryConfig,
}

impl StepExecutor {
    /// Create an executor for a run.
    #[must_use]
    pub fn new(run_id: RunId, log: Arc<dyn StepLog>, retry: RetryConfig) -> Self {
        Self { run_id, log, retry }
    }

    /// The run this executor belongs to.
    #[must_use]
    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// Run a durable step.
    ///
    /// Returns the cached result if `(run_id, name)` was already recorded.
    /// Otherwise runs `operation`, retrying retryable failures up to the
    /// configured budget, and records the successful result. Non-retryable
    /// failures propagate immediately; a spent retry budget becomes
    /// [`WorkflowError::StepExhausted`].
    pub async fn run_step<T, F, Fut>(&self, name: &str, mut operation: F) -> WorkflowResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnMut() -> Fut,
        Fut: Future<Output = WorkflowResult<T>>,
    {
        if let Some(cached) = self.log.get(&self.run_id, name)? {
            debug!(run_id = %self.run_id, step = name, "step result cached, replaying");
            metrics::counter!("step_replays_total").increment(1);
            return Ok(serde_json::from_value(cached)?);
        }

        let mut attempt: u32 = 0;
        let value = loop {
            match operation().await {
                Ok(value) => break value,
                Err(e) if e.is_retryable() && attempt < self.retry.max_retries => {
                    let delay = self.retry.delay_for_attempt(attempt, rand::random::<f64>());
                    warn!(
                        run_id = %self.run_id,
                        step = name,
                        attempt,
                        delay_ms = delay,
                        error = %e,
                        "step failed, retrying"
                    );
                    metrics::counter!("step_retries_total", "step" => name.to_owned()).increment(1);
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    attempt += 1;
                }
                Err(e) if e.is_retryable() => {
                    return Err(WorkflowError::StepExhausted {
                        name: name.to_owned(),
                        attempts: attempt + 1,
                        source: Box::new(e),
                    });
                }
                Err(e) => return Err(e),
            }
        };

        let json = serde_json::to_value(&value)?;
        self.log.record(&self.run_id, name, &json)?;
        Ok(value)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
