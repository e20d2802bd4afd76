//! # Router
//!
//! The run's state machine: `RUNNING → COMPLETE | EXHAUSTED`. The router
//! owns the [`RunState`] and is its single writer — agent turns report
//! effects back as values, and the router merges them serially between
//! iterations. Once the summary is set, nothing mutates state again.

use tracing::{info, instrument};

use forge_core::ids::SandboxId;
use forge_core::state::RunState;
use forge_llm::ChatMessage;

use crate::agent::{Agent, AgentTurn};
use crate::errors::WorkflowResult;
use crate::steps::StepExecutor;

/// Terminal router state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouterOutcome {
    /// The agent signalled completion.
    Complete,
    /// The iteration budget ran out before completion.
    Exhausted,
}

/// Drives agent iterations until completion or exhaustion.
pub struct Router {
    max_iterations: u32,
}

impl Router {
    /// Create a router with an iteration budget.
    #[must_use]
    pub fn new(max_iterations: u32) -> Self {
        Self { max_iterations }
    }

    /// Run the agent loop to a terminal state, mutating `state` as the
    /// single writer.
    ///
    /// A never-completing agent runs exactly `max_iterations` times.
    #[instrument(skip_all, fields(max_iterations = self.max_iterations))]
    pub async fn drive(
        &self,
        agent: &Agent,
        steps: &StepExecutor,
        sandbox_id: &SandboxId,
        transcript: &mut Vec<ChatMessage>,
        state: &mut RunState,
    ) -> WorkflowResult<RouterOutcome> {
        let mut iteration: u32 = 0;
        loop {
            if state.has_summary() {
                info!(iteration, "run complete");
                metrics::counter!("runs_completed_total", "outcome" => "complete").increment(1);
                return Ok(RouterOutcome::Complete);
            }
            if iteration >= self.max_iterations {
                info!(iteration, "iteration budget exhausted");
                metrics::counter!("runs_completed_total", "outcome" => "exhausted").increment(1);
                return Ok(RouterOutcome::Exhausted);
            }

            let turn = agent
                .run_turn(steps, sandbox_id, transcript, &state.files, iteration)
                .await?;
            self.apply(state, turn);

            iteration += 1;
            metrics::counter!("router_iterations_total").increment(1);
        }
    }

    /// Merge one turn's effects into state. Sole mutation point for
    /// `RunState` during the loop.
    fn apply(&self, state: &mut RunState, turn: AgentTurn) {
        match turn {
            AgentTurn::Done {
                summary,
                file_updates,
            } => {
                state.merge_files(file_updates);
                state.summary = summary;
            }
            AgentTurn::Continue { file_updates } => {
                state.merge_files(file_updates);
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
