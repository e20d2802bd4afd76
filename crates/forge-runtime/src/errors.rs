//! Workflow error type.
//!
//! One enum covers everything that can abort a run. Business-level
//! incompleteness (router exhaustion, empty results) is deliberately NOT an
//! error — those runs persist an error-kind outcome record and return `Ok`.

use forge_llm::ProviderError;
use forge_sandbox::SandboxError;
use forge_store::StoreError;

/// Result type alias for workflow operations.
pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Errors that abort a workflow run.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// Sandbox operation failed.
    #[error("sandbox error: {0}")]
    Sandbox(#[from] SandboxError),

    /// LLM provider call failed.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Persistence failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Step result (de)serialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A retryable step kept failing until its retry budget ran out.
    #[error("step {name} exhausted after {attempts} attempts: {source}")]
    StepExhausted {
        /// The step that gave up.
        name: String,
        /// Total executions, including the initial attempt.
        attempts: u32,
        /// The last failure.
        #[source]
        source: Box<WorkflowError>,
    },
}

impl WorkflowError {
    /// Whether the step executor may retry after this error.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Sandbox(e) => e.is_retryable(),
            Self::Provider(e) => e.is_retryable(),
            Self::Store(_) | Self::Serialization(_) | Self::StepExhausted { .. } => false,
        }
    }

    /// Error category string for logging.
    #[must_use]
    pub fn category(&self) -> &str {
        match self {
            Self::Sandbox(_) => "sandbox",
            Self::Provider(_) => "provider",
            Self::Store(_) => "store",
            Self::Serialization(_) => "serialization",
            Self::StepExhausted { .. } => "step_exhausted",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
