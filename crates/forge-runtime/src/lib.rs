//! # forge-runtime
//!
//! The orchestration core of Forge: durable steps, the sandbox session
//! manager, the tool layer, the agent turn loop, the router state machine,
//! the post-processing pipeline, and the top-level workflow that ties them
//! together behind a single [`workflow::run_workflow`] entry point.
//!
//! Everything effectful happens inside a durable step: results are looked up
//! in the step log before execution and recorded after, so a crashed run can
//! be replayed under the same run id without repeating side effects.

#![deny(unsafe_code)]

pub mod agent;
pub mod errors;
pub mod pipeline;
pub mod router;
pub mod session;
pub mod steps;
pub mod tools;
pub mod workflow;

pub use errors::{WorkflowError, WorkflowResult};
pub use workflow::{run_workflow, RunOutput, RunRequest, WorkflowDeps};
