//! # Sandbox Session Manager
//!
//! Creates the run's sandbox (one durable step covering create + TTL) and
//! resolves the preview URL. The sandbox id is a capability token: it is the
//! only thing that crosses step boundaries, and every later operation
//! re-attaches by id through the provider.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, instrument};

use forge_core::constants::PREVIEW_PROTOCOL;
use forge_core::ids::SandboxId;
use forge_sandbox::{SandboxProvider, SandboxSession};

use crate::errors::WorkflowResult;
use crate::steps::StepExecutor;

/// Step name for sandbox creation.
const STEP_CREATE_SANDBOX: &str = "create-sandbox";
/// Step name for preview URL resolution.
const STEP_GET_SANDBOX_URL: &str = "get-sandbox-url";

/// Manages the sandbox lifecycle for one run.
pub struct SessionManager {
    sandbox: Arc<dyn SandboxProvider>,
    template: String,
    ttl: Duration,
}

impl SessionManager {
    /// Create a session manager.
    #[must_use]
    pub fn new(sandbox: Arc<dyn SandboxProvider>, template: String, ttl: Duration) -> Self {
        Self {
            sandbox,
            template,
            ttl,
        }
    }

    /// Provision the run's sandbox and set its TTL, as one durable step.
    ///
    /// Create and TTL-set are not individually durable: a crash between the
    /// two leaks an unconfigured sandbox, which its default TTL reclaims.
    #[instrument(skip_all, fields(template = %self.template))]
    pub async fn create(&self, steps: &StepExecutor) -> WorkflowResult<SandboxId> {
        let id: String = steps
            .run_step(STEP_CREATE_SANDBOX, || {
                let sandbox = Arc::clone(&self.sandbox);
                let template = self.template.clone();
                let ttl = self.ttl;
                async move {
                    let id = sandbox.create(&template).await?;
                    sandbox.set_timeout(&id, ttl).await?;
                    Ok(id.into_inner())
                }
            })
            .await?;

        info!(sandbox_id = %id, "sandbox ready");
        metrics::counter!("sandboxes_created_total").increment(1);
        Ok(SandboxId::from_string(id))
    }

    /// Re-attach to the sandbox by id.
    pub async fn resolve(&self, id: &SandboxId) -> WorkflowResult<SandboxSession> {
        Ok(self.sandbox.resolve(id).await?)
    }

    /// The externally reachable preview URL, as one durable step.
    pub async fn preview_url(
        &self,
        steps: &StepExecutor,
        id: &SandboxId,
        port: u16,
    ) -> WorkflowResult<String> {
        steps
            .run_step(STEP_GET_SANDBOX_URL, || {
                let sandbox = Arc::clone(&self.sandbox);
                let id = id.clone();
                async move {
                    let host = sandbox.get_host(&id, port).await?;
                    Ok(format!("{PREVIEW_PROTOCOL}{host}"))
                }
            })
            .await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
