//! Shared constants for the Forge orchestrator.

/// Opening tag of the completion marker an agent emits when its work is done.
pub const TASK_SUMMARY_OPEN: &str = "<task_summary>";

/// Closing tag of the completion marker.
pub const TASK_SUMMARY_CLOSE: &str = "</task_summary>";

/// Maximum agent iterations per run before the router gives up.
pub const DEFAULT_MAX_ITERATIONS: u32 = 10;

/// Number of prior conversation entries loaded to seed agent context.
pub const CONVERSATION_CONTEXT_WINDOW: usize = 5;

/// Sandbox lifetime. Elapsed TTL is the only cancellation mechanism a run has.
pub const DEFAULT_SANDBOX_TTL_MS: u64 = 10 * 60 * 1000;

/// Port the preview server inside the sandbox listens on.
pub const DEFAULT_PREVIEW_PORT: u16 = 3000;

/// Protocol prefix combined with the resolved sandbox host to form the
/// externally reachable preview URL.
pub const PREVIEW_PROTOCOL: &str = "https://";

/// Fixed user-facing message persisted when a run ends without a usable result.
pub const INCOMPLETE_RUN_MESSAGE: &str = "Something went wrong. Please try again.";

/// Fallback fragment title when the title generator produces nothing.
pub const DEFAULT_FRAGMENT_TITLE: &str = "Fragment";
