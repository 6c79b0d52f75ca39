// Error taxonomy for task assignment and ORPAR orchestration (§7, the
// subset this crate owns).

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoordinatorError>;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// A `task_assigned` event named an agent that isn't this one, or
    /// a task whose status makes it ineligible for (re-)assignment.
    #[error("task not assignable: {0}")]
    NotAssignable(String),

    /// The agent attempted to auto-complete a task without matching any
    /// of the four completion-precedence rules (§4.7).
    #[error("agent `{agent_id}` may not auto-complete task `{task_id}`: no precedence rule matched")]
    CompletionNotPermitted { agent_id: String, task_id: String },

    #[error("control loop is not running")]
    NotRunning,

    #[error(transparent)]
    Loop(#[from] mxf_core::error::AgentLoopError),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}
