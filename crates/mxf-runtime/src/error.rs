// Process-level error taxonomy (§7, the subset not already owned by
// `mxf-core`/`mxf-transport`/`mxf-coordinator`). Fatal errors
// (`Config`, the fatal half of `Transport`) cause orderly shutdown in
// `Runtime::run`: stop the liveness beacon, flush memory persistence,
// unsubscribe, mark status `error`.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Missing or invalid required configuration. Fail fast at construction.
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Transport(#[from] mxf_transport::TransportError),

    #[error(transparent)]
    AgentLoop(#[from] mxf_core::error::AgentLoopError),

    #[error(transparent)]
    Coordinator(#[from] mxf_coordinator::CoordinatorError),

    #[error("no agent process registered for agent id {0}")]
    UnknownAgent(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl RuntimeError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_)) || matches!(self, Self::Transport(e) if e.is_fatal())
    }
}
