// Error taxonomy for the agent runtime core.
//
// Kinds, not class names: each variant is a propagation policy, not a
// message. Fatal errors (Auth, Config) cause orderly shutdown; the rest
// are converted to synthetic tool-results or user-role feedback so the
// pairing invariant (M1) is never violated.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AgentLoopError>;

#[derive(Debug, Error)]
pub enum AgentLoopError {
    /// Missing or invalid required configuration. Fail fast at construction.
    #[error("configuration error: {0}")]
    Config(String),

    /// Handshake rejected or domain-key invalid. Unrecoverable for the session.
    #[error("authentication error: {0}")]
    Auth(String),

    /// LLM adapter call failed. Aborts the current iteration but not the
    /// task; the loop may retry next iteration up to `maxIterations`.
    #[error("llm error: {0}")]
    Llm(String),

    /// Connection lost or frame failure. Triggers reconnection with backoff.
    #[error("transport error: {0}")]
    Transport(String),

    /// Registration, remote-server registration, LLM adapter, or tool
    /// execution exceeded its budget.
    #[error("timeout after {0:?}")]
    Timeout(std::time::Duration),

    /// Tool-call/result pairing would be violated. Always repaired by
    /// synthesizing minimal results before this ever reaches the LLM.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Tool invocation failed at the tool level (not a system failure).
    #[error("tool error: {0}")]
    Tool(String),

    /// The circuit breaker blocked a call.
    #[error("circuit breaker tripped: {0}")]
    BreakerTripped(String),

    /// Durable document would exceed the safety ceiling.
    #[error("quota exceeded: {0}")]
    Quota(String),

    /// Secondary-index write failed. Never fatal.
    #[error("index error: {0}")]
    Index(String),

    /// Loop terminated because it reached `maxIterations`.
    #[error("max iterations ({0}) reached")]
    MaxIterationsReached(usize),

    /// The control loop or task was cancelled mid-turn.
    #[error("loop cancelled")]
    Cancelled,

    /// Nothing to process for this turn.
    #[error("no messages to process")]
    NoMessages,

    #[error("agent not found: {0}")]
    AgentNotFound(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AgentLoopError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }
    pub fn llm(msg: impl Into<String>) -> Self {
        Self::Llm(msg.into())
    }
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }
    pub fn tool(msg: impl Into<String>) -> Self {
        Self::Tool(msg.into())
    }
    pub fn breaker_tripped(msg: impl Into<String>) -> Self {
        Self::BreakerTripped(msg.into())
    }
    pub fn quota(msg: impl Into<String>) -> Self {
        Self::Quota(msg.into())
    }
    pub fn index(msg: impl Into<String>) -> Self {
        Self::Index(msg.into())
    }
    pub fn agent_not_found(agent_id: impl Into<String>) -> Self {
        Self::AgentNotFound(agent_id.into())
    }

    /// Fatal errors require orderly agent shutdown (stop heartbeat, flush
    /// memory, unsubscribe, mark status `error`) rather than a retry.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Auth(_) | Self::Config(_))
    }
}
