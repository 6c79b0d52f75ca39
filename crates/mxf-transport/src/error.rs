// Error taxonomy for the transport gateway (§7 "TransportError" /
// "AuthError" / "Timeout", the subset this crate owns).

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TransportError>;

#[derive(Debug, Error)]
pub enum TransportError {
    /// Handshake rejected or domain-key invalid. Unrecoverable for the
    /// session — the caller must not retry without new credentials.
    #[error("authentication error: {0}")]
    Auth(String),

    /// Neither `registered` nor `connected` arrived within the 10 s
    /// registration budget (§4.2).
    #[error("registration handshake timed out after {0:?}")]
    InitTimeout(std::time::Duration),

    /// Connection lost or frame failure. Triggers reconnection with
    /// backoff; surfaced to the caller only after attempts are exhausted.
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// A frame could not be encoded or decoded as an `Envelope`.
    #[error("frame error: {0}")]
    Frame(String),

    /// Reconnection exhausted its configured attempt budget.
    #[error("reconnection attempts exhausted after {0} tries")]
    ReconnectExhausted(u32),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl TransportError {
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    pub fn connection_lost(msg: impl Into<String>) -> Self {
        Self::ConnectionLost(msg.into())
    }

    pub fn frame(msg: impl Into<String>) -> Self {
        Self::Frame(msg.into())
    }

    /// Fatal for the session: no amount of reconnection fixes it (§7).
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}
