// The seam between the gateway's protocol logic and an actual byte
// stream. `WireSocket` is the per-connection duplex; `Connector`
// knows how to open a fresh one. Production code wraps
// `tokio-tungstenite`; tests use an in-memory fake (see `testutil`).
//
// Trait objects rather than a generic parameter on `WireSocket`
// itself: a socket is inherently `!Sized`-friendly state (an open
// connection you hand off and replace wholesale on reconnect), the
// same shape `LlmResponseStream` uses for provider streams in
// mxf-core.

use async_trait::async_trait;
use mxf_contracts::envelope::Envelope;

use crate::error::Result;

#[async_trait]
pub trait WireSocket: Send {
    async fn send(&mut self, envelope: &Envelope) -> Result<()>;

    /// Returns `Ok(None)` on a clean close.
    async fn recv(&mut self) -> Result<Option<Envelope>>;
}

#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn WireSocket>>;
}
