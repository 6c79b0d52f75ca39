// Test doubles for the transport gateway. Mirrors mxf-core's
// `testutil` module: scripted responders instead of a real socket.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use mxf_contracts::envelope::Envelope;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::socket::{Connector, WireSocket};

/// Replays a fixed inbound script; once exhausted, `recv` hangs
/// (simulating silence from the server) rather than returning `None`,
/// so timeout logic under test actually has something to time out on.
pub struct ScriptedSocket {
    inbound: VecDeque<Envelope>,
    close_on_exhausted: bool,
    /// Shared so a test can inspect what was sent after the socket has
    /// been moved into a `Box<dyn WireSocket>` by the connector.
    sent: Arc<Mutex<Vec<Envelope>>>,
}

impl ScriptedSocket {
    pub fn new(inbound: Vec<Envelope>) -> Self {
        Self {
            inbound: inbound.into(),
            close_on_exhausted: false,
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Once the script is exhausted, `recv` returns `Ok(None)` (a
    /// clean close) instead of hanging.
    pub fn with_close_on_exhausted(mut self) -> Self {
        self.close_on_exhausted = true;
        self
    }

    /// A handle that keeps recording sends after the socket is boxed
    /// and handed to a `Connector`.
    pub fn sent_log(&self) -> Arc<Mutex<Vec<Envelope>>> {
        self.sent.clone()
    }
}

#[async_trait]
impl WireSocket for ScriptedSocket {
    async fn send(&mut self, envelope: &Envelope) -> Result<()> {
        self.sent.lock().await.push(envelope.clone());
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<Envelope>> {
        match self.inbound.pop_front() {
            Some(envelope) => Ok(Some(envelope)),
            None if self.close_on_exhausted => Ok(None),
            None => std::future::pending().await,
        }
    }
}

/// Hands out a pre-scripted socket once, then reports the connection
/// as exhausted; useful for exercising "reconnect, replay, resume"
/// paths without a real network.
pub struct ScriptedConnector {
    sockets: Mutex<VecDeque<ScriptedSocket>>,
}

impl ScriptedConnector {
    pub fn new(sockets: Vec<ScriptedSocket>) -> Self {
        Self {
            sockets: Mutex::new(sockets.into()),
        }
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self) -> Result<Box<dyn WireSocket>> {
        let mut sockets = self.sockets.lock().await;
        match sockets.pop_front() {
            Some(socket) => Ok(Box::new(socket)),
            None => Err(crate::error::TransportError::connection_lost(
                "scripted connector exhausted",
            )),
        }
    }
}
