// Production `WireSocket`/`Connector` over `tokio-tungstenite`. Each
// `Envelope` is one JSON text frame; anything else arriving on the
// wire (ping/pong/close) is handled transparently by tungstenite and
// never reaches the caller as data.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use mxf_contracts::envelope::Envelope;
use tokio::net::TcpStream;
use tokio_tungstenite::{tungstenite::Message, MaybeTlsStream, WebSocketStream};

use crate::error::{Result, TransportError};
use crate::socket::{Connector, WireSocket};

pub struct WebSocketConnector {
    url: String,
}

impl WebSocketConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self) -> Result<Box<dyn WireSocket>> {
        let (stream, _response) = tokio_tungstenite::connect_async(&self.url)
            .await
            .map_err(|e| TransportError::connection_lost(e.to_string()))?;
        Ok(Box::new(TungsteniteSocket { stream }))
    }
}

struct TungsteniteSocket {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl WireSocket for TungsteniteSocket {
    async fn send(&mut self, envelope: &Envelope) -> Result<()> {
        let text = serde_json::to_string(envelope)
            .map_err(|e| TransportError::frame(e.to_string()))?;
        self.stream
            .send(Message::Text(text))
            .await
            .map_err(|e| TransportError::connection_lost(e.to_string()))
    }

    async fn recv(&mut self) -> Result<Option<Envelope>> {
        loop {
            match self.stream.next().await {
                None => return Ok(None),
                Some(Err(e)) => return Err(TransportError::connection_lost(e.to_string())),
                Some(Ok(Message::Text(text))) => {
                    let envelope = serde_json::from_str(&text)
                        .map_err(|e| TransportError::frame(e.to_string()))?;
                    return Ok(Some(envelope));
                }
                Some(Ok(Message::Close(_))) => return Ok(None),
                // Ping/Pong/Binary/Frame carry no envelope; keep reading.
                Some(Ok(_)) => continue,
            }
        }
    }
}
