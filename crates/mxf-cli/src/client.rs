// One-shot request/response helper against the exchange server, for
// the provisioning verbs that don't need the persistent gateway's
// reconnect loop (§4.2) — connect, authenticate, send one frame, await
// the matching response or its `*_failed` counterpart, then drop the
// connection.
//
// `channel:create` and `key:generate` run before any agent identity
// exists in the target channel, so they stop at the auth stage of the
// handshake (`domainKey` + `userCredentials`) rather than the full
// `register`, which requires a channel membership to join.

use std::time::Duration;

use mxf_contracts::envelope::Envelope;
use mxf_transport::{handshake, Connector, HandshakeIdentity, TransportError, WebSocketConnector};
use serde_json::Value;
use tokio::time::timeout;

#[derive(Debug, thiserror::Error)]
pub enum CliClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("timed out waiting for a response to {0}")]
    Timeout(String),
    #[error("server rejected the request: {0}")]
    Rejected(String),
}

impl CliClientError {
    /// §6 "Exit codes": auth/validation rejections are 1, transport
    /// failures are 2, timeouts are 3.
    pub fn exit_code(&self) -> mxf_contracts::cli::CliExitCode {
        use mxf_contracts::cli::CliExitCode;
        match self {
            CliClientError::Transport(e) if e.is_fatal() => CliExitCode::ValidationOrAuthFailure,
            CliClientError::Transport(_) => CliExitCode::ServerFailure,
            CliClientError::Timeout(_) => CliExitCode::Timeout,
            CliClientError::Rejected(_) => CliExitCode::ValidationOrAuthFailure,
        }
    }
}

pub struct CliClient {
    connector: WebSocketConnector,
}

impl CliClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            connector: WebSocketConnector::new(url),
        }
    }

    pub async fn request(
        &self,
        identity: &HandshakeIdentity,
        request_event: &str,
        data: Value,
        success_event: &str,
        failure_event: &str,
        budget: Duration,
    ) -> Result<Value, CliClientError> {
        timeout(budget, self.request_inner(identity, request_event, data, success_event, failure_event))
            .await
            .map_err(|_| CliClientError::Timeout(request_event.to_string()))?
    }

    async fn request_inner(
        &self,
        identity: &HandshakeIdentity,
        request_event: &str,
        data: Value,
        success_event: &str,
        failure_event: &str,
    ) -> Result<Value, CliClientError> {
        let mut socket = self.connector.connect().await?;
        handshake::authenticate(socket.as_mut(), identity).await?;

        let envelope = Envelope::new(request_event, &identity.agent_id, &identity.channel_id, data);
        socket.send(&envelope).await?;

        loop {
            match socket.recv().await? {
                None => return Err(TransportError::connection_lost("closed before response").into()),
                Some(frame) if frame.event_type == success_event => return Ok(frame.data),
                Some(frame) if frame.event_type == failure_event => {
                    let message = frame
                        .data
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("request rejected")
                        .to_string();
                    return Err(CliClientError::Rejected(message));
                }
                Some(_) => continue,
            }
        }
    }
}
