// Two-stage handshake (§4.2): auth, then register. Run once on first
// connect and again (minus the `channel_ids` growing in between) after
// every reconnect.

use std::time::Duration;

use mxf_contracts::envelope::{event_names, Envelope};
use serde_json::json;
use tokio::time::timeout;

use crate::error::{Result, TransportError};
use crate::socket::WireSocket;

/// §4.2: "a 10-second absence of either is an InitTimeout."
const REGISTRATION_BUDGET: Duration = Duration::from_secs(10);

pub struct HandshakeIdentity {
    pub agent_id: String,
    pub channel_id: String,
    pub domain_key: String,
    pub credentials: String,
}

/// Present `(domainKey, userCredentials)` and await `auth:success`.
/// Any other frame before success, or `auth:failed`, is an `AuthError`
/// — unrecoverable for the session (`TransportError::is_fatal`).
pub async fn authenticate(socket: &mut dyn WireSocket, identity: &HandshakeIdentity) -> Result<()> {
    socket
        .send(&Envelope::new(
            "auth:request",
            &identity.agent_id,
            &identity.channel_id,
            json!({
                "domainKey": identity.domain_key,
                "userCredentials": identity.credentials,
            }),
        ))
        .await?;

    loop {
        match socket.recv().await? {
            None => return Err(TransportError::connection_lost("closed during auth")),
            Some(frame) if frame.event_type == event_names::AGENT_AUTH_SUCCESS => return Ok(()),
            Some(frame) if frame.event_type == event_names::AGENT_AUTH_FAILED => {
                return Err(TransportError::auth("domain key or credentials rejected"))
            }
            Some(_) => continue,
        }
    }
}

/// Send `register` and await both `registered` and `connected` within
/// the 10 s registration budget.
pub async fn register(
    socket: &mut dyn WireSocket,
    identity: &HandshakeIdentity,
    channel_ids: &[String],
) -> Result<()> {
    socket
        .send(&Envelope::new(
            event_names::AGENT_REGISTER,
            &identity.agent_id,
            &identity.channel_id,
            json!({ "channelIds": channel_ids }),
        ))
        .await?;

    timeout(REGISTRATION_BUDGET, await_registered_and_connected(socket))
        .await
        .map_err(|_| TransportError::InitTimeout(REGISTRATION_BUDGET))?
}

async fn await_registered_and_connected(socket: &mut dyn WireSocket) -> Result<()> {
    let (mut registered, mut connected) = (false, false);
    while !(registered && connected) {
        match socket.recv().await? {
            None => return Err(TransportError::connection_lost("closed during registration")),
            Some(frame) if frame.event_type == event_names::AGENT_REGISTERED => registered = true,
            Some(frame) if frame.event_type == event_names::AGENT_CONNECTED => connected = true,
            Some(frame) if frame.event_type == event_names::AGENT_REGISTRATION_FAILED => {
                return Err(TransportError::auth("registration rejected by server"))
            }
            Some(_) => continue,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::ScriptedSocket;

    fn identity() -> HandshakeIdentity {
        HandshakeIdentity {
            agent_id: "agent-1".into(),
            channel_id: "channel-1".into(),
            domain_key: "domain".into(),
            credentials: "secret".into(),
        }
    }

    #[tokio::test]
    async fn authenticate_succeeds_on_auth_success() {
        let mut socket = ScriptedSocket::new(vec![Envelope::new(
            event_names::AGENT_AUTH_SUCCESS,
            "agent-1",
            "channel-1",
            json!({}),
        )]);
        authenticate(&mut socket, &identity()).await.unwrap();
    }

    #[tokio::test]
    async fn authenticate_fails_on_auth_failed() {
        let mut socket = ScriptedSocket::new(vec![Envelope::new(
            event_names::AGENT_AUTH_FAILED,
            "agent-1",
            "channel-1",
            json!({}),
        )]);
        let err = authenticate(&mut socket, &identity()).await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn register_succeeds_once_both_frames_arrive() {
        let mut socket = ScriptedSocket::new(vec![
            Envelope::new(event_names::AGENT_REGISTERED, "agent-1", "channel-1", json!({})),
            Envelope::new(event_names::AGENT_CONNECTED, "agent-1", "channel-1", json!({})),
        ]);
        register(&mut socket, &identity(), &["channel-1".to_string()])
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn register_times_out_without_connected() {
        // Only `registered` arrives; `recv` then hangs (simulating
        // silence), so the 10 s budget must fire under the paused,
        // auto-advancing clock.
        let mut socket = ScriptedSocket::new(vec![Envelope::new(
            event_names::AGENT_REGISTERED,
            "agent-1",
            "channel-1",
            json!({}),
        )]);
        let err = register(&mut socket, &identity(), &["channel-1".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::InitTimeout(_)));
    }
}
