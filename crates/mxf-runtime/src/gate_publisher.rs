// Wires `mxf_coordinator::GatePublisher` to the wire (§4.7 step (b):
// "push the change to the server"). Allow-list updates are control-loop
// state, not chatter — always enqueued critical.

use async_trait::async_trait;
use mxf_contracts::envelope::{event_names, Envelope};
use mxf_coordinator::GatePublisher;
use mxf_transport::{Criticality, OutboundQueue};
use std::sync::Arc;

pub struct TransportGatePublisher {
    outbound: Arc<OutboundQueue>,
}

impl TransportGatePublisher {
    pub fn new(outbound: Arc<OutboundQueue>) -> Self {
        Self { outbound }
    }
}

#[async_trait]
impl GatePublisher for TransportGatePublisher {
    async fn publish_allowed_tools(&self, agent_id: &str, channel_id: &str, tools: &[String]) -> anyhow::Result<()> {
        let envelope = Envelope::new(
            event_names::AGENT_ALLOWED_TOOLS_UPDATE,
            agent_id,
            channel_id,
            serde_json::json!({ "allowedTools": tools }),
        );
        self.outbound.enqueue(envelope, Criticality::Critical).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn enqueues_an_allowed_tools_update_envelope() {
        let outbound = Arc::new(OutboundQueue::new(4));
        let publisher = TransportGatePublisher::new(outbound.clone());

        publisher
            .publish_allowed_tools("agent-1", "channel-1", &["orpar_act".to_string()])
            .await
            .unwrap();

        let frame = outbound.next().await.unwrap();
        assert_eq!(frame.envelope.event_type, event_names::AGENT_ALLOWED_TOOLS_UPDATE);
        assert_eq!(frame.envelope.data["allowedTools"][0], "orpar_act");
    }
}
