// `mxf channel:create` (§6 "CLI surface").

use std::time::Duration;

use mxf_contracts::envelope::event_names;
use mxf_transport::HandshakeIdentity;
use serde_json::json;

use crate::client::{CliClient, CliClientError};

pub async fn create(
    client: &CliClient,
    identity: &HandshakeIdentity,
    name: &str,
    description: Option<&str>,
    budget: Duration,
) -> Result<String, CliClientError> {
    let data = client
        .request(
            identity,
            event_names::CHANNEL_CREATE,
            json!({ "name": name, "description": description }),
            event_names::CHANNEL_CREATED,
            event_names::CHANNEL_CREATION_FAILED,
            budget,
        )
        .await?;

    Ok(data
        .get("channelId")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string())
}
