// `mxf key:generate` (§6 "CLI surface").
//
// Prints the issued credential as environment assignments
// (`MXF_<CHANNEL>_<AGENT>_{KEY_ID,SECRET_KEY}=...`) so callers can
// `source` or `eval` the CLI's stdout directly.

use std::time::Duration;

use mxf_contracts::cli::credential_env_names;
use mxf_contracts::envelope::event_names;
use mxf_transport::HandshakeIdentity;
use serde_json::json;

use crate::client::{CliClient, CliClientError};

pub struct IssuedCredential {
    pub key_id_var: String,
    pub key_id: String,
    pub secret_key_var: String,
    pub secret_key: String,
}

pub async fn generate(
    client: &CliClient,
    identity: &HandshakeIdentity,
    channel_id: &str,
    agent_id: &str,
    budget: Duration,
) -> Result<IssuedCredential, CliClientError> {
    let data = client
        .request(
            identity,
            event_names::KEY_GENERATE,
            json!({ "channelId": channel_id, "agentId": agent_id }),
            event_names::KEY_GENERATED,
            event_names::KEY_GENERATION_FAILED,
            budget,
        )
        .await?;

    let (key_id_var, secret_key_var) = credential_env_names(channel_id, agent_id);
    Ok(IssuedCredential {
        key_id_var,
        key_id: data.get("keyId").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
        secret_key_var,
        secret_key: data
            .get("secretKey")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
    })
}

impl std::fmt::Display for IssuedCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}={}", self.key_id_var, self.key_id)?;
        writeln!(f, "{}={}", self.secret_key_var, self.secret_key)
    }
}
