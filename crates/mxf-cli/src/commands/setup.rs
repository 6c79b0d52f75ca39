// `mxf setup:interactive` (§6 "CLI surface") — walks an operator
// through provisioning a channel and issuing an agent's first
// credential in one sitting, the two verbs `channel:create` and
// `key:generate` chained with prompts in between.

use std::io::{self, Write};
use std::time::Duration;

use mxf_transport::HandshakeIdentity;

use crate::client::{CliClient, CliClientError};
use crate::commands::{channel, key};

fn prompt(label: &str) -> io::Result<String> {
    print!("{label}: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

pub async fn run(client: &CliClient, identity: &HandshakeIdentity, budget: Duration) -> Result<(), CliClientError> {
    println!("MXF interactive setup");
    println!("======================");

    let name = prompt("Channel name").unwrap_or_default();
    let description = prompt("Channel description (optional)").unwrap_or_default();
    let description = if description.is_empty() { None } else { Some(description.as_str()) };

    let channel_id = channel::create(client, identity, &name, description, budget).await?;
    println!("created channel {channel_id}");

    let agent_id = prompt("Agent id to issue a key for").unwrap_or_default();
    let credential = key::generate(client, identity, &channel_id, &agent_id, budget).await?;

    println!();
    println!("credential issued; export these before starting the agent:");
    print!("{credential}");

    Ok(())
}
