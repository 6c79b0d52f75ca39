// MXF CLI — the three in-scope verbs of §6 "CLI surface":
// `channel:create`, `key:generate`, `setup:interactive`.
//
// Design Decision: clap derive, mirroring everruns-cli's shape.
// Design Decision: one-shot websocket request/response (`client::CliClient`)
// rather than a REST client — the exchange server's wire protocol is
// the only interface this core exposes (§6).

mod client;
mod commands;

use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use mxf_transport::HandshakeIdentity;

use client::CliClient;

#[derive(Parser)]
#[command(name = "mxf")]
#[command(about = "MXF CLI - provision channels and issue agent credentials")]
#[command(version)]
struct Cli {
    /// Exchange server websocket URL
    #[arg(long, env = "MXF_SERVER_URL", default_value = "wss://localhost:8080")]
    server_url: String,

    /// Domain key presented during the auth handshake
    #[arg(long, env = "MXF_DOMAIN_KEY")]
    domain_key: String,

    /// User credentials presented during the auth handshake
    #[arg(long, env = "MXF_CREDENTIALS")]
    credentials: String,

    /// Request budget in seconds before the verb exits with code 3
    #[arg(long, default_value = "30")]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision a new channel
    #[command(name = "channel:create")]
    ChannelCreate {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },

    /// Issue an agent's credential within a channel
    #[command(name = "key:generate")]
    KeyGenerate {
        #[arg(long)]
        channel_id: String,
        #[arg(long)]
        agent_id: String,
    },

    /// Walk through channel creation and key issuance interactively
    #[command(name = "setup:interactive")]
    SetupInteractive,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    let client = CliClient::new(&cli.server_url);
    let budget = Duration::from_secs(cli.timeout);
    // Provisioning verbs run before any specific agent is registered;
    // `agent_id`/`channel_id` on the identity only label the auth
    // frame and are otherwise unused until `register`.
    let identity = HandshakeIdentity {
        agent_id: "mxf-cli".to_string(),
        channel_id: "-".to_string(),
        domain_key: cli.domain_key,
        credentials: cli.credentials,
    };

    let result = match cli.command {
        Commands::ChannelCreate { name, description } => {
            commands::channel::create(&client, &identity, &name, description.as_deref(), budget)
                .await
                .map(|channel_id| println!("channel created: {channel_id}"))
        }
        Commands::KeyGenerate { channel_id, agent_id } => {
            commands::key::generate(&client, &identity, &channel_id, &agent_id, budget)
                .await
                .map(|credential| print!("{credential}"))
        }
        Commands::SetupInteractive => commands::setup::run(&client, &identity, budget).await,
    };

    match result {
        Ok(()) => ExitCode::from(mxf_contracts::cli::CliExitCode::Success.code() as u8),
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(e.exit_code().code() as u8)
        }
    }
}
