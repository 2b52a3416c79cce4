//! sagectl - control client for the saged service supervisor.
//!
//! Each invocation opens one connection to the daemon socket, performs a
//! single request/response exchange and renders the result. A failure
//! envelope prints its message to stderr and exits nonzero.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use env_logger::Env;

use sage::envelope::{ListEntry, Response};
use sage::spmp::packet::{command, encoding, Packet, V1};
use sage::spmp::SpmpClient;
use sage::{constants, table};

#[derive(Parser, Debug)]
#[command(name = "sagectl", version, about = "Control client for saged")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List every configured service
    List,
    /// Show status for one service
    Status { service: String },
    /// Start a configured service
    Start { service: String },
    /// Stop a running service
    Stop { service: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let (cmd, payload) = match &cli.command {
        Commands::List => (command::LIST, Vec::new()),
        Commands::Status { service } => (command::STATUS, service.clone().into_bytes()),
        Commands::Start { service } => (command::START, service.clone().into_bytes()),
        Commands::Stop { service } => (command::STOP, service.clone().into_bytes()),
    };

    let request = Packet::new(V1, encoding::TEXT, cmd, payload)?;
    let client = SpmpClient::new(constants::SOCKET_PATH);
    let reply = client.roundtrip(&request).await?;

    match cli.command {
        Commands::List | Commands::Status { .. } => {
            let resp: Response<Vec<ListEntry>> = serde_json::from_slice(&reply.payload)
                .context("parsing daemon response")?;
            if !resp.is_ok() {
                eprintln!("{}", resp.msg);
                std::process::exit(1);
            }
            println!("{}", table::render(&resp.data));
        }
        Commands::Start { .. } | Commands::Stop { .. } => {
            let resp: Response<String> =
                serde_json::from_slice(&reply.payload).context("parsing daemon response")?;
            if !resp.is_ok() {
                eprintln!("{}", resp.msg);
                std::process::exit(1);
            }
            println!("{}", resp.msg);
        }
    }
    Ok(())
}
