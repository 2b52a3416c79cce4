//! saged - the sage service supervisor daemon.
//!
//! Loads the service configuration, binds the control socket and serves
//! sagectl requests until a shutdown signal arrives.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use sage::config::Config;
use sage::{constants, daemon, logging};

#[derive(Parser, Debug)]
#[command(name = "saged", version, about = "Service supervisor daemon")]
struct Cli {
    /// Path to the services configuration file.
    ///
    /// Defaults to $SAGE_CONFIG, then ./config.json.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for per-service stdout/stderr logs.
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_daemon_logging(&constants::daemon_log_path())?;

    let config_path = cli.config.unwrap_or_else(Config::default_path);
    let config = Config::load(&config_path)?;
    log::info!(
        "saged starting: {} configured services, socket {}",
        config.services.len(),
        constants::SOCKET_PATH
    );

    let log_dir = cli.log_dir.unwrap_or_else(constants::service_log_dir);
    daemon::run(config, PathBuf::from(constants::SOCKET_PATH), log_dir).await
}
