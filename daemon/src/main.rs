//! certchain daemon: entry point for running a certification registry
//! node.
//!
//! Exit codes: 0 normal, 1 invalid configuration, 2 storage open
//! failure, 3 network bind failure.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use certchain_node::{CertNode, Config, NodeError};

#[derive(Parser)]
#[command(name = "certchain-node", about = "Decentralized certification registry node")]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(long, default_value = "config/config.yaml", env = "CERTCHAIN_CONFIG")]
    config: PathBuf,

    /// Override the HTTP listen port.
    #[arg(long, env = "CERTCHAIN_PORT")]
    port: Option<u16>,

    /// Override the data directory.
    #[arg(long, env = "CERTCHAIN_DATA_DIR")]
    data: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(long)]
    debug: bool,
}

fn load_config(cli: &Cli) -> Result<Config, NodeError> {
    let mut config = Config::load(&cli.config)?;
    if let Some(port) = cli.port {
        config.network.port = port;
    }
    if let Some(ref data) = cli.data {
        config.storage.data_dir = data.clone();
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    certchain_utils::init_tracing(cli.debug);
    tracing::info!("starting certchain node");

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "failed to load configuration");
            return ExitCode::from(e.exit_code() as u8);
        }
    };
    tracing::info!(
        config = %cli.config.display(),
        data_dir = %config.storage.data_dir.display(),
        network_id = %config.network.network_id,
        "configuration loaded"
    );

    let node = match CertNode::new(config) {
        Ok(node) => node,
        Err(e) => {
            tracing::error!(error = %e, "failed to initialize node");
            return ExitCode::from(e.exit_code() as u8);
        }
    };

    if let Err(e) = node.run().await {
        tracing::error!(error = %e, "node exited with an error");
        return ExitCode::from(e.exit_code() as u8);
    }

    tracing::info!("node shutdown complete");
    ExitCode::SUCCESS
}
