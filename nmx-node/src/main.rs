// src/main.rs

//! NMX node binary entry point.
//!
//! Usage: `nmx-node [config.json]`. Without an argument the default
//! configuration is used.

use anyhow::Context;
use nmx_node::errors::EXIT_FAILURE;
use nmx_node::{NmxNode, NodeConfig, NodeError};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("node stopped: {:#}", err);
            let code = err
                .downcast_ref::<NodeError>()
                .map(NodeError::exit_code)
                .unwrap_or(EXIT_FAILURE);
            ExitCode::from(code)
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => {
            let path = PathBuf::from(path);
            NodeConfig::from_file(&path).with_context(|| format!("loading config {}", path.display()))?
        }
        None => NodeConfig::default(),
    };

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("🚀 NMX Node");
    tracing::info!("Version: {}", nmx_node::NODE_VERSION);

    let node = NmxNode::new(config).await?;
    node.run().await?;
    Ok(())
}
