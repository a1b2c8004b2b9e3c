use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use server::{
    config::read_config,
    monitor::{monitor_router, serve_monitor},
};
use tracing_subscriber::EnvFilter;

/// Relays TCP connections to upstream addresses.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Path to the TOML config file
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_line_number(true)
        .try_init();
    let args = Args::parse();
    let config = read_config(&args.config)?;
    anyhow::ensure!(!config.relays.is_empty(), "No relays configured");

    let mut join_set = tokio::task::JoinSet::new();
    if let Some(addr) = config.monitor_addr {
        let router = monitor_router().context("Failed to install metrics recorder")?;
        join_set.spawn(async move {
            serve_monitor(addr, router)
                .await
                .context("Monitor server failed")
        });
    }
    for relay in config.relays {
        let listen_addr = relay.listen_addr.clone();
        let server = relay
            .build()
            .await
            .with_context(|| format!("Failed to start relay on {listen_addr}"))?;
        join_set.spawn(async move { server.serve().await.context("Relay server failed") });
    }
    while let Some(res) = join_set.join_next().await {
        res??;
    }
    Ok(())
}
