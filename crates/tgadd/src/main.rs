use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use tgadd_bridge::{BridgeClient, BridgeConfig};
use tgadd_core::config::Config;

mod cli;
mod commands;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tgadd_core::logging::init("tgadd")?;

    let cli = cli::Cli::parse();
    let cfg = Config::load().context("loading configuration")?;

    let bridge = Arc::new(BridgeClient::new(BridgeConfig::from(&cfg)));
    let outcome = commands::run(cli, &cfg, bridge.clone()).await;
    bridge.shutdown().await;

    outcome
}
