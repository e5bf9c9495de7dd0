//! Node entry point: wires `config -> ledger (loads snapshot) -> P2P
//! server -> miner/staking service`.

mod config;
mod error;
mod miner;
mod network;
mod persistence;
mod staking;

use std::sync::{Arc, Mutex};

use clap::Parser;
use ledger_core::Ledger;
use shared::KeyPair;
use tracing::{error, info, warn};

use config::{Cli, NodeConfig};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config: NodeConfig = cli.into();

    if let Some(parent) = config.snapshot_path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            error!(error = %e, "failed to create data directory");
            std::process::exit(1);
        }
    }

    let ledger = match Ledger::load_or_init(&config.snapshot_path) {
        Ok(ledger) => ledger,
        Err(e) => {
            error!(error = %e, "failed to load chain snapshot");
            std::process::exit(1);
        }
    };
    info!(blocks = ledger.chain_snapshot().len(), "ledger loaded");

    if config.miner_address.is_some() && config.initial_peers.is_empty() {
        error!("mining requires at least one configured peer");
        std::process::exit(1);
    }

    let ledger = Arc::new(Mutex::new(ledger));
    let network = network::Network::new(ledger.clone(), config.peer_log_path.clone());

    let server_network = network.clone();
    let server_port = config.p2p_port;
    tokio::spawn(async move {
        if let Err(e) = network::run_server(server_network, server_port).await {
            error!(error = %e, "p2p server exited");
        }
    });

    for peer in &config.initial_peers {
        let network = network.clone();
        let peer = peer.clone();
        tokio::spawn(network::dial_with_backoff(network, peer));
    }

    let mut miner_handle = None;
    let mut staking_handle = None;
    if let Some(address) = config.miner_address.clone() {
        info!(%address, "starting miner and staking service");
        let signer = KeyPair::generate();
        miner_handle = Some(miner::Miner::start(
            ledger.clone(),
            network.clone(),
            address.clone(),
        ));
        staking_handle = Some(staking::StakingService::start(
            ledger.clone(),
            network.clone(),
            address,
            signer,
        ));
    } else {
        warn!("no miner address configured, running network-only");
    }

    tokio::signal::ctrl_c()
        .await
        .expect("failed to listen for ctrl-c");
    info!("shutting down");
    if let Some(miner) = miner_handle {
        miner.stop();
    }
    if let Some(staking) = staking_handle {
        staking.stop();
    }
}
