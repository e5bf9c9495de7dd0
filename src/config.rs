//! Process-wide node configuration: CLI flags (with environment
//! fallback) plus the fixed snapshot/peer-log filenames derived from
//! `--data-dir`.

use clap::Parser;
use std::path::PathBuf;

/// A hybrid PoW/PoS UTXO node speaking a WebSocket gossip protocol.
#[derive(Parser, Debug, Clone)]
#[command(name = "hybrid-node", version, about)]
pub struct Cli {
    /// Port the P2P WebSocket server listens on.
    #[arg(long, env = "P2P_PORT", default_value_t = 5001)]
    pub p2p_port: u16,

    /// Comma-separated list of peer addresses to dial at startup.
    #[arg(long, value_delimiter = ',')]
    pub peers: Vec<String>,

    /// Directory holding the chain snapshot and peer log.
    #[arg(long, default_value = "./data")]
    pub data_dir: PathBuf,

    /// Address to mine/stake to. If unset, the node runs network-only.
    #[arg(long)]
    pub miner_address: Option<String>,
}

/// Resolved configuration derived from `Cli`.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub p2p_port: u16,
    pub initial_peers: Vec<String>,
    pub snapshot_path: PathBuf,
    pub peer_log_path: PathBuf,
    pub miner_address: Option<String>,
}

impl From<Cli> for NodeConfig {
    fn from(cli: Cli) -> Self {
        Self {
            p2p_port: cli.p2p_port,
            initial_peers: cli.peers,
            snapshot_path: cli.data_dir.join("chain.json"),
            peer_log_path: cli.data_dir.join("peers.json"),
            miner_address: cli.miner_address,
        }
    }
}
