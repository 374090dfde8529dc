use clap::{Parser, Subcommand};
use std::net::SocketAddr;

#[derive(Parser)]
#[command(name = "devnet")]
#[command(about = "Disposable container fixtures and Tendermint testnets for integration tests")]
#[command(version, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit JSON logs
    #[arg(long)]
    pub json: bool,

    /// Configuration file path
    #[arg(short, long, env = "DEVNET_CONFIG")]
    pub config: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Tendermint testnet commands
    Cluster {
        #[command(subcommand)]
        command: ClusterCommands,
    },

    /// Wait until an ABCI server answers an echo request
    Probe {
        /// Address of the ABCI port, e.g. 127.0.0.1:26658
        endpoint: SocketAddr,

        /// Override the configured number of attempts
        #[arg(short, long)]
        attempts: Option<u32>,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,
}

#[derive(Subcommand)]
pub enum ClusterCommands {
    /// Start a testnet
    Up {
        /// Number of nodes
        #[arg(short, long, default_value_t = 1)]
        nodes: usize,

        /// Shared ABCI endpoint
        #[arg(long)]
        abci_url: Option<String>,

        /// Candidate ABCI endpoints, picked by node count
        #[arg(long = "abci-urls", value_delimiter = ',')]
        abci_urls: Vec<String>,

        /// Number of validators (default: all nodes)
        #[arg(long)]
        validators: Option<usize>,

        /// Tendermint image
        #[arg(long)]
        image: Option<String>,

        /// Network the nodes share
        #[arg(long)]
        network: Option<String>,

        /// Run against an in-memory engine instead of a container daemon
        #[arg(long)]
        dry_run: bool,
    },

    /// Remove the containers and network of a testnet
    Down {
        /// Number of nodes
        #[arg(short, long, default_value_t = 1)]
        nodes: usize,

        /// Network the nodes share
        #[arg(long)]
        network: Option<String>,
    },
}
