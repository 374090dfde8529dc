mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, ClusterCommands, Commands, ConfigCommands};
use devnet_fixtures::api::{AbciEchoProbe, Network, TokenEndpointAuthorization, wait_until_ready};
use devnet_fixtures::logging::init_tracing;
use devnet_fixtures::{
    ClusterOptions, ClusterOrchestrator, ContainerEngine, DockerCli, FixtureConfig,
    InMemoryEngine,
};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => FixtureConfig::load_from(path)?,
        None => FixtureConfig::load()?,
    };
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    if cli.json {
        config.logging.json = true;
    }
    init_tracing(&config.logging)?;

    info!("🚀 devnet starting up...");

    match cli.command {
        Commands::Cluster { command } => match command {
            ClusterCommands::Up {
                nodes,
                abci_url,
                abci_urls,
                validators,
                image,
                network,
                dry_run,
            } => {
                let engine: Arc<dyn ContainerEngine> = if dry_run {
                    info!("Dry run: using in-memory engine");
                    Arc::new(InMemoryEngine::new())
                } else {
                    docker_engine(&config).await?
                };

                let mut options = ClusterOptions {
                    abci_url,
                    abci_urls,
                    testnet_number_of_validators: validators,
                    ..Default::default()
                };
                options.node.network.driver = config.engine.network_driver.clone();
                if let Some(image) = image {
                    options.node.image = image;
                }
                if let Some(network) = network {
                    options.node.network.name = network;
                }

                let mut orchestrator = ClusterOrchestrator::new(
                    engine,
                    Arc::new(TokenEndpointAuthorization::new()),
                    config.clone(),
                );
                let started = orchestrator.start_cluster(nodes, &options).await.map(|_| ());
                if let Err(e) = started {
                    warn!(
                        "Testnet failed after {} node(s) started: {}",
                        orchestrator.nodes().len(),
                        e
                    );
                    return Err(e.into());
                }

                println!("{:<20} {:<16} {:<10}", "NAME", "IP", "RPC PORT");
                println!("{}", "─".repeat(48));
                for node in orchestrator.nodes() {
                    let rpc = node
                        .get_port(options.node.rpc_port)
                        .map(|p| p.to_string())
                        .unwrap_or_default();
                    println!(
                        "{:<20} {:<16} {:<10}",
                        node.name(),
                        node.get_ip().unwrap_or("-"),
                        rpc
                    );
                }
                info!("✅ Testnet of {} node(s) is up", nodes);
            }

            ClusterCommands::Down { nodes, network } => {
                let engine = docker_engine(&config).await?;

                for index in 0..nodes {
                    let name = format!("node{}", index);
                    match engine.remove_container(&name).await {
                        Ok(()) => info!("🗑️  Removed {}", name),
                        Err(e) if e.is_not_found() => info!("{} is already gone", name),
                        Err(e) => return Err(e.into()),
                    }
                }

                let mut shared = ClusterOptions::default().node.network;
                shared.driver = config.engine.network_driver.clone();
                if let Some(network) = network {
                    shared.name = network;
                }
                remove_network(engine.as_ref(), &shared).await;
            }
        },

        Commands::Probe { endpoint, attempts } => {
            let mut policy = config.readiness.policy();
            if let Some(attempts) = attempts {
                policy.attempts = attempts;
            }
            info!("Probing ABCI server at {}", endpoint);
            wait_until_ready(&AbciEchoProbe, endpoint, policy).await?;
            println!("{} is ready", endpoint);
        }

        Commands::Config { command } => match command {
            ConfigCommands::Show => {
                let rendered =
                    toml::to_string_pretty(&config).context("Failed to render configuration")?;
                println!("# {}", FixtureConfig::default_path().display());
                print!("{}", rendered);
            }
        },
    }

    Ok(())
}

async fn docker_engine(config: &FixtureConfig) -> Result<Arc<dyn ContainerEngine>> {
    let docker = DockerCli::new(&config.engine.binary);
    let version = docker.ping().await?;
    info!("🐳 Using {} {}", docker.binary(), version);
    Ok(Arc::new(docker))
}

async fn remove_network(engine: &dyn ContainerEngine, network: &Network) {
    if let Err(e) = network.remove(engine).await {
        warn!("Could not remove network {}: {}", network.name, e);
    }
}
