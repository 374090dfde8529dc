use crate::cluster::NodeDescriptor;
use crate::registry::RegistryOptions;
use crate::resources::{ContainerSpec, Network};
use crate::service::ServiceOptions;
use crate::types::PortBinding;
use serde::{Deserialize, Serialize};

/// Where a multi-node testnet keeps per-node home directories
pub const TESTNET_OUTPUT_DIR: &str = "/tendermint/mytestnet";

/// Options shared by every node of a Tendermint testnet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TendermintNodeOptions {
    pub image: String,
    pub network: Network,
    pub rpc_port: u16,
    pub p2p_port: u16,
    /// Home directory for single-node setups
    pub home_dir: String,
    pub registry: RegistryOptions,
}

impl Default for TendermintNodeOptions {
    fn default() -> Self {
        Self {
            image: "tendermint/tendermint:v0.32.1".to_string(),
            network: Network::new("devnet_platform", "bridge"),
            rpc_port: 26657,
            p2p_port: 26656,
            home_dir: "/tendermint".to_string(),
            registry: RegistryOptions::default(),
        }
    }
}

impl TendermintNodeOptions {
    pub fn for_node(&self, node: &NodeDescriptor) -> TendermintNode {
        TendermintNode {
            options: self.clone(),
            node: node.clone(),
        }
    }
}

/// Base options specialised for one derived node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TendermintNode {
    pub options: TendermintNodeOptions,
    pub node: NodeDescriptor,
}

impl TendermintNode {
    pub fn home_dir(&self) -> &str {
        self.node
            .home_dir
            .as_deref()
            .unwrap_or(&self.options.home_dir)
    }
}

impl ServiceOptions for TendermintNode {
    fn network(&self) -> Network {
        self.options.network.clone()
    }

    fn container_spec(&self) -> ContainerSpec {
        let rpc = self.options.rpc_port;
        let host = self.node.port.unwrap_or(rpc);

        let mut spec = ContainerSpec::new(
            &self.node.container_name,
            &self.options.network.name,
            &self.options.image,
        )
        .with_ports(vec![PortBinding::new(host, rpc)])
        .with_args([
            "node".to_string(),
            "--home".to_string(),
            self.home_dir().to_string(),
            "--moniker".to_string(),
            self.node.host.clone(),
            format!("--proxy_app={}", self.node.abci_url),
            format!("--rpc.laddr=tcp://0.0.0.0:{}", rpc),
            format!("--p2p.laddr=tcp://0.0.0.0:{}", self.options.p2p_port),
        ]);

        if let Some(topology) = &self.node.topology {
            spec = spec
                .with_env("PREPARE_TESTNET", "true")
                .with_env("TESTNET_OUTPUT_DIR", TESTNET_OUTPUT_DIR)
                .with_env("TESTNET_NUMBER_OF_NODES", topology.nodes.to_string())
                .with_env("TESTNET_NUMBER_OF_VALIDATORS", topology.validators.to_string());
        }
        spec
    }

    fn registry(&self) -> RegistryOptions {
        self.options.registry.clone()
    }
}
