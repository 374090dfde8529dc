use crate::registry::RegistryOptions;
use crate::resources::{ContainerSpec, Network};
use crate::service::ServiceOptions;
use crate::types::PortBinding;
use serde::{Deserialize, Serialize};

pub const DEFAULT_ABCI_PORT: u16 = 26658;

/// Drive ABCI application server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveAbciOptions {
    pub image: String,
    pub network: Network,
    pub container_name: String,
    pub abci_port: u16,
    /// Host port to publish on; defaults to `abci_port`
    pub host_port: Option<u16>,
    pub env: Vec<(String, String)>,
    pub registry: RegistryOptions,
}

impl Default for DriveAbciOptions {
    fn default() -> Self {
        Self {
            image: "dashpay/drive:latest".to_string(),
            network: Network::new("devnet_platform", "bridge"),
            container_name: "drive_abci".to_string(),
            abci_port: DEFAULT_ABCI_PORT,
            host_port: None,
            env: Vec::new(),
            registry: RegistryOptions::default(),
        }
    }
}

impl DriveAbciOptions {
    /// URL Tendermint nodes on the same network use to reach this server
    pub fn abci_url(&self) -> String {
        format!("tcp://{}:{}", self.container_name, self.abci_port)
    }
}

impl ServiceOptions for DriveAbciOptions {
    fn network(&self) -> Network {
        self.network.clone()
    }

    fn container_spec(&self) -> ContainerSpec {
        let host = self.host_port.unwrap_or(self.abci_port);
        let mut spec = ContainerSpec::new(&self.container_name, &self.network.name, &self.image)
            .with_ports(vec![PortBinding::new(host, self.abci_port)])
            .with_args(["npm", "run", "abci"])
            .with_env("ABCI_HOST", "0.0.0.0")
            .with_env("ABCI_PORT", self.abci_port.to_string());
        for (key, value) in &self.env {
            spec = spec.with_env(key, value);
        }
        spec
    }

    fn registry(&self) -> RegistryOptions {
        self.registry.clone()
    }

    fn abci_port(&self) -> Option<u16> {
        Some(self.abci_port)
    }
}
