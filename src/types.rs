use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Published port binding, `host:container`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortBinding {
    pub host: u16,
    pub container: u16,
}

impl PortBinding {
    pub fn new(host: u16, container: u16) -> Self {
        Self { host, container }
    }

    /// Binding that publishes the container port on the same host port.
    pub fn same(port: u16) -> Self {
        Self::new(port, port)
    }
}

impl fmt::Display for PortBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.container)
    }
}

impl FromStr for PortBinding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, container) = s
            .split_once(':')
            .ok_or_else(|| format!("port binding must be host:container, got '{}'", s))?;
        let host = host
            .parse()
            .map_err(|_| format!("invalid host port '{}'", host))?;
        let container = container
            .trim_end_matches("/tcp")
            .parse()
            .map_err(|_| format!("invalid container port '{}'", container))?;
        Ok(Self { host, container })
    }
}

/// Container state as reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerState {
    Created,
    Running,
    Paused,
    Restarting,
    Removing,
    Exited,
    Dead,
}

impl ContainerState {
    pub fn is_running(&self) -> bool {
        matches!(self, ContainerState::Running)
    }
}

impl FromStr for ContainerState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "created" => Ok(ContainerState::Created),
            "running" => Ok(ContainerState::Running),
            "paused" => Ok(ContainerState::Paused),
            "restarting" => Ok(ContainerState::Restarting),
            "removing" => Ok(ContainerState::Removing),
            "exited" => Ok(ContainerState::Exited),
            "dead" => Ok(ContainerState::Dead),
            other => Err(format!("unknown container state '{}'", other)),
        }
    }
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ContainerState::Created => "created",
            ContainerState::Running => "running",
            ContainerState::Paused => "paused",
            ContainerState::Restarting => "restarting",
            ContainerState::Removing => "removing",
            ContainerState::Exited => "exited",
            ContainerState::Dead => "dead",
        };
        f.write_str(s)
    }
}

/// Container inspection result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerDetails {
    pub id: String,
    pub name: String,
    pub image: String,
    pub state: ContainerState,
    pub ports: Vec<PortBinding>,
    /// Address on each attached network, keyed by network name
    pub networks: Vec<(String, String)>,
    pub args: Vec<String>,
}

impl ContainerDetails {
    /// Address assigned on the given network
    pub fn ip_on(&self, network: &str) -> Option<&str> {
        self.networks
            .iter()
            .find(|(name, _)| name == network)
            .map(|(_, ip)| ip.as_str())
    }
}

/// Network inspection result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkDetails {
    pub name: String,
    pub driver: String,
    /// Names of attached containers, stopped ones included
    pub containers: Vec<String>,
}

impl NetworkDetails {
    pub fn is_in_use(&self) -> bool {
        !self.containers.is_empty()
    }
}
