use super::ContainerEngine;
use crate::Result;
use crate::error::EngineError;
use crate::registry::RegistryCredential;
use crate::resources::ContainerSpec;
use crate::types::{ContainerDetails, ContainerState, NetworkDetails};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use tracing::debug;

/// Mutating engine call, recorded in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    CreateNetwork { name: String, driver: String },
    RemoveNetwork { name: String },
    PullImage { image: String, authenticated: bool },
    CreateContainer { name: String, ports: Vec<String> },
    StartContainer { name: String },
    StopContainer { name: String },
    RemoveContainer { name: String },
}

#[derive(Debug)]
struct ContainerRecord {
    spec: ContainerSpec,
    state: ContainerState,
    ip: String,
}

#[derive(Debug, Default)]
struct EngineState {
    networks: HashMap<String, String>,
    images: HashSet<String>,
    containers: HashMap<String, ContainerRecord>,
    /// Host ports held by processes outside the engine
    occupied: HashSet<u16>,
    failing_starts: HashMap<String, String>,
    next_host: u8,
    calls: Vec<EngineCall>,
}

/// Engine modelled in-process.
///
/// Host ports are a single shared space: starting a container whose published
/// port is held by another running container (or marked occupied) fails with
/// `EngineError::PortAllocated`, the same way a real daemon does.
#[derive(Debug, Default)]
pub struct InMemoryEngine {
    state: RwLock<EngineState>,
}

impl InMemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend something outside the engine is listening on `port`.
    pub async fn occupy_host_port(&self, port: u16) {
        self.state.write().await.occupied.insert(port);
    }

    /// Make the next start of the container called `name` fail.
    pub async fn fail_next_start(&self, name: impl Into<String>, reason: impl Into<String>) {
        self.state
            .write()
            .await
            .failing_starts
            .insert(name.into(), reason.into());
    }

    pub async fn calls(&self) -> Vec<EngineCall> {
        self.state.read().await.calls.clone()
    }

    /// Host ports bound by running containers
    pub async fn bound_host_ports(&self) -> Vec<u16> {
        let state = self.state.read().await;
        let mut ports: Vec<u16> = state
            .containers
            .values()
            .filter(|record| record.state.is_running())
            .flat_map(|record| record.spec.ports.iter().map(|binding| binding.host))
            .collect();
        ports.sort_unstable();
        ports
    }

    pub async fn container_count(&self) -> usize {
        self.state.read().await.containers.len()
    }
}

fn not_found(id: &str) -> crate::FixtureError {
    EngineError::ContainerNotFound {
        name: id.to_string(),
    }
    .into()
}

#[async_trait]
impl ContainerEngine for InMemoryEngine {
    async fn network_exists(&self, name: &str) -> Result<bool> {
        Ok(self.state.read().await.networks.contains_key(name))
    }

    async fn create_network(&self, name: &str, driver: &str) -> Result<()> {
        let mut state = self.state.write().await;
        if state.networks.contains_key(name) {
            return Err(EngineError::CommandFailed {
                command: format!("network create --driver {} {}", driver, name),
                stderr: format!("network with name {} already exists", name),
            }
            .into());
        }
        state.networks.insert(name.to_string(), driver.to_string());
        state.calls.push(EngineCall::CreateNetwork {
            name: name.to_string(),
            driver: driver.to_string(),
        });
        Ok(())
    }

    async fn remove_network(&self, name: &str) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.networks.contains_key(name) {
            return Err(EngineError::NetworkNotFound {
                name: name.to_string(),
            }
            .into());
        }
        // Like docker, only running containers hold an endpoint.
        if state
            .containers
            .values()
            .any(|r| r.spec.network == name && r.state.is_running())
        {
            return Err(EngineError::CommandFailed {
                command: format!("network rm {}", name),
                stderr: format!("error while removing network: network {} has active endpoints", name),
            }
            .into());
        }

        state.networks.remove(name);
        state.calls.push(EngineCall::RemoveNetwork {
            name: name.to_string(),
        });
        Ok(())
    }

    async fn inspect_network(&self, name: &str) -> Result<NetworkDetails> {
        let state = self.state.read().await;
        let driver = state
            .networks
            .get(name)
            .ok_or_else(|| EngineError::NetworkNotFound {
                name: name.to_string(),
            })?;

        let mut containers: Vec<String> = state
            .containers
            .values()
            .filter(|r| r.spec.network == name)
            .map(|r| r.spec.name.clone())
            .collect();
        containers.sort();

        Ok(NetworkDetails {
            name: name.to_string(),
            driver: driver.clone(),
            containers,
        })
    }

    async fn image_exists(&self, image: &str) -> Result<bool> {
        Ok(self.state.read().await.images.contains(image))
    }

    async fn pull_image(&self, image: &str, credential: Option<RegistryCredential>) -> Result<()> {
        let mut state = self.state.write().await;
        state.images.insert(image.to_string());
        state.calls.push(EngineCall::PullImage {
            image: image.to_string(),
            authenticated: credential.is_some(),
        });
        Ok(())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String> {
        let mut state = self.state.write().await;
        if !state.networks.contains_key(&spec.network) {
            return Err(EngineError::NetworkNotFound {
                name: spec.network.clone(),
            }
            .into());
        }
        if !state.images.contains(&spec.image) {
            return Err(EngineError::ImageNotFound {
                image: spec.image.clone(),
            }
            .into());
        }
        if state.containers.values().any(|r| r.spec.name == spec.name) {
            return Err(EngineError::CommandFailed {
                command: format!("create --name {}", spec.name),
                stderr: format!("Conflict. The container name \"/{}\" is already in use", spec.name),
            }
            .into());
        }

        state.next_host = state.next_host.wrapping_add(1).max(2);
        let ip = format!("172.28.0.{}", state.next_host);
        let id = uuid::Uuid::new_v4().simple().to_string();

        debug!("in-memory create {} -> {}", spec.name, id);
        state.calls.push(EngineCall::CreateContainer {
            name: spec.name.clone(),
            ports: spec.ports.iter().map(ToString::to_string).collect(),
        });
        state.containers.insert(
            id.clone(),
            ContainerRecord {
                spec: spec.clone(),
                state: ContainerState::Created,
                ip,
            },
        );
        Ok(id)
    }

    async fn start_container(&self, id: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let record = state.containers.get(id).ok_or_else(|| not_found(id))?;
        if record.state.is_running() {
            return Ok(());
        }

        let name = record.spec.name.clone();
        let wanted: Vec<u16> = record.spec.ports.iter().map(|b| b.host).collect();
        state.calls.push(EngineCall::StartContainer { name: name.clone() });

        if let Some(reason) = state.failing_starts.remove(&name) {
            return Err(EngineError::CommandFailed {
                command: format!("start {}", name),
                stderr: reason,
            }
            .into());
        }

        for port in wanted {
            let taken_by_sibling = state.containers.iter().any(|(other, record)| {
                other != id
                    && record.state.is_running()
                    && record.spec.ports.iter().any(|b| b.host == port)
            });
            if taken_by_sibling || state.occupied.contains(&port) {
                return Err(EngineError::PortAllocated { port }.into());
            }
        }

        if let Some(record) = state.containers.get_mut(id) {
            record.state = ContainerState::Running;
        }
        Ok(())
    }

    async fn stop_container(&self, id: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let record = state.containers.get_mut(id).ok_or_else(|| not_found(id))?;
        record.state = ContainerState::Exited;
        let name = record.spec.name.clone();
        state.calls.push(EngineCall::StopContainer { name });
        Ok(())
    }

    async fn remove_container(&self, id: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let record = state.containers.remove(id).ok_or_else(|| not_found(id))?;
        state.calls.push(EngineCall::RemoveContainer {
            name: record.spec.name,
        });
        Ok(())
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerDetails> {
        let state = self.state.read().await;
        let record = state.containers.get(id).ok_or_else(|| not_found(id))?;
        let ip = if record.state.is_running() {
            record.ip.clone()
        } else {
            String::new()
        };

        Ok(ContainerDetails {
            id: id.to_string(),
            name: record.spec.name.clone(),
            image: record.spec.image.clone(),
            state: record.state,
            ports: record.spec.ports.clone(),
            networks: vec![(record.spec.network.clone(), ip)],
            args: record.spec.args.clone(),
        })
    }
}
