//! Multi-node Tendermint testnet bring-up.
//!
//! Per-node configuration is derived up front from the node count, then
//! nodes are started one after another on a shared network.

use crate::Result;
use crate::config::FixtureConfig;
use crate::engine::ContainerEngine;
use crate::error::ClusterError;
use crate::presets::{TESTNET_OUTPUT_DIR, TendermintNodeOptions};
use crate::registry::AuthorizationProvider;
use crate::service::{PortAllocator, ServiceInstance};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Per-node override supplied by the caller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeOverride {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterOptions {
    /// Shared ABCI endpoint; wins over `abci_urls` when set
    pub abci_url: Option<String>,
    /// Candidate endpoints, picked by `count - 1`
    pub abci_urls: Vec<String>,
    pub nodes: Vec<NodeOverride>,
    pub testnet_number_of_validators: Option<usize>,
    pub node: TendermintNodeOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestnetTopology {
    pub nodes: usize,
    pub validators: usize,
}

/// Fully derived configuration of one cluster member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDescriptor {
    pub index: usize,
    pub container_name: String,
    pub host: String,
    pub port: Option<u16>,
    pub home_dir: Option<String>,
    pub abci_url: String,
    /// Only set for clusters of more than one node
    pub topology: Option<TestnetTopology>,
}

/// Derive the configuration of every node. Performs no I/O.
pub fn derive_nodes(count: usize, options: &ClusterOptions) -> Result<Vec<NodeDescriptor>> {
    if count < 1 {
        return Err(ClusterError::InvalidInstanceCount { count }.into());
    }

    let abci_url = options
        .abci_url
        .clone()
        .or_else(|| options.abci_urls.get(count - 1).cloned())
        .ok_or(ClusterError::MissingAbciEndpoint { count })?;

    let topology = (count > 1).then(|| TestnetTopology {
        nodes: count,
        validators: options.testnet_number_of_validators.unwrap_or(count),
    });

    let nodes = (0..count)
        .map(|index| {
            let overrides = options.nodes.get(index).cloned().unwrap_or_default();
            let container_name = overrides.host.unwrap_or_else(|| format!("node{}", index));
            let home_dir =
                topology.map(|_| format!("{}/{}", TESTNET_OUTPUT_DIR, container_name));

            NodeDescriptor {
                index,
                host: container_name.clone(),
                container_name,
                port: overrides.port,
                home_dir,
                abci_url: abci_url.clone(),
                topology,
            }
        })
        .collect();

    Ok(nodes)
}

/// Starts testnet nodes and keeps every handle it managed to start, so a
/// partial failure can still be cleaned up by the caller.
pub struct ClusterOrchestrator {
    engine: Arc<dyn ContainerEngine>,
    auth: Arc<dyn AuthorizationProvider>,
    config: FixtureConfig,
    ports: Option<Arc<dyn PortAllocator>>,
    nodes: Vec<ServiceInstance>,
}

impl ClusterOrchestrator {
    pub fn new(
        engine: Arc<dyn ContainerEngine>,
        auth: Arc<dyn AuthorizationProvider>,
        config: FixtureConfig,
    ) -> Self {
        Self {
            engine,
            auth,
            config,
            ports: None,
            nodes: Vec::new(),
        }
    }

    pub fn with_port_allocator(mut self, ports: Arc<dyn PortAllocator>) -> Self {
        self.ports = Some(ports);
        self
    }

    pub fn nodes(&self) -> &[ServiceInstance] {
        &self.nodes
    }

    pub fn into_nodes(self) -> Vec<ServiceInstance> {
        self.nodes
    }

    /// Start `count` nodes strictly in index order and return exactly those
    /// handles, aligned with [`derive_nodes`].
    ///
    /// The first failing node aborts the bring-up with its own error; nodes
    /// started before it stay running and remain in [`Self::nodes`], which
    /// accumulates across calls.
    pub async fn start_cluster(
        &mut self,
        count: usize,
        options: &ClusterOptions,
    ) -> Result<&[ServiceInstance]> {
        let descriptors = derive_nodes(count, options)?;
        let first = self.nodes.len();
        info!("🧩 Starting testnet of {} node(s)", count);

        for descriptor in &descriptors {
            let node_options = options.node.for_node(descriptor);
            let mut instance = ServiceInstance::from_options(
                self.engine.clone(),
                &node_options,
                &*self.auth,
                &self.config,
            )
            .await?;
            if let Some(ports) = &self.ports {
                instance = instance.with_port_allocator(ports.clone());
            }

            info!(
                "🔧 Node {} -> {} (abci {})",
                descriptor.index, descriptor.container_name, descriptor.abci_url
            );
            instance.start().await?;
            self.nodes.push(instance);
        }

        Ok(&self.nodes[first..])
    }

    pub async fn stop_all(&mut self) -> Result<()> {
        stop_cluster(&mut self.nodes).await
    }

    pub async fn remove_all(&mut self) -> Result<()> {
        remove_cluster(&mut self.nodes).await
    }
}

/// Start a testnet and hand back the ordered node handles.
pub async fn start_cluster(
    engine: Arc<dyn ContainerEngine>,
    auth: Arc<dyn AuthorizationProvider>,
    config: FixtureConfig,
    count: usize,
    options: &ClusterOptions,
) -> Result<Vec<ServiceInstance>> {
    let mut orchestrator = ClusterOrchestrator::new(engine, auth, config);
    orchestrator.start_cluster(count, options).await?;
    Ok(orchestrator.into_nodes())
}

/// Stop every node in order, aborting on the first failure.
pub async fn stop_cluster(nodes: &mut [ServiceInstance]) -> Result<()> {
    for node in nodes.iter_mut() {
        node.stop().await?;
    }
    Ok(())
}

/// Remove every node, continuing past failures and returning the first.
pub async fn remove_cluster(nodes: &mut [ServiceInstance]) -> Result<()> {
    let mut first_error = None;
    for node in nodes.iter_mut() {
        if let Err(e) = node.remove().await {
            warn!("Failed to remove {}: {}", node.name(), e);
            first_error.get_or_insert(e);
        }
    }
    first_error.map_or(Ok(()), Err)
}
