//! Devnet fixtures - disposable, network-isolated container services for
//! integration tests of a blockchain node stack.
//!
//! A [`ServiceInstance`] owns one container on an isolated network. Starting
//! it pulls the image, publishes host ports (rebinding on conflicts with
//! sibling instances) and, for ABCI servers, waits until the server answers
//! an echo request. [`ClusterOrchestrator`] brings up a Tendermint testnet
//! of N such services.

pub mod cluster;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod presets;
pub mod readiness;
pub mod registry;
pub mod resources;
pub mod service;
pub mod types;

pub use cluster::{ClusterOptions, ClusterOrchestrator, NodeDescriptor, NodeOverride};
pub use config::FixtureConfig;
pub use engine::{ContainerEngine, DockerCli, InMemoryEngine};
pub use error::{FixtureError, Result};
pub use service::{InstanceState, ServiceInstance, ServiceOptions};
pub use types::{ContainerDetails, ContainerState, NetworkDetails, PortBinding};

/// Re-exports for test harness code
pub mod api {
    pub use crate::cluster::{
        TestnetTopology, derive_nodes, remove_cluster, start_cluster, stop_cluster,
    };
    pub use crate::presets::{DriveAbciOptions, TendermintNodeOptions};
    pub use crate::readiness::{
        AbciEchoProbe, Readiness, ReadinessPolicy, ReadinessProbe, wait_until_ready,
    };
    pub use crate::registry::{
        Anonymous, AuthorizationProvider, RegistryCredential, RegistryOptions,
        StaticAuthorization, TokenEndpointAuthorization,
    };
    pub use crate::resources::{Container, ContainerSpec, Image, Network};
    pub use crate::service::{EphemeralPorts, PortAllocator, PortRange};
    pub use crate::{
        ClusterOptions, ClusterOrchestrator, ContainerEngine, DockerCli, FixtureConfig,
        FixtureError, InMemoryEngine, ServiceInstance,
    };
}
