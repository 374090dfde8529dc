//! Container engine abstraction.
//!
//! Everything the fixtures do to the outside world goes through
//! [`ContainerEngine`]: network, image and container primitives plus
//! inspection. [`docker::DockerCli`] talks to a real daemon through its CLI,
//! [`memory::InMemoryEngine`] models one in-process.

use crate::Result;
use crate::registry::RegistryCredential;
use crate::resources::ContainerSpec;
use crate::types::{ContainerDetails, NetworkDetails};
use async_trait::async_trait;

pub mod docker;
pub mod memory;

pub use docker::DockerCli;
pub use memory::{EngineCall, InMemoryEngine};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    async fn network_exists(&self, name: &str) -> Result<bool>;
    async fn create_network(&self, name: &str, driver: &str) -> Result<()>;
    async fn remove_network(&self, name: &str) -> Result<()>;
    /// Driver and every attached container, whether running or not.
    async fn inspect_network(&self, name: &str) -> Result<NetworkDetails>;

    async fn image_exists(&self, image: &str) -> Result<bool>;
    async fn pull_image(&self, image: &str, credential: Option<RegistryCredential>) -> Result<()>;

    /// Create a container from `spec` and return its id.
    async fn create_container(&self, spec: &ContainerSpec) -> Result<String>;
    /// Fails with `EngineError::PortAllocated` when a published host port is taken.
    async fn start_container(&self, id: &str) -> Result<()>;
    async fn stop_container(&self, id: &str) -> Result<()>;
    async fn remove_container(&self, id: &str) -> Result<()>;
    /// Fails with `EngineError::ContainerNotFound` once the container is gone.
    async fn inspect_container(&self, id: &str) -> Result<ContainerDetails>;
}
