//! Service lifecycle: network + image + container, started with port-conflict
//! retry and an optional readiness probe.

use crate::config::FixtureConfig;
use crate::engine::ContainerEngine;
use crate::error::ServiceError;
use crate::readiness::{Readiness, wait_until_ready};
use crate::registry::{AuthorizationProvider, RegistryOptions};
use crate::resources::{Container, ContainerSpec, Image, Network};
use crate::types::{ContainerDetails, PortBinding};
use crate::{FixtureError, Result};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub mod ports;

pub use ports::{EphemeralPorts, PortAllocator, PortRange};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceState {
    Absent,
    Starting,
    Running,
    Stopping,
    Stopped,
    Removed,
}

/// Computed values a service is built from
pub trait ServiceOptions: Send + Sync {
    fn network(&self) -> Network;
    fn container_spec(&self) -> ContainerSpec;

    fn registry(&self) -> RegistryOptions {
        RegistryOptions::default()
    }

    /// Container port answering the ABCI echo probe, if any
    fn abci_port(&self) -> Option<u16> {
        None
    }
}

/// Result of one create+start attempt
enum LaunchOutcome {
    Started,
    PortConflict(u16),
    Failed(FixtureError),
}

impl From<FixtureError> for LaunchOutcome {
    fn from(err: FixtureError) -> Self {
        match err {
            FixtureError::Engine(crate::error::EngineError::PortAllocated { port }) => {
                LaunchOutcome::PortConflict(port)
            }
            other => LaunchOutcome::Failed(other),
        }
    }
}

/// One disposable container-backed service
pub struct ServiceInstance {
    engine: Arc<dyn ContainerEngine>,
    network: Network,
    image: Image,
    container: Container,
    state: InstanceState,
    ports: Arc<dyn PortAllocator>,
    port_retry_limit: u32,
    readiness: Option<Readiness>,
    ip: Option<String>,
}

impl ServiceInstance {
    pub fn new(
        engine: Arc<dyn ContainerEngine>,
        network: Network,
        image: Image,
        spec: ContainerSpec,
    ) -> Self {
        Self {
            engine,
            network,
            image,
            container: Container::new(spec),
            state: InstanceState::Absent,
            ports: Arc::new(EphemeralPorts),
            port_retry_limit: crate::config::DEFAULT_PORT_RETRY_LIMIT,
            readiness: None,
            ip: None,
        }
    }

    /// Build from an options value, resolving the registry credential once.
    pub async fn from_options(
        engine: Arc<dyn ContainerEngine>,
        options: &dyn ServiceOptions,
        auth: &dyn AuthorizationProvider,
        config: &FixtureConfig,
    ) -> Result<Self> {
        let spec = options.container_spec();
        let credential = auth.authorization_token(&options.registry()).await?;
        let image = Image::new(spec.image.clone(), credential);

        let mut instance = Self::new(engine, options.network(), image, spec)
            .with_port_retry_limit(config.port_retry_limit);
        if let Some(port) = options.abci_port() {
            instance = instance.with_readiness(Readiness::abci(port, config.readiness.policy()));
        }
        Ok(instance)
    }

    pub fn with_readiness(mut self, readiness: Readiness) -> Self {
        self.readiness = Some(readiness);
        self
    }

    pub fn with_port_retry_limit(mut self, limit: u32) -> Self {
        self.port_retry_limit = limit;
        self
    }

    pub fn with_port_allocator(mut self, ports: Arc<dyn PortAllocator>) -> Self {
        self.ports = ports;
        self
    }

    pub fn name(&self) -> &str {
        self.container.name()
    }

    pub fn state(&self) -> InstanceState {
        self.state
    }

    pub fn spec(&self) -> &ContainerSpec {
        self.container.spec()
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    /// Address on the service network, known once started.
    pub fn get_ip(&self) -> Option<&str> {
        self.ip.as_deref()
    }

    /// Host port currently published for `container_port`
    pub fn get_port(&self, container_port: u16) -> Option<u16> {
        self.container.spec().host_port(container_port)
    }

    pub async fn details(&self) -> Result<ContainerDetails> {
        self.container.details(&*self.engine).await
    }

    /// Bring the service up. A running instance is left untouched.
    pub async fn start(&mut self) -> Result<()> {
        match self.state {
            InstanceState::Running => return Ok(()),
            InstanceState::Removed => {
                return Err(ServiceError::Removed {
                    name: self.name().to_string(),
                }
                .into())
            }
            _ => {}
        }

        info!("🚀 Starting service: {}", self.name());
        self.state = InstanceState::Starting;

        let engine = self.engine.clone();
        self.network.create(&*engine).await?;
        self.image.pull(&*engine).await?;

        self.launch_with_retry(&*engine).await?;

        let details = self.container.details(&*engine).await?;
        self.ip = details
            .ip_on(&self.network.name)
            .filter(|ip| !ip.is_empty())
            .map(str::to_string);

        if let Some(readiness) = self.readiness.clone() {
            let endpoint = self.readiness_endpoint(&readiness)?;
            info!("⏳ Waiting for {} on {}", self.name(), endpoint);
            wait_until_ready(&*readiness.probe, endpoint, readiness.policy).await?;
        }

        self.state = InstanceState::Running;
        info!("✅ Service {} running", self.name());
        Ok(())
    }

    async fn launch_with_retry(&mut self, engine: &dyn ContainerEngine) -> Result<()> {
        let max_attempts = self.port_retry_limit + 1;
        let mut attempt = 1;

        loop {
            match self.launch(engine).await {
                LaunchOutcome::Started => return Ok(()),
                LaunchOutcome::Failed(e) => return Err(e),
                LaunchOutcome::PortConflict(port) => {
                    if attempt >= max_attempts {
                        return Err(ServiceError::PortConflictExhausted {
                            name: self.name().to_string(),
                            attempts: attempt,
                        }
                        .into());
                    }

                    warn!(
                        "⚠️  Host port {} busy for {} (attempt {}/{}), rebinding",
                        port,
                        self.name(),
                        attempt,
                        max_attempts
                    );

                    // The failed container still holds the old bindings.
                    self.container.remove(engine).await?;
                    let rebound = self.rebind_ports()?;
                    self.container.replace_spec(rebound);
                    attempt += 1;
                }
            }
        }
    }

    async fn launch(&mut self, engine: &dyn ContainerEngine) -> LaunchOutcome {
        if self.container.id().is_none() {
            if let Err(e) = self.container.create(engine).await {
                return e.into();
            }
        }

        match self.container.start(engine).await {
            Ok(()) => LaunchOutcome::Started,
            Err(e) => e.into(),
        }
    }

    /// Fresh host port for every published container port.
    ///
    /// One draw per binding. A draw that repeats the refused port is kept and
    /// costs one more attempt.
    fn rebind_ports(&self) -> Result<ContainerSpec> {
        let spec = self.container.spec();
        let mut ports = Vec::with_capacity(spec.ports.len());
        for binding in &spec.ports {
            let host = self.ports.allocate()?;
            debug!("Rebinding {} -> {}", binding, PortBinding::new(host, binding.container));
            ports.push(PortBinding::new(host, binding.container));
        }
        Ok(spec.rebind(ports))
    }

    fn readiness_endpoint(&self, readiness: &Readiness) -> Result<SocketAddr> {
        let host_port = self.get_port(readiness.container_port).ok_or_else(|| {
            FixtureError::Other(anyhow::anyhow!(
                "{} does not publish container port {}",
                self.name(),
                readiness.container_port
            ))
        })?;
        Ok(SocketAddr::from((Ipv4Addr::LOCALHOST, host_port)))
    }

    /// Stop the container, keeping it for a later restart.
    pub async fn stop(&mut self) -> Result<()> {
        if !matches!(self.state, InstanceState::Running | InstanceState::Starting)
            || self.container.id().is_none()
        {
            return Ok(());
        }

        self.state = InstanceState::Stopping;
        self.container.stop(&*self.engine).await?;
        self.state = InstanceState::Stopped;
        Ok(())
    }

    /// Tear down the container and, when nothing else uses it, the network.
    pub async fn remove(&mut self) -> Result<()> {
        if self.state == InstanceState::Removed {
            return Ok(());
        }

        let engine = self.engine.clone();
        self.container.remove(&*engine).await?;

        if let Err(e) = self.network.remove(&*engine).await {
            debug!("Keeping network {}: {}", self.network.name, e);
        }

        self.ip = None;
        self.state = InstanceState::Removed;
        info!("🧹 Service {} removed", self.name());
        Ok(())
    }
}

impl std::fmt::Debug for ServiceInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceInstance")
            .field("name", &self.name())
            .field("state", &self.state)
            .field("ports", &self.container.spec().ports)
            .field("ip", &self.ip)
            .finish()
    }
}
