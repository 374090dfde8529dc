use crate::Result;
use crate::engine::ContainerEngine;
use crate::error::EngineError;
use crate::types::{ContainerDetails, PortBinding};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Everything needed to create one container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub name: String,
    pub network: String,
    pub image: String,
    pub ports: Vec<PortBinding>,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl ContainerSpec {
    pub fn new(
        name: impl Into<String>,
        network: impl Into<String>,
        image: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            network: network.into(),
            image: image.into(),
            ports: Vec::new(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    pub fn with_ports(mut self, ports: Vec<PortBinding>) -> Self {
        self.ports = ports;
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Copy of this spec publishing `ports` instead.
    pub fn rebind(&self, ports: Vec<PortBinding>) -> Self {
        Self {
            ports,
            ..self.clone()
        }
    }

    /// Host port currently published for `container_port`
    pub fn host_port(&self, container_port: u16) -> Option<u16> {
        self.ports
            .iter()
            .find(|binding| binding.container == container_port)
            .map(|binding| binding.host)
    }
}

/// A container spec and, once created, the engine's handle for it
#[derive(Debug, Clone)]
pub struct Container {
    spec: ContainerSpec,
    id: Option<String>,
}

impl Container {
    pub fn new(spec: ContainerSpec) -> Self {
        Self { spec, id: None }
    }

    pub fn spec(&self) -> &ContainerSpec {
        &self.spec
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// Swap in a new spec. Only valid while no container exists.
    pub(crate) fn replace_spec(&mut self, spec: ContainerSpec) {
        debug_assert!(self.id.is_none());
        self.spec = spec;
    }

    pub async fn create(&mut self, engine: &dyn ContainerEngine) -> Result<()> {
        debug!(
            "Creating container {} with ports {:?}",
            self.spec.name, self.spec.ports
        );
        let id = engine.create_container(&self.spec).await?;
        self.id = Some(id);
        Ok(())
    }

    pub async fn start(&self, engine: &dyn ContainerEngine) -> Result<()> {
        let id = self.require_id()?;
        engine.start_container(id).await?;
        info!("▶️  Container {} started", self.spec.name);
        Ok(())
    }

    pub async fn stop(&self, engine: &dyn ContainerEngine) -> Result<()> {
        let id = self.require_id()?;
        engine.stop_container(id).await?;
        info!("🛑 Container {} stopped", self.spec.name);
        Ok(())
    }

    /// Remove the container if one was created. Forgetting the handle is
    /// what makes later inspection fail with "not found".
    pub async fn remove(&mut self, engine: &dyn ContainerEngine) -> Result<()> {
        let Some(id) = self.id.take() else {
            return Ok(());
        };

        match engine.remove_container(&id).await {
            Ok(()) => {
                info!("🗑️  Container {} removed", self.spec.name);
                Ok(())
            }
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => {
                self.id = Some(id);
                Err(e)
            }
        }
    }

    pub async fn details(&self, engine: &dyn ContainerEngine) -> Result<ContainerDetails> {
        let id = self.require_id()?;
        engine.inspect_container(id).await
    }

    fn require_id(&self) -> Result<&str> {
        self.id.as_deref().ok_or_else(|| {
            EngineError::ContainerNotFound {
                name: self.spec.name.clone(),
            }
            .into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::InMemoryEngine;
    use crate::resources::Network;
    use crate::types::ContainerState;

    fn spec() -> ContainerSpec {
        ContainerSpec::new("core", "devnet_test", "dashpay/dashd:latest")
            .with_ports(vec![PortBinding::same(20001)])
            .with_args(["-regtest=1", "-port=20001"])
            .with_env("NODE_ENV", "test")
    }

    #[test]
    fn test_rebind_keeps_identity() {
        let original = spec();
        let moved = original.rebind(vec![PortBinding::new(31000, 20001)]);

        assert_eq!(moved.name, original.name);
        assert_eq!(moved.args, original.args);
        assert_eq!(moved.host_port(20001), Some(31000));
        assert_eq!(original.host_port(20001), Some(20001));
    }

    #[tokio::test]
    async fn test_details_after_remove_is_not_found() {
        let engine = InMemoryEngine::new();
        Network::new("devnet_test", "bridge")
            .create(&engine)
            .await
            .unwrap();

        let mut container = Container::new(spec());
        container.create(&engine).await.unwrap();
        container.start(&engine).await.unwrap();

        let details = container.details(&engine).await.unwrap();
        assert_eq!(details.state, ContainerState::Running);
        assert_eq!(details.args, vec!["-regtest=1", "-port=20001"]);

        container.remove(&engine).await.unwrap();
        assert!(container.details(&engine).await.unwrap_err().is_not_found());

        container.remove(&engine).await.unwrap();
    }
}
