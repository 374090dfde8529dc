use crate::Result;
use crate::engine::ContainerEngine;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Isolated virtual network shared by the containers of a test run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub name: String,
    pub driver: String,
}

impl Network {
    pub fn new(name: impl Into<String>, driver: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            driver: driver.into(),
        }
    }

    /// Create the network unless one with the same name already exists.
    pub async fn create(&self, engine: &dyn ContainerEngine) -> Result<()> {
        if engine.network_exists(&self.name).await? {
            debug!("Reusing network {}", self.name);
            return Ok(());
        }

        info!("🌐 Creating network: {} ({})", self.name, self.driver);
        if let Err(e) = engine.create_network(&self.name, &self.driver).await {
            // A sibling starting at the same time may have created it first.
            if !engine.network_exists(&self.name).await? {
                return Err(e);
            }
            debug!("Network {} appeared concurrently: {}", self.name, e);
        }
        Ok(())
    }

    /// Remove the network once no container, running or stopped, is attached.
    pub async fn remove(&self, engine: &dyn ContainerEngine) -> Result<()> {
        let details = match engine.inspect_network(&self.name).await {
            Ok(details) => details,
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(e),
        };
        if details.is_in_use() {
            debug!(
                "Keeping network {}: still attached to {}",
                self.name,
                details.containers.join(", ")
            );
            return Ok(());
        }

        info!("🗑️  Removing network: {}", self.name);
        engine.remove_network(&self.name).await
    }
}
