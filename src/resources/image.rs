use crate::Result;
use crate::engine::ContainerEngine;
use crate::registry::RegistryCredential;
use tracing::{debug, info};

/// Image reference plus the credential resolved for pulling it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub name: String,
    pub credential: Option<RegistryCredential>,
}

impl Image {
    pub fn new(name: impl Into<String>, credential: Option<RegistryCredential>) -> Self {
        Self {
            name: name.into(),
            credential,
        }
    }

    /// Make sure the image is present locally, pulling it when absent.
    pub async fn pull(&self, engine: &dyn ContainerEngine) -> Result<()> {
        if engine.image_exists(&self.name).await? {
            debug!("Image {} already present", self.name);
            return Ok(());
        }

        info!("⬇️  Pulling image: {}", self.name);
        engine.pull_image(&self.name, self.credential.clone()).await
    }
}
