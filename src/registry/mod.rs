//! Registry authorization for image pulls.
//!
//! Private images need a short-lived credential that is resolved once when a
//! service is built and handed to the engine with the pull.

use crate::Result;
use anyhow::anyhow;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

/// Credential handed to the engine for a single pull
#[derive(Clone, PartialEq, Eq)]
pub struct RegistryCredential {
    pub server: String,
    pub username: String,
    pub secret: String,
}

impl fmt::Debug for RegistryCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryCredential")
            .field("server", &self.server)
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct RegistryOptions {
    /// Registry host, e.g. `123456789.dkr.ecr.us-west-2.amazonaws.com`
    pub server: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Endpoint exchanging username/password for a short-lived token
    pub token_endpoint: Option<String>,
}

#[async_trait]
pub trait AuthorizationProvider: Send + Sync {
    /// `None` means the image is pulled anonymously.
    async fn authorization_token(
        &self,
        options: &RegistryOptions,
    ) -> Result<Option<RegistryCredential>>;
}

/// Pulls without credentials
pub struct Anonymous;

#[async_trait]
impl AuthorizationProvider for Anonymous {
    async fn authorization_token(
        &self,
        _options: &RegistryOptions,
    ) -> Result<Option<RegistryCredential>> {
        Ok(None)
    }
}

/// Uses the configured username/password as-is
pub struct StaticAuthorization;

#[async_trait]
impl AuthorizationProvider for StaticAuthorization {
    async fn authorization_token(
        &self,
        options: &RegistryOptions,
    ) -> Result<Option<RegistryCredential>> {
        match (&options.server, &options.username, &options.password) {
            (Some(server), Some(username), Some(password)) => Ok(Some(RegistryCredential {
                server: server.clone(),
                username: username.clone(),
                secret: password.clone(),
            })),
            _ => Ok(None),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
    username: Option<String>,
}

/// Exchanges username/password for a short-lived token over HTTP
pub struct TokenEndpointAuthorization {
    client: Client,
}

impl TokenEndpointAuthorization {
    pub fn new() -> Self {
        Self::with_client(Client::new())
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Default for TokenEndpointAuthorization {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthorizationProvider for TokenEndpointAuthorization {
    async fn authorization_token(
        &self,
        options: &RegistryOptions,
    ) -> Result<Option<RegistryCredential>> {
        let (Some(endpoint), Some(server)) = (&options.token_endpoint, &options.server) else {
            return StaticAuthorization.authorization_token(options).await;
        };

        let username = options.username.clone().unwrap_or_default();
        debug!("Requesting registry token from {} for {}", endpoint, server);

        let request = serde_json::json!({
            "username": username,
            "password": options.password.clone().unwrap_or_default(),
            "registry": server,
        });

        let response = self.client.post(endpoint).json(&request).send().await?;
        if !response.status().is_success() {
            return Err(anyhow!("Registry token request failed: {}", response.status()).into());
        }

        let token: TokenResponse = response.json().await?;
        info!("🔑 Obtained registry token for {}", server);

        Ok(Some(RegistryCredential {
            server: server.clone(),
            username: token.username.unwrap_or(username),
            secret: token.token,
        }))
    }
}
