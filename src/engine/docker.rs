use super::ContainerEngine;
use crate::Result;
use crate::error::EngineError;
use crate::registry::RegistryCredential;
use crate::resources::ContainerSpec;
use crate::types::{ContainerDetails, ContainerState, NetworkDetails, PortBinding};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command as AsyncCommand;
use tracing::{debug, info};

/// Engine backed by the `docker` (or `podman`) command line
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
}

impl DockerCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Check the binary answers `version`.
    pub async fn ping(&self) -> Result<String> {
        let version = self
            .run(&["version", "--format", "{{.Server.Version}}"])
            .await?;
        info!("🐳 {} server version {}", self.binary, version.trim());
        Ok(version.trim().to_string())
    }

    async fn run<S: AsRef<str>>(&self, args: &[S]) -> Result<String> {
        self.run_with_stdin(args, None).await
    }

    async fn run_with_stdin<S: AsRef<str>>(&self, args: &[S], stdin: Option<&str>) -> Result<String> {
        let args: Vec<&str> = args.iter().map(AsRef::as_ref).collect();
        let command_line = args.join(" ");
        debug!("{} {}", self.binary, command_line);

        let mut cmd = AsyncCommand::new(&self.binary);
        cmd.args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            });

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EngineError::RuntimeUnavailable {
                    binary: self.binary.clone(),
                }
                .into()
            } else {
                crate::FixtureError::Io(e)
            }
        })?;

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(input.as_bytes()).await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_failure(&command_line, &stderr).into());
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new("docker")
    }
}

/// One container name per line, as printed by `ps --format {{.Names}}`
pub fn parse_container_names(output: &str) -> Vec<String> {
    let mut names: Vec<String> = output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    names.sort();
    names
}

/// Map CLI stderr onto the engine errors callers branch on.
pub fn classify_failure(command: &str, stderr: &str) -> EngineError {
    let lower = stderr.to_ascii_lowercase();

    if lower.contains("port is already allocated") || lower.contains("address already in use") {
        return EngineError::PortAllocated {
            port: conflicting_port(stderr).unwrap_or(0),
        };
    }

    let name = command.rsplit(' ').next().unwrap_or_default().to_string();
    if lower.contains("no such container") || lower.contains("no such object") {
        return EngineError::ContainerNotFound { name };
    }
    if lower.contains("no such network")
        || (lower.contains("network") && lower.contains("not found"))
    {
        return EngineError::NetworkNotFound { name };
    }
    if lower.contains("no such image") {
        return EngineError::ImageNotFound { image: name };
    }

    EngineError::CommandFailed {
        command: command.to_string(),
        stderr: stderr.trim().to_string(),
    }
}

/// Pull the port out of `Bind for 0.0.0.0:4444 failed` or
/// `listen tcp 0.0.0.0:4444: bind: address already in use`.
fn conflicting_port(stderr: &str) -> Option<u16> {
    stderr
        .split(|c: char| c.is_whitespace())
        .filter_map(|token| {
            let token = token.trim_end_matches(':');
            let (_, port) = token.rsplit_once(':')?;
            port.parse::<u16>().ok()
        })
        .next()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectEntry {
    id: String,
    name: String,
    #[serde(default)]
    args: Vec<String>,
    state: InspectState,
    config: InspectConfig,
    host_config: InspectHostConfig,
    network_settings: InspectNetworkSettings,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectState {
    status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectConfig {
    image: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectHostConfig {
    #[serde(default)]
    port_bindings: Option<HashMap<String, Option<Vec<InspectHostPort>>>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectHostPort {
    #[serde(default)]
    host_port: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectNetworkSettings {
    #[serde(default)]
    networks: Option<HashMap<String, InspectEndpoint>>,
}

#[derive(Debug, Deserialize)]
struct InspectEndpoint {
    #[serde(rename = "IPAddress", default)]
    ip_address: String,
}

/// Parse the JSON array printed by `docker inspect`.
pub fn parse_inspect(json: &str) -> Result<ContainerDetails> {
    let mut entries: Vec<InspectEntry> = serde_json::from_str(json)?;
    let entry = entries.pop().ok_or_else(|| EngineError::MalformedResponse {
        reason: "empty inspect output".to_string(),
    })?;

    let state = entry
        .state
        .status
        .parse::<ContainerState>()
        .map_err(|reason| EngineError::MalformedResponse { reason })?;

    let mut ports = Vec::new();
    for (container_port, bindings) in entry.host_config.port_bindings.unwrap_or_default() {
        let container = container_port
            .split('/')
            .next()
            .and_then(|p| p.parse::<u16>().ok())
            .ok_or_else(|| EngineError::MalformedResponse {
                reason: format!("bad container port '{}'", container_port),
            })?;
        for binding in bindings.unwrap_or_default() {
            if let Ok(host) = binding.host_port.parse::<u16>() {
                ports.push(PortBinding::new(host, container));
            }
        }
    }
    ports.sort_by_key(|binding| binding.container);

    let mut networks: Vec<(String, String)> = entry
        .network_settings
        .networks
        .unwrap_or_default()
        .into_iter()
        .map(|(name, endpoint)| (name, endpoint.ip_address))
        .collect();
    networks.sort();

    Ok(ContainerDetails {
        id: entry.id,
        name: entry.name.trim_start_matches('/').to_string(),
        image: entry.config.image,
        state,
        ports,
        networks,
        args: entry.args,
    })
}

#[async_trait]
impl ContainerEngine for DockerCli {
    async fn network_exists(&self, name: &str) -> Result<bool> {
        match self.run(&["network", "inspect", name]).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn create_network(&self, name: &str, driver: &str) -> Result<()> {
        self.run(&["network", "create", "--driver", driver, name])
            .await?;
        Ok(())
    }

    async fn remove_network(&self, name: &str) -> Result<()> {
        self.run(&["network", "rm", name]).await?;
        Ok(())
    }

    async fn inspect_network(&self, name: &str) -> Result<NetworkDetails> {
        let driver = self
            .run(&["network", "inspect", "--format", "{{.Driver}}", name])
            .await?;

        // `network inspect` only lists running endpoints; `ps -a` also sees stopped ones.
        let filter = format!("network={}", name);
        let attached = self
            .run(&["ps", "--all", "--filter", filter.as_str(), "--format", "{{.Names}}"])
            .await?;

        Ok(NetworkDetails {
            name: name.to_string(),
            driver: driver.trim().to_string(),
            containers: parse_container_names(&attached),
        })
    }

    async fn image_exists(&self, image: &str) -> Result<bool> {
        match self.run(&["image", "inspect", image]).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn pull_image(&self, image: &str, credential: Option<RegistryCredential>) -> Result<()> {
        if let Some(credential) = credential {
            debug!("Logging in to {} as {}", credential.server, credential.username);
            self.run_with_stdin(
                &[
                    "login",
                    "--username",
                    credential.username.as_str(),
                    "--password-stdin",
                    credential.server.as_str(),
                ],
                Some(&credential.secret),
            )
            .await?;
        }

        self.run(&["pull", image]).await?;
        Ok(())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String> {
        let mut args: Vec<String> = vec![
            "create".to_string(),
            "--name".to_string(),
            spec.name.clone(),
            "--network".to_string(),
            spec.network.clone(),
        ];
        for binding in &spec.ports {
            args.push("-p".to_string());
            args.push(binding.to_string());
        }
        for (key, value) in &spec.env {
            args.push("-e".to_string());
            args.push(format!("{}={}", key, value));
        }
        args.push(spec.image.clone());
        args.extend(spec.args.iter().cloned());

        let id = self.run(&args[..]).await?;
        Ok(id.trim().to_string())
    }

    async fn start_container(&self, id: &str) -> Result<()> {
        self.run(&["start", id]).await?;
        Ok(())
    }

    async fn stop_container(&self, id: &str) -> Result<()> {
        self.run(&["stop", id]).await?;
        Ok(())
    }

    async fn remove_container(&self, id: &str) -> Result<()> {
        self.run(&["rm", "--force", "--volumes", id]).await?;
        Ok(())
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerDetails> {
        let json = self.run(&["inspect", "--type", "container", id]).await?;
        parse_inspect(&json)
    }
}
