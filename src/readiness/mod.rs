//! Protocol-level readiness checks.
//!
//! A started container only proves the process was launched. The probes here
//! connect to the published port and wait for the server to answer.

use crate::Result;
use crate::error::ReadinessError;
use async_trait::async_trait;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info};

/// ABCI echo request, sent verbatim.
pub const ABCI_ECHO_REQUEST: [u8; 8] = [0x0e, 0x12, 0x05, 0x0a, 0x03, 0x01, 0x02, 0x03];

#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    /// One attempt. Resolves once the server has answered.
    async fn probe(&self, endpoint: SocketAddr) -> Result<()>;
}

/// Writes the ABCI echo request and waits for any response bytes
#[derive(Debug, Clone, Copy, Default)]
pub struct AbciEchoProbe;

#[async_trait]
impl ReadinessProbe for AbciEchoProbe {
    async fn probe(&self, endpoint: SocketAddr) -> Result<()> {
        let mut stream = TcpStream::connect(endpoint).await?;
        stream.write_all(&ABCI_ECHO_REQUEST).await?;

        let mut buf = [0u8; 64];
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed before any response",
            )
            .into());
        }

        debug!("ABCI echo answered with {} bytes from {}", n, endpoint);
        Ok(())
    }
}

/// How often and how long to probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessPolicy {
    pub attempts: u32,
    pub attempt_timeout: Duration,
    pub interval: Duration,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            attempts: 100,
            attempt_timeout: Duration::from_secs(1),
            interval: Duration::from_secs(1),
        }
    }
}

/// Probe `endpoint` until it answers or the policy runs out.
///
/// Every failed attempt, whether refused, errored or timed out, is followed
/// by a full `interval` sleep.
pub async fn wait_until_ready(
    probe: &dyn ReadinessProbe,
    endpoint: SocketAddr,
    policy: ReadinessPolicy,
) -> Result<()> {
    for attempt in 1..=policy.attempts {
        match tokio::time::timeout(policy.attempt_timeout, probe.probe(endpoint)).await {
            Ok(Ok(())) => {
                info!("✅ {} ready after {} attempt(s)", endpoint, attempt);
                return Ok(());
            }
            Ok(Err(e)) => debug!("Readiness attempt {} on {} failed: {}", attempt, endpoint, e),
            Err(_) => debug!("Readiness attempt {} on {} timed out", attempt, endpoint),
        }

        tokio::time::sleep(policy.interval).await;
    }

    Err(ReadinessError::NotReadyInTime {
        endpoint: endpoint.to_string(),
        attempts: policy.attempts,
    }
    .into())
}

/// Probe attached to a service: which container port to check, and how.
#[derive(Clone)]
pub struct Readiness {
    pub probe: std::sync::Arc<dyn ReadinessProbe>,
    pub container_port: u16,
    pub policy: ReadinessPolicy,
}

impl Readiness {
    pub fn abci(container_port: u16, policy: ReadinessPolicy) -> Self {
        Self {
            probe: std::sync::Arc::new(AbciEchoProbe),
            container_port,
            policy,
        }
    }
}

impl std::fmt::Debug for Readiness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Readiness")
            .field("container_port", &self.container_port)
            .field("policy", &self.policy)
            .finish()
    }
}
