use async_trait::async_trait;
use devnet_fixtures::api::{
    AbciEchoProbe, Anonymous, ContainerSpec, DriveAbciOptions, Image, Network, Readiness,
    ReadinessPolicy, ReadinessProbe, wait_until_ready,
};
use devnet_fixtures::config::ReadinessSettings;
use devnet_fixtures::readiness::ABCI_ECHO_REQUEST;
use devnet_fixtures::{
    FixtureConfig, InMemoryEngine, InstanceState, PortBinding, Result, ServiceInstance,
};
use pretty_assertions::assert_eq;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// Accepts connections, reports each request and answers with an echo reply.
async fn echo_server() -> (SocketAddr, mpsc::UnboundedReceiver<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let mut request = [0u8; 8];
            if socket.read_exact(&mut request).await.is_err() {
                continue;
            }
            let _ = tx.send(request.to_vec());
            let _ = socket.write_all(&[0x0e, 0x12, 0x05, 0x0a, 0x03]).await;
        }
    });

    (addr, rx)
}

/// Accepts connections and never writes anything back.
async fn silent_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    addr
}

async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

fn quick_policy(attempts: u32) -> ReadinessPolicy {
    ReadinessPolicy {
        attempts,
        attempt_timeout: Duration::from_millis(200),
        interval: Duration::from_millis(20),
    }
}

#[tokio::test]
async fn test_probe_sends_echo_request() {
    let (addr, mut requests) = echo_server().await;

    AbciEchoProbe.probe(addr).await.unwrap();

    assert_eq!(requests.recv().await.unwrap(), ABCI_ECHO_REQUEST.to_vec());
}

#[tokio::test]
async fn test_probe_fails_on_refused_connection() {
    let addr = closed_port().await;
    assert!(AbciEchoProbe.probe(addr).await.is_err());
}

#[tokio::test]
async fn test_refused_endpoint_times_out() {
    let addr = closed_port().await;

    let err = wait_until_ready(&AbciEchoProbe, addr, quick_policy(3))
        .await
        .unwrap_err();

    assert!(err.is_readiness_timeout());
    assert!(err.to_string().contains("has not started in time"));
}

#[tokio::test]
async fn test_silent_server_hits_attempt_timeout() {
    let addr = silent_server().await;
    let policy = ReadinessPolicy {
        attempts: 2,
        attempt_timeout: Duration::from_millis(50),
        interval: Duration::from_millis(10),
    };
    let started = Instant::now();

    let err = wait_until_ready(&AbciEchoProbe, addr, policy)
        .await
        .unwrap_err();

    assert!(err.is_readiness_timeout());
    assert!(started.elapsed() >= Duration::from_millis(120));
}

#[tokio::test]
async fn test_drive_abci_start_waits_for_echo() {
    let (addr, mut requests) = echo_server().await;
    let engine = Arc::new(InMemoryEngine::new());
    let options = DriveAbciOptions {
        host_port: Some(addr.port()),
        ..Default::default()
    };
    let config = FixtureConfig {
        readiness: ReadinessSettings {
            attempts: 5,
            attempt_timeout_ms: 500,
            interval_ms: 20,
        },
        ..Default::default()
    };

    let mut drive = ServiceInstance::from_options(engine.clone(), &options, &Anonymous, &config)
        .await
        .unwrap();
    drive.start().await.unwrap();

    assert_eq!(drive.state(), InstanceState::Running);
    assert_eq!(drive.get_port(26658), Some(addr.port()));
    assert_eq!(requests.recv().await.unwrap(), ABCI_ECHO_REQUEST.to_vec());
}

#[tokio::test]
async fn test_unready_service_is_not_running() {
    let addr = closed_port().await;
    let engine = Arc::new(InMemoryEngine::new());
    let options = DriveAbciOptions {
        host_port: Some(addr.port()),
        ..Default::default()
    };
    let config = FixtureConfig {
        readiness: ReadinessSettings {
            attempts: 2,
            attempt_timeout_ms: 200,
            interval_ms: 10,
        },
        ..Default::default()
    };

    let mut drive = ServiceInstance::from_options(engine.clone(), &options, &Anonymous, &config)
        .await
        .unwrap();
    let err = drive.start().await.unwrap_err();

    assert!(err.is_readiness_timeout());
    assert_eq!(drive.state(), InstanceState::Starting);

    // Cleanup still works after a failed start.
    drive.remove().await.unwrap();
    assert_eq!(engine.container_count().await, 0);
}

/// Never answers; every attempt runs into the timeout.
struct NeverAnswers {
    attempts: Arc<AtomicU32>,
}

#[async_trait]
impl ReadinessProbe for NeverAnswers {
    async fn probe(&self, _endpoint: SocketAddr) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        std::future::pending::<()>().await;
        Ok(())
    }
}

/// Refused until attempt `ready_on`
struct ReadyOn {
    ready_on: u32,
    attempts: Arc<AtomicU32>,
}

#[async_trait]
impl ReadinessProbe for ReadyOn {
    async fn probe(&self, _endpoint: SocketAddr) -> Result<()> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt >= self.ready_on {
            Ok(())
        } else {
            Err(std::io::Error::from(std::io::ErrorKind::ConnectionRefused).into())
        }
    }
}

fn abci_service(engine: Arc<InMemoryEngine>, probe: Arc<dyn ReadinessProbe>) -> ServiceInstance {
    let spec = ContainerSpec::new("drive_abci", "devnet_platform", "dashpay/drive:latest")
        .with_ports(vec![PortBinding::same(26658)]);
    ServiceInstance::new(
        engine,
        Network::new("devnet_platform", "bridge"),
        Image::new("dashpay/drive:latest", None),
        spec,
    )
    .with_readiness(Readiness {
        probe,
        container_port: 26658,
        policy: ReadinessPolicy::default(),
    })
}

#[tokio::test(start_paused = true)]
async fn test_start_gives_up_after_full_readiness_budget() {
    let attempts = Arc::new(AtomicU32::new(0));
    let probe = Arc::new(NeverAnswers {
        attempts: attempts.clone(),
    });
    let mut drive = abci_service(Arc::new(InMemoryEngine::new()), probe);
    let started = tokio::time::Instant::now();

    let err = drive.start().await.unwrap_err();

    assert!(err.is_readiness_timeout());
    assert_eq!(attempts.load(Ordering::SeqCst), 100);
    assert_eq!(started.elapsed(), Duration::from_secs(200));
    assert_eq!(drive.state(), InstanceState::Starting);
}

#[tokio::test(start_paused = true)]
async fn test_start_succeeds_once_server_answers() {
    let attempts = Arc::new(AtomicU32::new(0));
    let probe = Arc::new(ReadyOn {
        ready_on: 3,
        attempts: attempts.clone(),
    });
    let mut drive = abci_service(Arc::new(InMemoryEngine::new()), probe);
    let started = tokio::time::Instant::now();

    drive.start().await.unwrap();

    assert_eq!(drive.state(), InstanceState::Running);
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    assert_eq!(started.elapsed(), Duration::from_secs(2));
}
