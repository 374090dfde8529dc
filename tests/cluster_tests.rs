use devnet_fixtures::api::{Anonymous, PortRange, remove_cluster, start_cluster, stop_cluster};
use devnet_fixtures::engine::EngineCall;
use devnet_fixtures::{
    ClusterOptions, ClusterOrchestrator, ContainerEngine, FixtureConfig, InMemoryEngine, InstanceState,
    NodeOverride,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn endpoints() -> Vec<String> {
    ["tcp://drive_a:26658", "tcp://drive_b:26658", "tcp://drive_c:26658"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn distinct_ports(count: usize) -> Vec<NodeOverride> {
    (0..count)
        .map(|i| NodeOverride {
            host: None,
            port: Some(26657 + 10 * i as u16),
        })
        .collect()
}

fn orchestrator(engine: &Arc<InMemoryEngine>) -> ClusterOrchestrator {
    ClusterOrchestrator::new(
        engine.clone(),
        Arc::new(Anonymous),
        FixtureConfig::default(),
    )
}

fn created_names(calls: &[EngineCall]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for call in calls {
        if let EngineCall::CreateContainer { name, .. } = call {
            if names.last() != Some(name) {
                names.push(name.clone());
            }
        }
    }
    names
}

#[tokio::test]
async fn test_zero_nodes_touches_nothing() {
    let engine = Arc::new(InMemoryEngine::new());
    let options = ClusterOptions {
        abci_url: Some("tcp://drive_abci:26658".to_string()),
        ..Default::default()
    };

    let err = start_cluster(
        engine.clone(),
        Arc::new(Anonymous),
        FixtureConfig::default(),
        0,
        &options,
    )
    .await
    .unwrap_err();

    assert!(err.is_invalid_instance_count());
    assert!(engine.calls().await.is_empty());
}

#[tokio::test]
async fn test_single_node_cluster() {
    let engine = Arc::new(InMemoryEngine::new());
    let options = ClusterOptions {
        abci_url: Some("tcp://drive_abci:26658".to_string()),
        ..Default::default()
    };

    let nodes = start_cluster(
        engine.clone(),
        Arc::new(Anonymous),
        FixtureConfig::default(),
        1,
        &options,
    )
    .await
    .unwrap();

    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].name(), "node0");
    assert_eq!(nodes[0].state(), InstanceState::Running);
    assert_eq!(nodes[0].get_port(26657), Some(26657));

    let details = nodes[0].details().await.unwrap();
    assert!(details
        .args
        .contains(&"--proxy_app=tcp://drive_abci:26658".to_string()));
    assert!(details.args.contains(&"/tendermint".to_string()));
    assert!(nodes[0].spec().env.is_empty());
}

#[tokio::test]
async fn test_three_node_testnet_starts_in_order() {
    let engine = Arc::new(InMemoryEngine::new());
    let options = ClusterOptions {
        abci_urls: endpoints(),
        nodes: distinct_ports(3),
        ..Default::default()
    };

    let mut cluster = orchestrator(&engine);
    let nodes = cluster.start_cluster(3, &options).await.unwrap();

    let names: Vec<_> = nodes.iter().map(|n| n.name().to_string()).collect();
    assert_eq!(names, vec!["node0", "node1", "node2"]);
    assert_eq!(created_names(&engine.calls().await), names);

    for node in nodes {
        assert_eq!(node.state(), InstanceState::Running);
        assert!(node.get_ip().is_some());

        let env = &node.spec().env;
        assert!(env.contains(&("PREPARE_TESTNET".to_string(), "true".to_string())));
        assert!(env.contains(&("TESTNET_NUMBER_OF_NODES".to_string(), "3".to_string())));
        assert!(env.contains(&(
            "TESTNET_NUMBER_OF_VALIDATORS".to_string(),
            "3".to_string()
        )));

        let args = &node.spec().args;
        assert!(args.contains(&"--proxy_app=tcp://drive_c:26658".to_string()));
        assert!(args.contains(&format!("/tendermint/mytestnet/{}", node.name())));
    }
}

#[tokio::test]
async fn test_nodes_sharing_rpc_port_are_rebound() {
    let engine = Arc::new(InMemoryEngine::new());
    let options = ClusterOptions {
        abci_urls: endpoints(),
        ..Default::default()
    };

    let mut cluster =
        orchestrator(&engine).with_port_allocator(Arc::new(PortRange::new(40000, 40100)));
    cluster.start_cluster(2, &options).await.unwrap();

    let ports: Vec<_> = cluster
        .nodes()
        .iter()
        .map(|n| n.get_port(26657).unwrap())
        .collect();
    assert_eq!(ports, vec![26657, 40000]);
    assert_eq!(
        created_names(&engine.calls().await),
        vec!["node0", "node1"]
    );
}

#[tokio::test]
async fn test_partial_failure_keeps_started_nodes() {
    let engine = Arc::new(InMemoryEngine::new());
    engine.fail_next_start("node1", "tendermint exited with code 1").await;
    let options = ClusterOptions {
        abci_urls: endpoints(),
        nodes: distinct_ports(3),
        ..Default::default()
    };

    let mut cluster = orchestrator(&engine);
    let err = cluster.start_cluster(3, &options).await.unwrap_err();

    assert!(err.to_string().contains("tendermint exited with code 1"));
    assert_eq!(cluster.nodes().len(), 1);
    assert_eq!(cluster.nodes()[0].name(), "node0");
    assert_eq!(cluster.nodes()[0].state(), InstanceState::Running);
    assert_eq!(
        created_names(&engine.calls().await),
        vec!["node0", "node1"]
    );
}

#[tokio::test]
async fn test_remove_all_tears_down_network() {
    let engine = Arc::new(InMemoryEngine::new());
    let options = ClusterOptions {
        abci_urls: endpoints(),
        nodes: distinct_ports(2),
        ..Default::default()
    };

    let mut cluster = orchestrator(&engine);
    cluster.start_cluster(2, &options).await.unwrap();
    assert_eq!(engine.inspect_network("devnet_platform").await.unwrap().driver, "bridge");

    cluster.stop_all().await.unwrap();
    assert!(cluster
        .nodes()
        .iter()
        .all(|n| n.state() == InstanceState::Stopped));

    cluster.remove_all().await.unwrap();

    assert_eq!(engine.container_count().await, 0);
    assert!(engine.inspect_network("devnet_platform").await.unwrap_err().is_not_found());
    assert!(cluster
        .nodes()
        .iter()
        .all(|n| n.state() == InstanceState::Removed));
}

#[tokio::test]
async fn test_free_helpers_tear_down_returned_handles() {
    let engine = Arc::new(InMemoryEngine::new());
    let options = ClusterOptions {
        abci_url: Some("tcp://drive_abci:26658".to_string()),
        nodes: distinct_ports(2),
        ..Default::default()
    };

    let mut nodes = start_cluster(
        engine.clone(),
        Arc::new(Anonymous),
        FixtureConfig::default(),
        2,
        &options,
    )
    .await
    .unwrap();

    stop_cluster(&mut nodes).await.unwrap();
    assert!(engine.bound_host_ports().await.is_empty());

    remove_cluster(&mut nodes).await.unwrap();
    assert_eq!(engine.container_count().await, 0);

    // A second teardown finds nothing left to do.
    remove_cluster(&mut nodes).await.unwrap();
}

#[tokio::test]
async fn test_second_bring_up_returns_only_its_own_nodes() {
    let engine = Arc::new(InMemoryEngine::new());
    let first = ClusterOptions {
        abci_url: Some("tcp://drive_a:26658".to_string()),
        nodes: distinct_ports(1),
        ..Default::default()
    };
    let second = ClusterOptions {
        abci_url: Some("tcp://drive_b:26658".to_string()),
        nodes: vec![NodeOverride {
            host: Some("late0".to_string()),
            port: Some(36657),
        }],
        ..Default::default()
    };

    let mut cluster = orchestrator(&engine);
    assert_eq!(cluster.start_cluster(1, &first).await.unwrap().len(), 1);

    let started = cluster.start_cluster(1, &second).await.unwrap();
    assert_eq!(started.len(), 1);
    assert_eq!(started[0].name(), "late0");

    let all: Vec<_> = cluster.nodes().iter().map(|n| n.name().to_string()).collect();
    assert_eq!(all, vec!["node0", "late0"]);
}
