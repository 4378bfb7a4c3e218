//! End-to-end tests: real HTTP servers on localhost ports, membership via a
//! shared in-memory coordinator.
//!
//! # Test Strategy
//!
//! 1. **Coalescing across the cluster**: one upstream call for N concurrent
//!    fetches of the same key, wherever they land
//! 2. **force_this_node**: bypasses the ring, coalescing holds per node only
//! 3. **Failure paths**: user errors fan out, dead owners surface, bad
//!    bodies get the structured 400
//! 4. **Membership churn**: a node exit shrinks every surviving ring

use async_trait::async_trait;
use cluster::{serve, ClusterNode, ErrorBody, Fetch, FetchError, NodeConfig};
use corelib::{NodeUrl, RingBuilder};
use membership::{Coordinator, MemoryCoordinator, MemorySession, ServiceDiscovery};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Fetcher matching the reference workload: wait, bump a shared counter by
/// `params.val`, report which host did the work.
struct CountingFetcher {
    host: String,
    counter: Arc<AtomicI64>,
    executions: Arc<AtomicU32>,
    delay: Duration,
}

#[async_trait]
impl Fetch for CountingFetcher {
    async fn fetch(&self, params: Value) -> anyhow::Result<Value> {
        // Emulate upstream latency so concurrent callers coalesce.
        tokio::time::sleep(self.delay).await;
        let val = params.get("val").and_then(Value::as_i64).unwrap_or(0);
        self.counter.fetch_add(val, Ordering::SeqCst);
        self.executions.fetch_add(1, Ordering::SeqCst);
        Ok(json!({"status": "OK", "host": self.host}))
    }
}

struct FailingFetcher {
    executions: Arc<AtomicU32>,
}

#[async_trait]
impl Fetch for FailingFetcher {
    async fn fetch(&self, _params: Value) -> anyhow::Result<Value> {
        tokio::time::sleep(Duration::from_millis(100)).await;
        self.executions.fetch_add(1, Ordering::SeqCst);
        anyhow::bail!("x")
    }
}

struct TestNode {
    node: Arc<ClusterNode>,
    url: NodeUrl,
    session: Arc<MemorySession>,
    executions: Arc<AtomicU32>,
    _discovery: ServiceDiscovery,
    server: JoinHandle<std::io::Result<()>>,
}

/// Boots a full node: HTTP server on an ephemeral port, registration and
/// ring wiring through the shared coordinator.
async fn spawn_node(coord: &MemoryCoordinator, counter: &Arc<AtomicI64>, fail: bool) -> TestNode {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let host = format!("http://127.0.0.1:{}", port);

    let executions = Arc::new(AtomicU32::new(0));
    let fetcher: Arc<dyn Fetch> = if fail {
        Arc::new(FailingFetcher {
            executions: Arc::clone(&executions),
        })
    } else {
        Arc::new(CountingFetcher {
            host: host.clone(),
            counter: Arc::clone(counter),
            executions: Arc::clone(&executions),
            delay: Duration::from_millis(300),
        })
    };

    let config = NodeConfig {
        this_host: host,
        ..NodeConfig::default()
    };
    let node = ClusterNode::new(&config, fetcher).unwrap();
    let server = tokio::spawn(serve(Arc::clone(&node), listener));

    let session = Arc::new(coord.connect());
    let ring = Arc::clone(node.ring());
    let discovery = ServiceDiscovery::start(
        Arc::clone(&session) as Arc<dyn Coordinator>,
        "/",
        node.this_host().clone(),
        move |snapshot| ring.reset_with_new(&snapshot.members),
    )
    .await
    .unwrap();

    TestNode {
        url: node.this_host().clone(),
        node,
        session,
        executions,
        _discovery: discovery,
        server,
    }
}

async fn spawn_cluster(coord: &MemoryCoordinator, counter: &Arc<AtomicI64>, n: usize) -> Vec<TestNode> {
    let mut nodes = Vec::with_capacity(n);
    for _ in 0..n {
        nodes.push(spawn_node(coord, counter, false).await);
    }
    await_members(&nodes, n).await;
    nodes
}

/// Waits until every node's ring converged on `expected` members.
async fn await_members(nodes: &[TestNode], expected: usize) {
    for _ in 0..200 {
        if nodes.iter().all(|n| n.node.ring().node_count() == expected) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("cluster did not converge on {} members", expected);
}

/// The owner every node must agree on, computed from an independent ring.
fn expected_owner(nodes: &[TestNode], key: &str) -> NodeUrl {
    let reference = RingBuilder::new()
        .with_hosts(nodes.iter().map(|n| n.url.clone()))
        .build();
    reference.locate(key).unwrap()
}

/// Finds a key owned by `target` so a test can pin where work must land.
fn key_owned_by(nodes: &[TestNode], target: &NodeUrl) -> String {
    for i in 0..10_000 {
        let key = format!("routed-key-{}", i);
        if expected_owner(nodes, &key) == *target {
            return key;
        }
    }
    panic!("no key found routing to {}", target);
}

#[tokio::test]
async fn test_singlecall_over_network() {
    let coord = MemoryCoordinator::new();
    let counter = Arc::new(AtomicI64::new(0));
    let nodes = spawn_cluster(&coord, &counter, 3).await;

    let key = "test-key-for-unit-testing";
    let owner = expected_owner(&nodes, key);

    let mut handles = Vec::new();
    for n in &nodes {
        let node = Arc::clone(&n.node);
        handles.push(tokio::spawn(async move {
            node.fetch(key, json!({"val": 1}), false).await
        }));
    }
    for handle in handles {
        let value = handle.await.unwrap().unwrap();
        assert_eq!(value["status"], "OK");
        assert_eq!(value["host"], json!(owner.as_str()));
    }

    // Three concurrent cluster-wide calls, one upstream execution.
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_singlecall_force_this_node() {
    let coord = MemoryCoordinator::new();
    let counter = Arc::new(AtomicI64::new(0));
    let nodes = spawn_cluster(&coord, &counter, 3).await;

    let key = "test-key-for-unit-testing-force-this-node";

    let mut handles = Vec::new();
    for n in &nodes {
        let node = Arc::clone(&n.node);
        handles.push(tokio::spawn(async move {
            node.fetch(key, json!({"val": 1}), true).await
        }));
    }
    for handle in handles {
        let value = handle.await.unwrap().unwrap();
        assert_eq!(value["status"], "OK");
    }

    // The ring was bypassed, so coalescing only holds per node: every node
    // ran the fetch once.
    assert_eq!(counter.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_user_error_reaches_all_waiters() {
    let coord = MemoryCoordinator::new();
    let counter = Arc::new(AtomicI64::new(0));
    let node = spawn_node(&coord, &counter, true).await;
    await_members(std::slice::from_ref(&node), 1).await;

    let mut handles = Vec::new();
    for _ in 0..10 {
        let n = Arc::clone(&node.node);
        handles.push(tokio::spawn(async move {
            n.fetch("failing-key", json!({}), true).await
        }));
    }

    for handle in handles {
        match handle.await.unwrap() {
            Err(FetchError::UserFetchFailed(detail)) => assert_eq!(detail, "x"),
            other => panic!("expected UserFetchFailed, got {:?}", other),
        }
    }
    assert_eq!(node.executions.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_forwarded_requests_are_never_reforwarded() {
    let coord = MemoryCoordinator::new();
    let counter = Arc::new(AtomicI64::new(0));
    let nodes = spawn_cluster(&coord, &counter, 2).await;

    // A key the ring assigns to node B, posted straight at node A.
    let key = key_owned_by(&nodes, &nodes[1].url);
    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/fetch", nodes[0].url))
        .json(&json!({"key": key, "params": {"val": 1}}))
        .send()
        .await
        .unwrap();

    assert!(response.status().is_success());
    let value: Value = response.json().await.unwrap();
    // The handler dispatched locally despite not owning the key.
    assert_eq!(value["host"], json!(nodes[0].url.as_str()));
    assert_eq!(nodes[0].executions.load(Ordering::SeqCst), 1);
    assert_eq!(nodes[1].executions.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_bad_body_yields_structured_400() {
    let coord = MemoryCoordinator::new();
    let counter = Arc::new(AtomicI64::new(0));
    let node = spawn_node(&coord, &counter, false).await;

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/fetch", node.url))
        .header("content-type", "application/json")
        .body("this is not json")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
    let body: ErrorBody = response.json().await.unwrap();
    assert_eq!(body.error, "BadRequest");
    assert_eq!(node.executions.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_empty_ring_surfaces_no_members() {
    let counter = Arc::new(AtomicI64::new(0));
    let config = NodeConfig {
        this_host: "http://127.0.0.1:1".to_string(),
        ..NodeConfig::default()
    };
    let node = ClusterNode::new(
        &config,
        Arc::new(CountingFetcher {
            host: config.this_host.clone(),
            counter,
            executions: Arc::new(AtomicU32::new(0)),
            delay: Duration::ZERO,
        }),
    )
    .unwrap();

    assert_eq!(
        node.fetch("key", json!({}), false).await,
        Err(FetchError::NoMembers)
    );
}

#[tokio::test]
async fn test_dead_owner_surfaces_owner_unreachable() {
    let coord = MemoryCoordinator::new();
    let counter = Arc::new(AtomicI64::new(0));
    let nodes = spawn_cluster(&coord, &counter, 2).await;

    // Kill B's server but keep its registration, so A still routes to it.
    let key = key_owned_by(&nodes, &nodes[1].url);
    nodes[1].server.abort();
    tokio::time::sleep(Duration::from_millis(50)).await;

    match nodes[0].node.fetch(&key, json!({"val": 1}), false).await {
        Err(FetchError::OwnerUnreachable { url, .. }) => {
            assert_eq!(url, nodes[1].url.to_string());
        }
        other => panic!("expected OwnerUnreachable, got {:?}", other),
    }
}

#[tokio::test]
async fn test_node_exit_triggers_ring_reset() {
    let coord = MemoryCoordinator::new();
    let counter = Arc::new(AtomicI64::new(0));
    let mut nodes = spawn_cluster(&coord, &counter, 3).await;

    // Kill node C: its coordination session ends with it.
    let c = nodes.pop().unwrap();
    let c_url = c.url.clone();
    c.server.abort();
    c.session.close();
    drop(c);

    await_members(&nodes, 2).await;

    let survivors: Vec<NodeUrl> = nodes.iter().map(|n| n.url.clone()).collect();
    for i in 0..100 {
        let owner = nodes[0]
            .node
            .ring()
            .locate(&format!("churn-key-{}", i))
            .unwrap();
        assert_ne!(owner, c_url);
        assert!(survivors.contains(&owner));
        assert_eq!(owner, nodes[1].node.ring().locate(&format!("churn-key-{}", i)).unwrap());
    }
}
