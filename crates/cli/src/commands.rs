//! Command implementations.

use clap::Subcommand;
use cluster::{fetch_fn, serve_with_shutdown, ClusterNode, Fetch, NodeConfig};
use corelib::{HashRing, NodeUrl, RingBuilder, Topology, DEFAULT_VNODES};
use membership::{Coordinator, MemoryCoordinator, ServiceDiscovery};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one node against a static member list.
    Serve {
        /// This node's base URL, e.g. http://127.0.0.1:7001
        #[arg(long)]
        this_host: String,
        /// A member's base URL; repeat per member. This node is always a
        /// member, listed or not.
        #[arg(long = "peer")]
        peers: Vec<String>,
        /// Virtual nodes per member.
        #[arg(long, default_value_t = DEFAULT_VNODES)]
        vnodes: usize,
    },
    /// Run an n-node demo cluster in one process.
    Demo {
        /// Number of nodes to run.
        #[arg(long, default_value_t = 3)]
        nodes: usize,
        /// First port; node i listens on base_port + i.
        #[arg(long, default_value_t = 7001)]
        base_port: u16,
    },
    /// Print the owner of a key for a member list.
    Locate {
        key: String,
        /// A member's base URL; repeat per member.
        #[arg(long = "host", required = true)]
        hosts: Vec<String>,
        #[arg(long, default_value_t = DEFAULT_VNODES)]
        vnodes: usize,
    },
    /// Print ring topology for a member list.
    Describe {
        /// A member's base URL; repeat per member.
        #[arg(long = "host", required = true)]
        hosts: Vec<String>,
        #[arg(long, default_value_t = DEFAULT_VNODES)]
        vnodes: usize,
    },
}

impl Command {
    pub async fn run(self) -> anyhow::Result<()> {
        match self {
            Command::Serve {
                this_host,
                peers,
                vnodes,
            } => run_serve(this_host, peers, vnodes).await,
            Command::Demo { nodes, base_port } => run_demo(nodes, base_port).await,
            Command::Locate { key, hosts, vnodes } => {
                let ring = build_ring(&hosts, vnodes)?;
                println!("{}", ring.locate(&key)?);
                Ok(())
            }
            Command::Describe { hosts, vnodes } => {
                let ring = build_ring(&hosts, vnodes)?;
                print!("{}", Topology::new(Arc::new(ring)).describe());
                Ok(())
            }
        }
    }
}

fn build_ring(hosts: &[String], vnodes: usize) -> anyhow::Result<HashRing> {
    let hosts = hosts
        .iter()
        .map(|host| NodeUrl::parse(host.as_str()))
        .collect::<corelib::Result<Vec<_>>>()?;
    Ok(RingBuilder::new()
        .with_vnodes(vnodes)
        .with_hosts(hosts)
        .build())
}

/// Demo fetch function: wait a beat, echo the params and which host ran.
fn demo_fetcher(host: String) -> Arc<dyn Fetch> {
    fetch_fn(move |params| {
        let host = host.clone();
        async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok(serde_json::json!({"status": "OK", "host": host, "params": params}))
        }
    })
}

async fn run_serve(this_host: String, peers: Vec<String>, vnodes: usize) -> anyhow::Result<()> {
    let config = NodeConfig {
        this_host,
        ring_virtual_nodes: vnodes,
        ..NodeConfig::default()
    };
    let node = ClusterNode::new(&config, demo_fetcher(config.this_host.clone()))?;

    let mut members: HashSet<NodeUrl> = peers
        .iter()
        .map(|peer| NodeUrl::parse(peer.as_str()))
        .collect::<corelib::Result<_>>()?;
    members.insert(node.this_host().clone());
    node.ring().reset_with_new(&members);
    tracing::info!(members = members.len(), "static membership installed");

    let listener = TcpListener::bind(node.this_host().host_port()).await?;
    serve_with_shutdown(node, listener, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await?;
    Ok(())
}

async fn run_demo(nodes: usize, base_port: u16) -> anyhow::Result<()> {
    anyhow::ensure!(nodes > 0, "demo needs at least one node");

    let coord = MemoryCoordinator::new();
    let mut cluster = Vec::with_capacity(nodes);

    for i in 0..nodes {
        let host = format!("http://127.0.0.1:{}", base_port + i as u16);
        let config = NodeConfig {
            this_host: host.clone(),
            ..NodeConfig::default()
        };
        let node = ClusterNode::new(&config, demo_fetcher(host))?;

        let listener = TcpListener::bind(node.this_host().host_port()).await?;
        tokio::spawn(cluster::serve(Arc::clone(&node), listener));

        let session = Arc::new(coord.connect());
        let ring = Arc::clone(node.ring());
        let discovery = ServiceDiscovery::start(
            Arc::clone(&session) as Arc<dyn Coordinator>,
            "/",
            node.this_host().clone(),
            move |snapshot| ring.reset_with_new(&snapshot.members),
        )
        .await?;

        cluster.push((node, session, discovery));
    }

    // Let the watchers converge before describing the ring.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let (first, _, _) = &cluster[0];
    print!("{}", Topology::new(Arc::clone(first.ring())).describe());
    println!(
        "POST {{\"key\": ..., \"params\": ...}} to any node's /fetch; ctrl-c stops the cluster"
    );

    tokio::signal::ctrl_c().await?;
    for (_, session, discovery) in &cluster {
        discovery.shutdown();
        session.close();
    }
    Ok(())
}
