//! Node core: routing plus single-flight execution.

use crate::client::PeerClient;
use crate::config::NodeConfig;
use crate::error::FetchError;
use crate::fetch::Fetch;
use corelib::{HashRing, NodeUrl};
use serde_json::Value;
use singleflight::SingleFlight;
use std::sync::Arc;

/// One node of the cluster.
///
/// Owns the ring and the in-flight table; discovery drives the ring from
/// outside through [`ClusterNode::ring`] (it holds the reset entry point,
/// not the node).
pub struct ClusterNode {
    this_host: NodeUrl,
    ring: Arc<HashRing>,
    flights: SingleFlight<Result<Value, FetchError>>,
    peers: PeerClient,
    fetcher: Arc<dyn Fetch>,
}

impl ClusterNode {
    pub fn new(config: &NodeConfig, fetcher: Arc<dyn Fetch>) -> anyhow::Result<Arc<Self>> {
        let this_host = NodeUrl::parse(&config.this_host)?;
        tracing::info!(
            host = %this_host,
            vnodes = config.ring_virtual_nodes,
            pool = config.http_pool_connections,
            pool_max = config.http_pool_maxsize,
            "cluster node configured"
        );
        Ok(Arc::new(Self {
            this_host,
            ring: Arc::new(HashRing::with_vnodes(config.ring_virtual_nodes)),
            flights: SingleFlight::new(),
            peers: PeerClient::new(config)?,
            fetcher,
        }))
    }

    /// Fetches the value for `key`.
    ///
    /// Routing: with `force_this_node` the ring is bypassed and the work
    /// runs here; the inbound handler sets it to stop forwarded requests
    /// from being forwarded again, and callers can use it to pin work to
    /// the local node. Otherwise the key's owner runs the work, reached
    /// over HTTP when it is not this node.
    pub async fn fetch(
        &self,
        key: &str,
        params: Value,
        force_this_node: bool,
    ) -> Result<Value, FetchError> {
        if force_this_node {
            return self.fetch_local(key, params).await;
        }
        let owner = self.ring.locate(key)?;
        if owner == self.this_host {
            self.fetch_local(key, params).await
        } else {
            tracing::debug!(key, owner = %owner, "forwarding to owner");
            self.peers.fetch(&owner, key, params).await
        }
    }

    /// Runs the user fetch under the single-flight dispatcher.
    async fn fetch_local(&self, key: &str, params: Value) -> Result<Value, FetchError> {
        let fetcher = Arc::clone(&self.fetcher);
        self.flights
            .run(key, async move {
                fetcher
                    .fetch(params)
                    .await
                    .map_err(|err| FetchError::UserFetchFailed(err.to_string()))
            })
            .await
    }

    pub fn this_host(&self) -> &NodeUrl {
        &self.this_host
    }

    /// The node's ring. Discovery wires its membership callback to
    /// `ring().reset_with_new`.
    pub fn ring(&self) -> &Arc<HashRing> {
        &self.ring
    }

    /// Keys currently executing locally.
    pub fn in_flight(&self) -> usize {
        self.flights.in_flight()
    }
}
