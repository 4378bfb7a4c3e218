//! Node configuration.

use corelib::DEFAULT_VNODES;
use serde::{Deserialize, Serialize};

/// Everything a node needs besides its fetch function (which is code, not
/// configuration).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// This node's reachable base URL, e.g. `http://cache-3:7001`.
    pub this_host: String,
    /// Coordination service hosts, comma separated.
    pub coord_hosts: String,
    /// Root path the cluster registers under.
    pub root_path: String,
    /// Virtual nodes per member on the ring.
    pub ring_virtual_nodes: usize,
    /// Idle connections the outbound pool keeps per peer.
    pub http_pool_connections: usize,
    /// Upper bound on pooled connections. reqwest has no total cap; kept
    /// for operator-facing parity and logged at startup.
    pub http_pool_maxsize: usize,
    /// Outbound request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            this_host: String::new(),
            coord_hosts: "127.0.0.1:2181".to_string(),
            root_path: "/".to_string(),
            ring_virtual_nodes: DEFAULT_VNODES,
            http_pool_connections: 10,
            http_pool_maxsize: 100,
            request_timeout_secs: 30,
        }
    }
}
