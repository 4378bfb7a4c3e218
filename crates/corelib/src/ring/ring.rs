//! Hash ring data structure.
//!
//! Each member node is replicated as V virtual nodes to smooth key
//! distribution. The vnode table is immutable once built; membership changes
//! build a fresh table off-line and swap it in atomically, so readers always
//! see either the pre-reset or the post-reset ring, never a half-built one.

use crate::error::{Error, Result};
use crate::node::NodeUrl;
use crate::partitioner::{Partitioner, Xxh3Partitioner};
use crate::token::Xxh3Token;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;

/// Default virtual nodes per member.
pub const DEFAULT_VNODES: usize = 40;

/// Immutable sorted vnode table; one generation of ring state.
#[derive(Debug, Default)]
struct RingTable {
    /// (token, owner) pairs sorted by token, ties broken by URL so that
    /// every process sorts identically regardless of set iteration order.
    entries: Vec<(Xxh3Token, NodeUrl)>,
    /// Member URLs, sorted.
    nodes: Vec<NodeUrl>,
}

impl RingTable {
    fn build<P>(members: &HashSet<NodeUrl>, vnodes: usize, partitioner: &P) -> Self
    where
        P: Partitioner<TokenType = Xxh3Token>,
    {
        let mut entries = Vec::with_capacity(members.len() * vnodes);
        for node in members {
            for i in 0..vnodes {
                let token = partitioner.partition(format!("{}-{}", node, i).as_bytes());
                entries.push((token, node.clone()));
            }
        }
        entries.sort_unstable_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

        let mut nodes: Vec<NodeUrl> = members.iter().cloned().collect();
        nodes.sort_unstable();

        Self { entries, nodes }
    }
}

/// Consistent hash ring mapping keys to member node URLs.
///
/// # Thread Safety
///
/// `locate` may run concurrently with other `locate`s and with
/// `reset_with_new`. Lookups clone the current table handle under a read
/// lock and then work lock-free; resets swap the handle under the write
/// lock.
pub struct HashRing {
    table: RwLock<Arc<RingTable>>,
    partitioner: Xxh3Partitioner,
    vnodes: usize,
}

impl HashRing {
    /// Creates an empty ring with the default vnode count.
    pub fn new() -> Self {
        Self::with_vnodes(DEFAULT_VNODES)
    }

    /// Creates an empty ring with `vnodes` virtual nodes per member.
    pub fn with_vnodes(vnodes: usize) -> Self {
        assert!(vnodes > 0, "ring needs at least one vnode per member");
        Self {
            table: RwLock::new(Arc::new(RingTable::default())),
            partitioner: Xxh3Partitioner,
            vnodes,
        }
    }

    /// Atomically replaces the member set.
    ///
    /// The new table is built off-line from the lock; in-flight `locate`
    /// calls keep reading the generation they started with.
    pub fn reset_with_new(&self, members: &HashSet<NodeUrl>) {
        let next = Arc::new(RingTable::build(members, self.vnodes, &self.partitioner));
        tracing::debug!(
            members = next.nodes.len(),
            vnodes = next.entries.len(),
            "ring reset"
        );
        *self.table.write() = next;
    }

    /// Returns the node that owns `key`.
    ///
    /// Deterministic: every node with the same member set computes the same
    /// owner. Fails with [`Error::NoMembers`] until the first non-empty
    /// reset.
    pub fn locate(&self, key: &str) -> Result<NodeUrl> {
        let table = Arc::clone(&self.table.read());
        if table.entries.is_empty() {
            return Err(Error::NoMembers);
        }
        let token = self.partitioner.partition(key.as_bytes());
        // Smallest entry with token >= H(key), wrapping to the start.
        let idx = table.entries.partition_point(|(t, _)| *t < token);
        let idx = if idx == table.entries.len() { 0 } else { idx };
        Ok(table.entries[idx].1.clone())
    }

    /// Number of member nodes.
    pub fn node_count(&self) -> usize {
        self.table.read().nodes.len()
    }

    /// Number of vnode entries across all members.
    pub fn vnode_count(&self) -> usize {
        self.table.read().entries.len()
    }

    /// Current member URLs, sorted.
    pub fn nodes(&self) -> Vec<NodeUrl> {
        self.table.read().nodes.clone()
    }

    /// Virtual nodes per member.
    pub fn vnodes_per_node(&self) -> usize {
        self.vnodes
    }

    /// Vnode count per member, as (node, count) pairs. Used by the topology
    /// view; counts can differ from `vnodes_per_node` only on token
    /// collisions, which the build keeps (both entries survive the sort).
    pub fn vnode_counts(&self) -> Vec<(NodeUrl, usize)> {
        let table = self.table.read();
        table
            .nodes
            .iter()
            .map(|node| {
                let owned = table.entries.iter().filter(|(_, n)| n == node).count();
                (node.clone(), owned)
            })
            .collect()
    }

    /// Name of the partitioner placing keys on this ring.
    pub fn partitioner_name(&self) -> &'static str {
        self.partitioner.name()
    }
}

impl Default for HashRing {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for rings with custom vnode counts and an initial member set.
#[derive(Debug, Default)]
pub struct RingBuilder {
    vnodes: Option<usize>,
    hosts: HashSet<NodeUrl>,
}

impl RingBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Virtual nodes per member (default [`DEFAULT_VNODES`]).
    pub fn with_vnodes(mut self, vnodes: usize) -> Self {
        self.vnodes = Some(vnodes);
        self
    }

    /// Adds an initial member.
    pub fn add_host(mut self, host: NodeUrl) -> Self {
        self.hosts.insert(host);
        self
    }

    /// Adds initial members.
    pub fn with_hosts(mut self, hosts: impl IntoIterator<Item = NodeUrl>) -> Self {
        self.hosts.extend(hosts);
        self
    }

    pub fn build(self) -> HashRing {
        let ring = HashRing::with_vnodes(self.vnodes.unwrap_or(DEFAULT_VNODES));
        if !self.hosts.is_empty() {
            ring.reset_with_new(&self.hosts);
        }
        ring
    }
}
