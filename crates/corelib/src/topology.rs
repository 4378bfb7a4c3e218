//! Ring topology view.
//!
//! Read-only operations over the hash ring for debugging and operations:
//! which nodes own how much of the ring, and a human-readable description.

use crate::node::NodeUrl;
use crate::ring::HashRing;
use std::collections::HashMap;
use std::sync::Arc;

/// Ring topology view and operations.
///
/// A lightweight wrapper around a shared [`HashRing`] that adds inspection
/// operations without modifying the ring itself. All operations are
/// read-only and safe for concurrent access.
#[derive(Clone)]
pub struct Topology {
    ring: Arc<HashRing>,
}

impl Topology {
    pub fn new(ring: Arc<HashRing>) -> Self {
        Self { ring }
    }

    /// Vnode count owned by each member.
    pub fn ownership(&self) -> HashMap<NodeUrl, usize> {
        self.ring.vnode_counts().into_iter().collect()
    }

    /// Fraction of the ring's vnodes owned by each member, as a percentage.
    pub fn ownership_percentages(&self) -> HashMap<NodeUrl, f64> {
        let total = self.ring.vnode_count() as f64;
        if total == 0.0 {
            return HashMap::new();
        }
        self.ring
            .vnode_counts()
            .into_iter()
            .map(|(node, owned)| (node, (owned as f64 / total) * 100.0))
            .collect()
    }

    /// Describe the ring in a human-readable format.
    pub fn describe(&self) -> String {
        let mut description = String::new();

        description.push_str("Ring Description:\n");
        description.push_str(&format!("  Nodes: {}\n", self.ring.node_count()));
        description.push_str(&format!("  Total Vnodes: {}\n", self.ring.vnode_count()));
        description.push_str(&format!("  Partitioner: {}\n", self.ring.partitioner_name()));

        let percentages = self.ownership_percentages();
        if !percentages.is_empty() {
            description.push_str("\nNode Ownership:\n");

            // vnode_counts is already sorted by URL
            for (node, owned) in self.ring.vnode_counts() {
                let pct = percentages.get(&node).copied().unwrap_or(0.0);
                description.push_str(&format!(
                    "  {}: {} vnodes ({:.2}%)\n",
                    node, owned, pct
                ));
            }
        }

        description
    }

    /// The underlying ring.
    pub fn ring(&self) -> &HashRing {
        &self.ring
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ring::RingBuilder;

    fn url(s: &str) -> NodeUrl {
        NodeUrl::parse(s).unwrap()
    }

    #[test]
    fn test_topology_ownership() {
        let ring = RingBuilder::new()
            .with_vnodes(4)
            .add_host(url("http://a:1"))
            .add_host(url("http://b:1"))
            .build();

        let topology = Topology::new(Arc::new(ring));
        let ownership = topology.ownership();

        assert_eq!(ownership.len(), 2);
        assert_eq!(ownership[&url("http://a:1")], 4);
        assert_eq!(ownership[&url("http://b:1")], 4);
    }

    #[test]
    fn test_topology_percentages() {
        let ring = RingBuilder::new()
            .with_vnodes(4)
            .add_host(url("http://a:1"))
            .add_host(url("http://b:1"))
            .build();

        let topology = Topology::new(Arc::new(ring));
        let percentages = topology.ownership_percentages();

        assert_eq!(percentages.len(), 2);
        assert!((percentages[&url("http://a:1")] - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_topology_describe() {
        let ring = RingBuilder::new()
            .with_vnodes(4)
            .add_host(url("http://a:1"))
            .build();

        let topology = Topology::new(Arc::new(ring));
        let description = topology.describe();

        assert!(description.contains("Ring Description"));
        assert!(description.contains("http://a:1"));
        assert!(description.contains("Xxh3Partitioner"));
    }
}
