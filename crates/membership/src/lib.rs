//! Membership and service discovery for the cache cluster.
//!
//! This crate provides:
//! - The coordination-service seam ([`Coordinator`]): the five primitives
//!   the cluster needs from a hierarchical ephemeral-node store
//! - An in-memory coordinator with real ephemeral/session semantics, used
//!   by tests and single-process demo clusters
//! - Membership snapshots and the discovery watcher that turns child-watch
//!   events into ring resets

pub mod coordinator;
pub mod discovery;
pub mod error;
pub mod memory;
pub mod snapshot;

pub use coordinator::{join_path, CoordEvent, Coordinator};
pub use discovery::{DiscoveryState, ServiceDiscovery};
pub use error::{MembershipError, Result};
pub use memory::{MemoryCoordinator, MemorySession};
pub use snapshot::MembershipSnapshot;
