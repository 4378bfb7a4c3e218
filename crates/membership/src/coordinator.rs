//! Coordination-service seam.
//!
//! The cluster needs exactly five things from its coordination service:
//! create a persistent path, register an ephemeral child with a payload,
//! list children, read a child's payload, and a change/session event feed.
//! The concrete client library stays behind this trait; the crate ships an
//! in-memory implementation, a real deployment plugs in its own.

use crate::error::Result;
use async_trait::async_trait;
use tokio::sync::broadcast;

/// Events delivered by a coordination session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordEvent {
    /// The child list under the watched root changed. `version` is the
    /// service's monotone change counter.
    ChildrenChanged { version: u64 },
    /// Transport dropped; the session may still recover.
    Disconnected,
    /// Session re-established after a disconnect. Watches must re-pull,
    /// changes may have been missed.
    Reconnected,
    /// Session permanently lost; ephemeral registrations are gone.
    Expired,
}

/// Handle to a coordination-service session.
///
/// Implementations must be safe to share across tasks. The children watch
/// is recursive by construction: the event feed keeps delivering
/// [`CoordEvent::ChildrenChanged`] for every change, no re-arming needed.
#[async_trait]
pub trait Coordinator: Send + Sync + 'static {
    /// Creates `path` as a persistent node if it does not exist.
    async fn ensure_path(&self, path: &str) -> Result<()>;

    /// Creates an ephemeral child of `parent` carrying `payload`.
    ///
    /// The child disappears automatically when the session ends.
    async fn register_ephemeral(&self, parent: &str, name: &str, payload: &[u8]) -> Result<()>;

    /// Lists the names of `path`'s direct children, sorted.
    async fn children(&self, path: &str) -> Result<Vec<String>>;

    /// Reads the payload stored at `path`.
    async fn read(&self, path: &str) -> Result<Vec<u8>>;

    /// Subscribes to this session's event feed.
    fn events(&self) -> broadcast::Receiver<CoordEvent>;
}

/// Joins a parent path and a child name.
pub fn join_path(parent: &str, name: &str) -> String {
    if parent.ends_with('/') {
        format!("{}{}", parent, name)
    } else {
        format!("{}/{}", parent, name)
    }
}
