//! In-memory coordination service.
//!
//! A single shared registry hands out sessions that behave like sessions of
//! a real hierarchical ephemeral-node store: ephemeral children vanish when
//! their session closes or expires, child changes fan out to every
//! connected session, and sessions can simulate disconnect/reconnect and
//! expiry. This backs multi-node-in-one-process tests and demo clusters.

use crate::coordinator::{join_path, CoordEvent, Coordinator};
use crate::error::{MembershipError, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 64;

/// A stored node: persistent when `owner` is `None`, ephemeral otherwise.
struct NodeEntry {
    payload: Vec<u8>,
    owner: Option<u64>,
}

struct SessionShared {
    id: u64,
    connected: AtomicBool,
    expired: AtomicBool,
    tx: broadcast::Sender<CoordEvent>,
}

struct Registry {
    nodes: DashMap<String, NodeEntry>,
    sessions: DashMap<u64, Arc<SessionShared>>,
    version: AtomicU64,
    next_session: AtomicU64,
}

impl Registry {
    /// Bumps the change counter and fans the event out to every connected
    /// session. Disconnected sessions miss it and catch up on reconnect.
    fn notify_children_changed(&self) {
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        for session in self.sessions.iter() {
            if session.connected.load(Ordering::SeqCst) {
                let _ = session.tx.send(CoordEvent::ChildrenChanged { version });
            }
        }
    }

    /// Drops every ephemeral node owned by `session_id`; returns whether
    /// anything was removed.
    fn drop_ephemerals(&self, session_id: u64) -> bool {
        let before = self.nodes.len();
        self.nodes.retain(|_, entry| entry.owner != Some(session_id));
        self.nodes.len() != before
    }
}

/// Shared in-memory coordination service.
#[derive(Clone)]
pub struct MemoryCoordinator {
    registry: Arc<Registry>,
}

impl MemoryCoordinator {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Registry {
                nodes: DashMap::new(),
                sessions: DashMap::new(),
                version: AtomicU64::new(0),
                next_session: AtomicU64::new(1),
            }),
        }
    }

    /// Opens a new session against the shared registry.
    pub fn connect(&self) -> MemorySession {
        let id = self.registry.next_session.fetch_add(1, Ordering::SeqCst);
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        let shared = Arc::new(SessionShared {
            id,
            connected: AtomicBool::new(true),
            expired: AtomicBool::new(false),
            tx,
        });
        self.registry.sessions.insert(id, Arc::clone(&shared));
        MemorySession {
            registry: Arc::clone(&self.registry),
            shared,
        }
    }
}

impl Default for MemoryCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// One session of the in-memory coordination service.
pub struct MemorySession {
    registry: Arc<Registry>,
    shared: Arc<SessionShared>,
}

impl MemorySession {
    fn check_alive(&self) -> Result<()> {
        if self.shared.expired.load(Ordering::SeqCst) {
            return Err(MembershipError::SessionLost);
        }
        if !self.shared.connected.load(Ordering::SeqCst) {
            return Err(MembershipError::Disconnected);
        }
        Ok(())
    }

    /// Simulates a transport drop. Ephemeral nodes survive; events stop
    /// being delivered until [`MemorySession::reconnect`].
    pub fn disconnect(&self) {
        self.shared.connected.store(false, Ordering::SeqCst);
        let _ = self.shared.tx.send(CoordEvent::Disconnected);
    }

    /// Re-establishes a dropped transport.
    pub fn reconnect(&self) {
        self.shared.connected.store(true, Ordering::SeqCst);
        let _ = self.shared.tx.send(CoordEvent::Reconnected);
    }

    /// Permanently expires the session, dropping its ephemeral nodes.
    pub fn expire(&self) {
        if self.shared.expired.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shared.connected.store(false, Ordering::SeqCst);
        let _ = self.shared.tx.send(CoordEvent::Expired);
        self.registry.sessions.remove(&self.shared.id);
        if self.registry.drop_ephemerals(self.shared.id) {
            self.registry.notify_children_changed();
        }
    }

    /// Gracefully ends the session, dropping its ephemeral nodes.
    pub fn close(&self) {
        self.expire();
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        self.close();
    }
}

#[async_trait]
impl Coordinator for MemorySession {
    async fn ensure_path(&self, path: &str) -> Result<()> {
        self.check_alive()?;
        self.registry
            .nodes
            .entry(path.to_string())
            .or_insert_with(|| NodeEntry {
                payload: Vec::new(),
                owner: None,
            });
        Ok(())
    }

    async fn register_ephemeral(&self, parent: &str, name: &str, payload: &[u8]) -> Result<()> {
        self.check_alive()?;
        if parent != "/" && !self.registry.nodes.contains_key(parent) {
            return Err(MembershipError::NoSuchPath(parent.to_string()));
        }
        let path = join_path(parent, name);
        self.registry.nodes.insert(
            path,
            NodeEntry {
                payload: payload.to_vec(),
                owner: Some(self.shared.id),
            },
        );
        self.registry.notify_children_changed();
        Ok(())
    }

    async fn children(&self, path: &str) -> Result<Vec<String>> {
        self.check_alive()?;
        if path != "/" && !self.registry.nodes.contains_key(path) {
            return Err(MembershipError::NoSuchPath(path.to_string()));
        }
        let prefix = if path.ends_with('/') {
            path.to_string()
        } else {
            format!("{}/", path)
        };
        let mut names: Vec<String> = self
            .registry
            .nodes
            .iter()
            .filter_map(|entry| {
                let rest = entry.key().strip_prefix(&prefix)?;
                if rest.is_empty() || rest.contains('/') {
                    None
                } else {
                    Some(rest.to_string())
                }
            })
            .collect();
        names.sort_unstable();
        Ok(names)
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        self.check_alive()?;
        self.registry
            .nodes
            .get(path)
            .map(|entry| entry.payload.clone())
            .ok_or_else(|| MembershipError::NoSuchPath(path.to_string()))
    }

    fn events(&self) -> broadcast::Receiver<CoordEvent> {
        self.shared.tx.subscribe()
    }
}
