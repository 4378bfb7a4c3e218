//! Service discovery.
//!
//! Each node registers its own URL as an ephemeral child under a root path
//! and watches the root's children. Every change re-lists the children,
//! reads each member's URL, and hands the assembled snapshot to the
//! `on_members_changed` callback, in practice the ring's reset entry
//! point. Discovery holds only that callback; neither component owns the
//! other.

use crate::coordinator::{join_path, CoordEvent, Coordinator};
use crate::error::{MembershipError, Result};
use crate::snapshot::MembershipSnapshot;
use corelib::token::Xxh3Token;
use corelib::NodeUrl;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Callback invoked with every membership snapshot.
pub type MembersChanged = Arc<dyn Fn(MembershipSnapshot) + Send + Sync>;

/// Lifecycle of a discovery watcher.
///
/// `Uninitialised -> Registered -> Watching <-> Disconnected -> Closed`.
/// A permanently lost session parks the watcher in `Disconnected`: the last
/// snapshot stays in effect and no further updates are delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryState {
    Uninitialised,
    Registered,
    Watching,
    Disconnected,
    Closed,
}

/// Watches the coordination service and emits membership snapshots.
pub struct ServiceDiscovery {
    state: Arc<Mutex<DiscoveryState>>,
    watch_task: JoinHandle<()>,
}

impl ServiceDiscovery {
    /// Registers `this_host` under `root_path` and starts watching.
    ///
    /// The callback is invoked once with the current snapshot before this
    /// returns, so the ring is usable before the first external change.
    pub async fn start(
        coordinator: Arc<dyn Coordinator>,
        root_path: &str,
        this_host: NodeUrl,
        on_members_changed: impl Fn(MembershipSnapshot) + Send + Sync + 'static,
    ) -> Result<Self> {
        let state = Arc::new(Mutex::new(DiscoveryState::Uninitialised));
        let on_members_changed: MembersChanged = Arc::new(on_members_changed);

        coordinator.ensure_path(root_path).await?;
        // One process serves one URL, so a URL-derived name is unique.
        let member_name = format!("member-{:016x}", Xxh3Token::from_key(this_host.as_str()).0);
        coordinator
            .register_ephemeral(root_path, &member_name, this_host.as_str().as_bytes())
            .await?;
        *state.lock() = DiscoveryState::Registered;
        tracing::info!(host = %this_host, root = root_path, "registered in coordination service");

        // Subscribe before the first pull so no change slips between them.
        let events = coordinator.events();
        let last_version = Arc::new(AtomicU64::new(0));

        let members = pull_members(coordinator.as_ref(), root_path).await?;
        (*on_members_changed)(MembershipSnapshot::new(
            members,
            last_version.load(Ordering::SeqCst),
        ));
        *state.lock() = DiscoveryState::Watching;

        let watch_task = tokio::spawn(watch_loop(
            coordinator,
            root_path.to_string(),
            Arc::clone(&state),
            last_version,
            Arc::clone(&on_members_changed),
            events,
        ));

        Ok(Self { state, watch_task })
    }

    pub fn state(&self) -> DiscoveryState {
        *self.state.lock()
    }

    /// Stops watching. The ephemeral registration disappears when the
    /// session ends.
    pub fn shutdown(&self) {
        *self.state.lock() = DiscoveryState::Closed;
        self.watch_task.abort();
        tracing::info!("discovery closed");
    }
}

impl Drop for ServiceDiscovery {
    fn drop(&mut self) {
        self.watch_task.abort();
    }
}

async fn watch_loop(
    coordinator: Arc<dyn Coordinator>,
    root_path: String,
    state: Arc<Mutex<DiscoveryState>>,
    last_version: Arc<AtomicU64>,
    on_members_changed: MembersChanged,
    mut events: broadcast::Receiver<CoordEvent>,
) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                tracing::warn!(missed, "discovery event stream lagged, re-pulling");
                refresh(&*coordinator, &root_path, &last_version, &on_members_changed).await;
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => {
                tracing::warn!("coordination event stream closed");
                *state.lock() = DiscoveryState::Disconnected;
                return;
            }
        };

        match event {
            CoordEvent::ChildrenChanged { version } => {
                last_version.fetch_max(version, Ordering::SeqCst);
                refresh(&*coordinator, &root_path, &last_version, &on_members_changed).await;
                *state.lock() = DiscoveryState::Watching;
            }
            CoordEvent::Disconnected => {
                tracing::warn!("coordination session disconnected; ring frozen at last snapshot");
                *state.lock() = DiscoveryState::Disconnected;
            }
            CoordEvent::Reconnected => {
                tracing::info!("coordination session reconnected, re-pulling members");
                refresh(&*coordinator, &root_path, &last_version, &on_members_changed).await;
                *state.lock() = DiscoveryState::Watching;
            }
            CoordEvent::Expired => {
                // Terminal: the last snapshot stays in effect.
                tracing::error!(
                    "coordination session lost; membership updates stopped, \
                     subsequent fetches may route to stale owners"
                );
                *state.lock() = DiscoveryState::Disconnected;
                return;
            }
        }
    }
}

/// Pulls the current member set and invokes the callback. Pull failures
/// keep the previous snapshot in effect.
async fn refresh(
    coordinator: &dyn Coordinator,
    root_path: &str,
    last_version: &AtomicU64,
    on_members_changed: &MembersChanged,
) {
    match pull_members(coordinator, root_path).await {
        Ok(members) => {
            let snapshot = MembershipSnapshot::new(members, last_version.load(Ordering::SeqCst));
            tracing::debug!(snapshot = %snapshot, "membership changed");
            (**on_members_changed)(snapshot);
        }
        Err(err) => {
            tracing::warn!(error = %err, "failed to pull members, keeping last snapshot");
        }
    }
}

/// Lists the root's children and reads each member's URL payload.
async fn pull_members(coordinator: &dyn Coordinator, root_path: &str) -> Result<HashSet<NodeUrl>> {
    let children = coordinator.children(root_path).await?;
    let mut members = HashSet::with_capacity(children.len());
    for child in children {
        let path = join_path(root_path, &child);
        // A child can vanish between the list and the read; skip it, the
        // removal fires its own change event.
        let payload = match coordinator.read(&path).await {
            Ok(payload) => payload,
            Err(MembershipError::NoSuchPath(_)) => continue,
            Err(err) => return Err(err),
        };
        let url = String::from_utf8(payload)
            .map_err(|err| MembershipError::BadPayload(err.to_string()))?;
        let url = NodeUrl::parse(url).map_err(|err| MembershipError::BadPayload(err.to_string()))?;
        members.insert(url);
    }
    Ok(members)
}
