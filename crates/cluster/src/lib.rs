//! Cluster node: the single-flight cache coordinator.
//!
//! Wires the consistent-hash ring, the single-flight dispatcher, and the
//! user-supplied fetch function behind one operation:
//! `fetch(key, params, force_this_node)`. Requests for a key deterministically
//! route to the key's owner node; concurrent requests collapse into one
//! upstream call whose result fans out to every waiter.

pub mod client;
pub mod config;
pub mod core;
pub mod error;
pub mod fetch;
pub mod http;
pub mod protocol;

pub use client::PeerClient;
pub use config::NodeConfig;
pub use core::ClusterNode;
pub use error::FetchError;
pub use fetch::{fetch_fn, Fetch};
pub use http::{router, serve, serve_with_shutdown};
pub use protocol::{ErrorBody, FetchRequest, FETCH_PATH};
