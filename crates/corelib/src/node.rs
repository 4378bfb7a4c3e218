//! Node identity for the cluster.
//!
//! A node is identified by its reachable base URL (scheme + host + port).
//! Equality is plain string equality on that URL; the URL is also what gets
//! persisted as the node's ephemeral registration payload.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reachable base URL of a node, e.g. `http://cache-3:7001`.
///
/// Keep this cheap to clone; heavy mutable state (connections, in-flight
/// work) lives elsewhere.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeUrl(String);

impl NodeUrl {
    /// Parse a base URL, requiring an explicit scheme.
    pub fn parse(url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        let well_formed = matches!(
            url.split_once("://"),
            Some((scheme, rest)) if !scheme.is_empty() && !rest.is_empty()
        );
        if well_formed {
            Ok(Self(url))
        } else {
            Err(Error::InvalidNode(format!(
                "expected scheme://host:port, got {:?}",
                url
            )))
        }
    }

    /// The full URL string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The URL with its scheme stripped, suitable for socket binding.
    ///
    /// `http://cache-3:7001` becomes `cache-3:7001`.
    pub fn host_port(&self) -> &str {
        match self.0.split_once("://") {
            Some((_, rest)) => rest,
            None => &self.0,
        }
    }
}

impl fmt::Display for NodeUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NodeUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
