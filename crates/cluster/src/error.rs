//! Error types for cluster fetches.
//!
//! The enum is `Clone` so the dispatcher can fan one failure out to every
//! waiter of a flight.

use thiserror::Error;

/// Errors a `fetch` can surface to its caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// The ring holds no members yet; nothing to route to.
    #[error("ring has no members")]
    NoMembers,

    /// The owning peer could not be reached or answered garbage. Surfaced
    /// unchanged; callers may retry at a higher layer.
    #[error("owner {url} unreachable: {detail}")]
    OwnerUnreachable { url: String, detail: String },

    /// The user fetch function failed; propagated verbatim to every waiter.
    #[error("user fetch failed: {0}")]
    UserFetchFailed(String),

    /// The inbound request body could not be parsed.
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl FetchError {
    /// Stable kind tag used on the wire as `{"error": <kind>, ...}`.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::NoMembers => "NoMembers",
            FetchError::OwnerUnreachable { .. } => "OwnerUnreachable",
            FetchError::UserFetchFailed(_) => "UserFetchFailed",
            FetchError::BadRequest(_) => "BadRequest",
        }
    }

    /// Rebuilds the error a peer reported, so forwarding surfaces it
    /// unchanged. Unknown kinds return `None` and the caller falls back to
    /// [`FetchError::OwnerUnreachable`].
    pub fn from_wire(kind: &str, detail: String) -> Option<Self> {
        match kind {
            "NoMembers" => Some(FetchError::NoMembers),
            "UserFetchFailed" => Some(FetchError::UserFetchFailed(detail)),
            "BadRequest" => Some(FetchError::BadRequest(detail)),
            // A peer's own upstream failure still means this owner could
            // not produce the value.
            "OwnerUnreachable" => None,
            _ => None,
        }
    }
}

impl From<corelib::Error> for FetchError {
    fn from(err: corelib::Error) -> Self {
        match err {
            corelib::Error::NoMembers => FetchError::NoMembers,
            corelib::Error::InvalidNode(msg) => FetchError::BadRequest(msg),
        }
    }
}
