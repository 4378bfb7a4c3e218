//! Error types for membership and discovery.

use thiserror::Error;

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, MembershipError>;

/// Errors that can occur talking to the coordination service.
#[derive(Debug, Clone, Error)]
pub enum MembershipError {
    /// The referenced path does not exist in the coordination service.
    #[error("coordination path {0} does not exist")]
    NoSuchPath(String),

    /// The session is currently disconnected; the operation may succeed
    /// after the client library reconnects.
    #[error("coordination session disconnected")]
    Disconnected,

    /// The session is permanently gone; ephemeral registrations with it.
    #[error("coordination session lost")]
    SessionLost,

    /// A member's registration payload was not a valid node URL.
    #[error("invalid member payload: {0}")]
    BadPayload(String),
}
