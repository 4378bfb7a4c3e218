//! Error types for the core library.

use std::fmt;

/// Result type alias for the core library.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the core library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The ring holds no members; `locate` has nothing to route to.
    NoMembers,
    /// Invalid node URL
    InvalidNode(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NoMembers => write!(f, "ring has no members"),
            Error::InvalidNode(msg) => write!(f, "invalid node: {}", msg),
        }
    }
}

impl std::error::Error for Error {}
