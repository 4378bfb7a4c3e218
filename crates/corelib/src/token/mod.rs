//! Token abstraction for the hash ring.
//!
//! Tokens represent positions on the ring and must be comparable,
//! hashable, and thread-safe.

pub mod traits;
pub mod xxh3;

pub use traits::Token;
pub use xxh3::Xxh3Token;
