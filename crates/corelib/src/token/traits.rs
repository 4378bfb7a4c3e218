//! Core token trait definition.

use std::fmt::Debug;
use std::hash::Hash;

/// Represents a position token on the hash ring.
///
/// Tokens are immutable values in a dense unsigned token space. They must be:
/// - **Comparable**: to determine ordering on the ring
/// - **Hashable**: for efficient lookups and storage
/// - **Thread-safe**: for concurrent access patterns
pub trait Token: Clone + Copy + Debug + Eq + Hash + Ord + Send + Sync + 'static {
    /// The minimum token value.
    fn zero() -> Self;

    /// The maximum token value.
    fn max() -> Self;

    /// Whether this is the minimum token.
    fn is_zero(&self) -> bool;

    /// Whether this is the maximum token.
    fn is_max(&self) -> bool;

    /// Distance to another token, always measured in the forward direction
    /// around the ring (`self` -> `other`), wrapping past the maximum.
    fn distance_to(&self, other: &Self) -> Self;
}
