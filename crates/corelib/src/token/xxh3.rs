//! xxh3 hash token implementation.
//!
//! All nodes in a cluster must place keys with the same hash, so the token
//! family is fixed at the crate level rather than configured.

use crate::token::traits::Token;
use xxhash_rust::xxh3::xxh3_64;

/// xxh3 token using u64 representation.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Xxh3Token(pub u64);

impl Token for Xxh3Token {
    fn zero() -> Self {
        Xxh3Token(0)
    }

    fn max() -> Self {
        Xxh3Token(u64::MAX)
    }

    fn is_zero(&self) -> bool {
        self.0 == 0
    }

    fn is_max(&self) -> bool {
        self.0 == u64::MAX
    }

    fn distance_to(&self, other: &Self) -> Self {
        if other.0 >= self.0 {
            Xxh3Token(other.0 - self.0)
        } else {
            Xxh3Token((u64::MAX - self.0) + other.0 + 1)
        }
    }
}

impl Xxh3Token {
    /// Creates a token from a byte slice using xxh3 hashing.
    pub fn from_bytes(data: &[u8]) -> Self {
        Xxh3Token(xxh3_64(data))
    }

    /// Creates a token from a string key.
    pub fn from_key(key: &str) -> Self {
        Self::from_bytes(key.as_bytes())
    }
}
