//! Core library for the single-flight cache cluster.
//!
//! This crate provides the fundamental abstractions for key routing:
//! - Token types and implementations
//! - Partitioner algorithms
//! - Node identity (reachable base URLs)
//! - The consistent hash ring and its topology view

pub mod error;
pub mod node;
pub mod partitioner;
pub mod ring;
pub mod token;
pub mod topology;

pub use error::{Error, Result};
pub use node::NodeUrl;
pub use partitioner::Partitioner;
pub use ring::{HashRing, RingBuilder, DEFAULT_VNODES};
pub use token::Token;
pub use topology::Topology;
