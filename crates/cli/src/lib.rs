//! CLI tool for running and inspecting the cache cluster.
//!
//! Provides commands for:
//! - Running a node with a static member list
//! - Running a multi-node demo cluster in one process
//! - Locating keys and describing ring topology

pub mod commands;
pub mod config;

pub use commands::Command;
pub use config::CliConfig;
