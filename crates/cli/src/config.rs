//! Top-level CLI argument parsing.

use crate::commands::Command;
use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "sfcache", about = "Single-flight distributed cache cluster")]
pub struct CliConfig {
    #[command(subcommand)]
    pub command: Command,
}

impl CliConfig {
    pub async fn run(self) -> anyhow::Result<()> {
        self.command.run().await
    }
}
