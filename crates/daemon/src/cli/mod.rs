use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub mod op;
pub mod ops;

pub use op::{Op, OpContext};

#[derive(Parser, Debug)]
#[command(name = "drivefs", version, about = "Remote drive volumes over FUSE")]
pub struct Cli {
    /// Path to the TOML configuration file
    #[arg(
        long,
        short,
        global = true,
        env = "DRIVEFS_CONFIG",
        default_value = "/etc/drivefs/config.toml"
    )]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the volume plugin service
    Serve(ops::Serve),
    /// Mount a remote folder in the foreground until interrupted
    Mount(ops::Mount),
    /// Manage volumes on a running service
    Volume(ops::Volume),
}

impl Command {
    pub async fn execute(&self, ctx: &OpContext) -> anyhow::Result<String> {
        Ok(match self {
            Command::Serve(op) => op.execute(ctx).await?.to_string(),
            Command::Mount(op) => op.execute(ctx).await?.to_string(),
            Command::Volume(op) => op.execute(ctx).await?.to_string(),
        })
    }
}
