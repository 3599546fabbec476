use clap::Parser;

mod cli;

use cli::{Cli, OpContext};
use drivefs_daemon::{init_logging, ServiceConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    let config = ServiceConfig::load(&args.config)?;
    let _log_guard = init_logging(config.log_dir.as_deref());

    let ctx = OpContext {
        config_path: args.config.clone(),
        config,
    };
    tracing::debug!(config = %ctx.config_path.display(), "loaded configuration");

    let output = args.command.execute(&ctx).await?;
    println!("{}", output);
    Ok(())
}
