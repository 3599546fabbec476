use clap::{Args, Subcommand};
use url::Url;

use crate::cli::op::{Op, OpContext};
use drivefs_daemon::http_server::api::client::{ApiClient, ApiError};

#[derive(Args, Debug, Clone)]
pub struct Volume {
    /// Base URL of the running service (defaults to the configured listen address)
    #[arg(long, global = true)]
    pub api: Option<Url>,

    #[command(subcommand)]
    pub command: VolumeCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum VolumeCommand {
    /// List volumes
    Ls {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create a volume bound to a remote folder
    Create {
        name: String,
        /// Remote folder path, e.g. /Documents/project
        #[arg(long)]
        path: String,
    },
    /// Remove an unmounted volume
    Rm { name: String },
}

#[async_trait::async_trait]
impl Op for Volume {
    type Error = VolumeError;
    type Output = String;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let base = match &self.api {
            Some(url) => url.clone(),
            None => Url::parse(&format!("http://{}", ctx.config.listen_addr))?,
        };
        let client = ApiClient::new(&base)?;

        match &self.command {
            VolumeCommand::Ls { json } => {
                let volumes = client.list_volumes().await?;
                if *json {
                    return Ok(serde_json::to_string_pretty(&volumes)?);
                }
                if volumes.is_empty() {
                    return Ok("No volumes configured".to_string());
                }

                let mut output = String::new();
                output.push_str(&format!(
                    "{:<24} {:<40} {:<25}\n",
                    "NAME", "MOUNT POINT", "CREATED"
                ));
                output.push_str(&"-".repeat(90));
                output.push('\n');
                for volume in volumes {
                    output.push_str(&format!(
                        "{:<24} {:<40} {:<25}\n",
                        volume.name,
                        volume.mountpoint,
                        volume.created_at.as_deref().unwrap_or("-"),
                    ));
                }
                Ok(output)
            }
            VolumeCommand::Create { name, path } => {
                client.create_volume(name, path).await?;
                Ok(format!("created volume {} -> {}", name, path))
            }
            VolumeCommand::Rm { name } => {
                client.remove_volume(name).await?;
                Ok(format!("removed volume {}", name))
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum VolumeError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),
    #[error("invalid API url: {0}")]
    Url(#[from] url::ParseError),
    #[error("failed to encode output: {0}")]
    Json(#[from] serde_json::Error),
}
