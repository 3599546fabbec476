use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;

use crate::cli::op::{Op, OpContext};
use common::{DriveError, NodeCache};
use drivefs_daemon::fuse::{
    prepare_mountpoint, FuseMounter, LiveMount, MountError, MountManagerConfig,
};
use drivefs_daemon::remote::{build_remote, RemoteSetupError};
use drivefs_daemon::shutdown_on_signal;

#[derive(Args, Debug, Clone)]
pub struct Mount {
    /// Local directory to mount on
    pub mountpoint: PathBuf,

    /// Remote folder to expose, relative to the drive root
    #[arg(long, default_value = "/")]
    pub path: String,
}

#[async_trait::async_trait]
impl Op for Mount {
    type Error = ForegroundMountError;
    type Output = String;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let config = &ctx.config;
        let remote = build_remote(&config.remote, &config.session_path())?;
        let cache = Arc::new(NodeCache::new(remote));

        prepare_mountpoint(&self.mountpoint)?;
        let root = cache.node_by_path(&self.path).await?;
        if !root.is_dir() {
            return Err(MountError::from(DriveError::State(format!(
                "{} is not a folder",
                self.path
            )))
            .into());
        }

        let name = self
            .mountpoint
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "root".to_string());
        let live = LiveMount::start(
            &FuseMounter,
            cache,
            &name,
            root.id,
            self.mountpoint.clone(),
            &MountManagerConfig::from(config),
        )?;
        tracing::info!(
            path = %self.path,
            mountpoint = %self.mountpoint.display(),
            "mounted, press ctrl-c to unmount"
        );

        shutdown_on_signal().cancelled().await;
        live.stop().await;
        Ok(format!("unmounted {}", self.mountpoint.display()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ForegroundMountError {
    #[error("remote setup error: {0}")]
    Remote(#[from] RemoteSetupError),
    #[error("drive error: {0}")]
    Drive(#[from] DriveError),
    #[error("mount error: {0}")]
    Mount(#[from] MountError),
}
