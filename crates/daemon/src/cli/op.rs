use std::path::PathBuf;

use drivefs_daemon::ServiceConfig;

/// Shared context passed to every command
#[derive(Debug, Clone)]
pub struct OpContext {
    pub config_path: PathBuf,
    pub config: ServiceConfig,
}

#[async_trait::async_trait]
pub trait Op: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;
    type Output: std::fmt::Display;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error>;
}
