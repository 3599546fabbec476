use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Args;

use crate::cli::op::{Op, OpContext};
use drivefs_daemon::{shutdown_on_signal, start_service, ServiceError};

#[derive(Args, Debug, Clone)]
pub struct Serve {
    /// Override the API listen address from the config file
    #[arg(long)]
    pub listen: Option<SocketAddr>,

    /// Override the plugin socket path. An empty path disables it.
    #[arg(long)]
    pub socket: Option<PathBuf>,
}

#[async_trait::async_trait]
impl Op for Serve {
    type Error = ServiceError;
    type Output = String;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let mut config = ctx.config.clone();
        if let Some(listen) = self.listen {
            config.listen_addr = listen;
        }
        if let Some(socket) = &self.socket {
            config.listen_socket = Some(socket.clone());
        }

        start_service(&config, shutdown_on_signal()).await?;
        Ok("service stopped".to_string())
    }
}
