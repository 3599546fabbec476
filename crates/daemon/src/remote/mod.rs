//! Remote tree clients used by the daemon
//!
//! [`DriveClient`] talks to the drive web services over HTTP using a session
//! record produced by an external login flow. [`build_remote`] picks the
//! client described by the service configuration.

use std::path::Path;
use std::sync::Arc;

use common::{MemoryRemote, RemoteTree};

use crate::service_config::{RemoteConfig, RemoteKind};

mod client;
mod session;

pub use client::DriveClient;
pub use session::{SessionError, SessionRecord, SESSION_FILE_NAME};

#[derive(Debug, thiserror::Error)]
pub enum RemoteSetupError {
    #[error("session error: {0}")]
    Session(#[from] SessionError),
    #[error("remote client error: {0}")]
    Client(#[from] common::RemoteError),
}

/// Build the remote client named by the configuration
pub fn build_remote(
    config: &RemoteConfig,
    session_path: &Path,
) -> Result<Arc<dyn RemoteTree>, RemoteSetupError> {
    match config.kind {
        RemoteKind::Http => {
            let session = SessionRecord::load(session_path)?;
            if session.is_none() {
                tracing::warn!(
                    path = %session_path.display(),
                    "no drive session found, remote calls will fail until one is provided"
                );
            }
            Ok(Arc::new(DriveClient::new(config, session)?))
        }
        RemoteKind::Memory => {
            tracing::info!("using in-memory drive");
            Ok(Arc::new(MemoryRemote::new()))
        }
    }
}
