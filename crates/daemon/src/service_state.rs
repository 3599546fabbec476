use std::sync::Arc;

use url::Url;

use common::{NodeCache, RemoteTree};

use crate::database::{Database, DatabaseSetupError};
use crate::fuse::{MountManager, MountManagerConfig};
use crate::remote::{build_remote, RemoteSetupError};
use crate::service_config::Config;

/// Shared service state handed to every request handler
#[derive(Clone)]
pub struct State {
    database: Database,
    mount_manager: Arc<MountManager>,
}

impl State {
    pub async fn from_config(config: &Config) -> Result<Self, StateSetupError> {
        // 1. Setup database
        std::fs::create_dir_all(&config.state_dir).map_err(StateSetupError::StateDir)?;
        let sqlite_path = config.sqlite_path();
        let sqlite_database_url = Url::parse(&format!("sqlite://{}", sqlite_path.display()))
            .map_err(|_| StateSetupError::InvalidDatabaseUrl)?;
        tracing::info!("Database URL: {}", sqlite_database_url);
        let database = Database::connect(&sqlite_database_url).await?;

        // 2. Setup the remote drive client
        let remote = build_remote(&config.remote, &config.session_path())?;

        Ok(Self::new(database, remote, MountManagerConfig::from(config)))
    }

    /// Assemble state from an already connected database and remote
    pub fn new(database: Database, remote: Arc<dyn RemoteTree>, config: MountManagerConfig) -> Self {
        let cache = Arc::new(NodeCache::new(remote));
        let mount_manager = Arc::new(MountManager::new(database.clone(), cache, config));
        Self {
            database,
            mount_manager,
        }
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn mount_manager(&self) -> &Arc<MountManager> {
        &self.mount_manager
    }
}

impl AsRef<Database> for State {
    fn as_ref(&self) -> &Database {
        self.database()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateSetupError {
    #[error("failed to create state directory: {0}")]
    StateDir(std::io::Error),
    #[error("Database setup error")]
    DatabaseSetupError(#[from] DatabaseSetupError),
    #[error("Invalid database URL")]
    InvalidDatabaseUrl,
    #[error("remote setup error: {0}")]
    Remote(#[from] RemoteSetupError),
}
