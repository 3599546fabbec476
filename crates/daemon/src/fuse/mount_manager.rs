//! Volume lifecycle: records, live FUSE mounts and their staleness monitors
//!
//! A volume is mounted on its first `mount` and unmounted when the last user
//! releases it. The bookkeeping lock is never held while the remote path is
//! resolved or the filesystem is mounted; a mount that loses a race against a
//! concurrent one for the same volume is torn down again.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use fuser::{BackgroundSession, MountOption};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use common::{DriveError, EntryNotifier, NodeCache, NodeId, StalenessMonitor};

use super::adapter::FsAdapter;
use super::drive_fs::DriveFs;
use super::notifier::KernelNotifier;
use crate::database::models::Volume;
use crate::database::Database;
use crate::service_config::Config;

#[derive(Debug, Clone)]
pub struct MountManagerConfig {
    pub volume_root: PathBuf,
    pub poll_interval: Duration,
    pub entry_ttl: Duration,
    pub allow_other: bool,
}

impl From<&Config> for MountManagerConfig {
    fn from(config: &Config) -> Self {
        Self {
            volume_root: config.volume_root.clone(),
            poll_interval: config.poll_interval(),
            entry_ttl: config.entry_ttl(),
            allow_other: config.allow_other,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MountError {
    #[error(transparent)]
    Drive(#[from] DriveError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl MountError {
    fn state(msg: impl Into<String>) -> Self {
        MountError::Drive(DriveError::State(msg.into()))
    }
}

/// A running filesystem session for one mount
pub trait MountSession: Send {
    /// Unmount and wait for the session to exit. Blocks.
    fn join(self: Box<Self>);
}

impl MountSession for BackgroundSession {
    fn join(self: Box<Self>) {
        BackgroundSession::join(*self)
    }
}

/// Attaches an adapter to a mountpoint
pub trait Mounter: Send + Sync {
    /// Start serving `adapter` at `mountpoint`, returning the session and the
    /// notifier the staleness monitor reports to
    fn mount(
        &self,
        name: &str,
        mountpoint: &Path,
        adapter: Arc<FsAdapter>,
        config: &MountManagerConfig,
    ) -> Result<(Box<dyn MountSession>, Arc<dyn EntryNotifier>), MountError>;
}

/// Mounts through the kernel with `fuser`
#[derive(Debug, Default, Clone, Copy)]
pub struct FuseMounter;

impl Mounter for FuseMounter {
    fn mount(
        &self,
        name: &str,
        mountpoint: &Path,
        adapter: Arc<FsAdapter>,
        config: &MountManagerConfig,
    ) -> Result<(Box<dyn MountSession>, Arc<dyn EntryNotifier>), MountError> {
        let fs = DriveFs::new(adapter.clone(), config.entry_ttl);

        let mut options = vec![
            MountOption::FSName(format!("drivefs:{}", name)),
            MountOption::Subtype("drivefs".to_string()),
            MountOption::NoAtime,
        ];
        if config.allow_other {
            options.push(MountOption::AllowOther);
        }
        let session = fuser::spawn_mount2(fs, mountpoint, &options)?;
        let notifier: Arc<dyn EntryNotifier> =
            Arc::new(KernelNotifier::new(session.notifier(), adapter));
        let session: Box<dyn MountSession> = Box::new(session);
        Ok((session, notifier))
    }
}

/// A mounted volume
pub struct LiveMount {
    pub mountpoint: PathBuf,
    pub root: NodeId,
    /// Number of outstanding mount requests
    pub refs: usize,
    adapter: Arc<FsAdapter>,
    session: Box<dyn MountSession>,
    cancel: CancellationToken,
    monitor: JoinHandle<()>,
}

impl LiveMount {
    /// Mount `root` at `mountpoint` and start its staleness monitor
    pub fn start(
        mounter: &dyn Mounter,
        cache: Arc<NodeCache>,
        name: &str,
        root: NodeId,
        mountpoint: PathBuf,
        config: &MountManagerConfig,
    ) -> Result<Self, MountError> {
        let adapter = Arc::new(FsAdapter::new(cache.clone(), root.clone()));
        let (session, notifier) = mounter.mount(name, &mountpoint, adapter.clone(), config)?;

        let cancel = CancellationToken::new();
        let monitor = StalenessMonitor::new(cache, root.clone(), notifier)
            .with_interval(config.poll_interval)
            .spawn(cancel.clone());

        Ok(Self {
            mountpoint,
            root,
            refs: 1,
            adapter,
            session,
            cancel,
            monitor,
        })
    }

    pub fn adapter(&self) -> &Arc<FsAdapter> {
        &self.adapter
    }

    /// Stop the monitor and unmount
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.monitor.await {
            tracing::warn!(error = %e, "staleness monitor task failed");
        }
        let mountpoint = self.mountpoint;
        let session = self.session;
        // join() blocks until the session thread exits
        if let Err(e) = tokio::task::spawn_blocking(move || session.join()).await {
            tracing::warn!(mountpoint = %mountpoint.display(), error = %e, "failed to join fuse session");
        }
    }
}

impl std::fmt::Debug for LiveMount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveMount")
            .field("mountpoint", &self.mountpoint)
            .field("root", &self.root)
            .field("refs", &self.refs)
            .finish()
    }
}

pub struct MountManager {
    database: Database,
    cache: Arc<NodeCache>,
    config: MountManagerConfig,
    mounter: Arc<dyn Mounter>,
    mounts: Mutex<HashMap<String, LiveMount>>,
}

impl MountManager {
    pub fn new(database: Database, cache: Arc<NodeCache>, config: MountManagerConfig) -> Self {
        Self {
            database,
            cache,
            config,
            mounter: Arc::new(FuseMounter),
            mounts: Mutex::new(HashMap::new()),
        }
    }

    /// Replace how volumes are attached to their mountpoints
    pub fn with_mounter(mut self, mounter: Arc<dyn Mounter>) -> Self {
        self.mounter = mounter;
        self
    }

    pub fn cache(&self) -> &Arc<NodeCache> {
        &self.cache
    }

    /// Local mountpoint for a volume name
    pub fn mountpoint_for(&self, name: &str) -> PathBuf {
        self.config.volume_root.join(name)
    }

    /// Record a volume bound to a remote folder path
    pub async fn create(&self, name: &str, remote_path: Option<&str>) -> Result<Volume, MountError> {
        let remote_path = remote_path
            .filter(|p| !p.is_empty())
            .ok_or_else(|| MountError::state("'path' is required"))?;
        if name.is_empty() || name.contains('/') {
            return Err(MountError::state(format!("invalid volume name {:?}", name)));
        }

        let mountpoint = self.mountpoint_for(name);
        let volume = self
            .database
            .create_volume(name, remote_path, &mountpoint.to_string_lossy())
            .await?;
        tracing::info!(volume = %name, path = %remote_path, "created volume");
        Ok(volume)
    }

    pub async fn get(&self, name: &str) -> Result<Volume, MountError> {
        self.database
            .get_volume(name)
            .await?
            .ok_or_else(|| MountError::state(format!("volume {} not found", name)))
    }

    pub async fn list(&self) -> Result<Vec<Volume>, MountError> {
        Ok(self.database.list_volumes().await?)
    }

    /// Delete a volume that is not currently mounted
    pub async fn remove(&self, name: &str) -> Result<(), MountError> {
        let volume = self.get(name).await?;
        if self.mounts.lock().contains_key(name) {
            return Err(MountError::state(format!(
                "volume {} is currently in use",
                name
            )));
        }

        match std::fs::remove_dir_all(&volume.mount_point) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.database.delete_volume(name).await?;
        tracing::info!(volume = %name, "removed volume");
        Ok(())
    }

    /// Reference count of a mounted volume, `None` when it is not mounted
    pub fn refs(&self, name: &str) -> Option<usize> {
        self.mounts.lock().get(name).map(|live| live.refs)
    }

    /// Mount a volume, or add a reference to an existing mount
    pub async fn mount(&self, name: &str) -> Result<PathBuf, MountError> {
        if let Some(live) = self.mounts.lock().get_mut(name) {
            live.refs += 1;
            tracing::debug!(volume = %name, refs = live.refs, "volume already mounted");
            return Ok(live.mountpoint.clone());
        }

        let volume = self.get(name).await?;
        let mountpoint = PathBuf::from(&volume.mount_point);
        prepare_mountpoint(&mountpoint)?;

        let root = self.cache.node_by_path(&volume.remote_path).await?;
        if !root.is_dir() {
            return Err(MountError::state(format!(
                "{} is not a folder",
                volume.remote_path
            )));
        }
        let live = LiveMount::start(
            self.mounter.as_ref(),
            self.cache.clone(),
            name,
            root.id,
            mountpoint.clone(),
            &self.config,
        )?;

        let duplicate = match self.mounts.lock().entry(name.to_string()) {
            Entry::Occupied(mut existing) => {
                existing.get_mut().refs += 1;
                Some((live, existing.get().mountpoint.clone()))
            }
            Entry::Vacant(slot) => {
                slot.insert(live);
                None
            }
        };

        match duplicate {
            Some((live, existing)) => {
                tracing::debug!(volume = %name, "concurrent mount won, discarding duplicate");
                live.stop().await;
                Ok(existing)
            }
            None => {
                tracing::info!(volume = %name, mountpoint = %mountpoint.display(), "mounted volume");
                Ok(mountpoint)
            }
        }
    }

    /// Drop one reference; the last one unmounts the volume
    pub async fn unmount(&self, name: &str) -> Result<(), MountError> {
        self.get(name).await?;

        let live = {
            let mut mounts = self.mounts.lock();
            let Some(live) = mounts.get_mut(name) else {
                return Err(MountError::state(format!("volume {} is not mounted", name)));
            };
            live.refs = live.refs.saturating_sub(1);
            if live.refs > 0 {
                tracing::debug!(volume = %name, refs = live.refs, "volume still in use");
                return Ok(());
            }
            mounts.remove(name)
        };

        if let Some(live) = live {
            live.stop().await;
            tracing::info!(volume = %name, "unmounted volume");
        }
        Ok(())
    }

    /// Unmount every volume regardless of reference counts
    pub async fn unmount_all(&self) {
        let mounts: Vec<_> = self.mounts.lock().drain().collect();
        for (name, live) in mounts {
            live.stop().await;
            tracing::info!(volume = %name, "unmounted volume");
        }
    }
}

impl std::fmt::Debug for MountManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountManager")
            .field("config", &self.config)
            .field("mounts", &self.mounts.lock().len())
            .finish()
    }
}

/// Create the mountpoint directory if needed
pub fn prepare_mountpoint(path: &Path) -> Result<(), MountError> {
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(MountError::state(format!(
            "{} already exists and is not a directory",
            path.display()
        ))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            std::fs::create_dir_all(path)?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_mountpoint_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("volumes").join("docs");

        prepare_mountpoint(&path).unwrap();
        assert!(path.is_dir());
        // Existing directories are fine
        prepare_mountpoint(&path).unwrap();
    }

    #[test]
    fn test_prepare_mountpoint_rejects_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docs");
        std::fs::write(&path, b"x").unwrap();

        let err = prepare_mountpoint(&path).unwrap_err();
        assert!(matches!(err, MountError::Drive(DriveError::State(_))));
    }
}
