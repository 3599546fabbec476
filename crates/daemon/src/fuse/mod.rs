//! FUSE filesystem integration for drive volumes
//!
//! Each mounted volume exposes one remote folder (and everything below it)
//! through the kernel.
//!
//! # Architecture
//!
//! - `MountManager`: volume records, live mounts and their lifecycle
//! - `FsAdapter`: inode/handle level operations over the shared `NodeCache`
//! - `DriveFs`: `fuser::Filesystem` bridge that drives the adapter
//! - `InodeTable`: bidirectional inode ↔ node id mapping
//! - `KernelNotifier`: drops kernel dentries when the staleness monitor
//!   invalidates the cached tree
//!
//! # Staleness
//!
//! Every live mount runs a `StalenessMonitor` on the mount root. When the
//! remote change feed advances, the subtree is invalidated in the cache and
//! the kernel is told to forget the entries it had looked up, so the next
//! access refetches from the remote.

mod adapter;
mod drive_fs;
mod inode_table;
mod mount_manager;
mod notifier;

pub use adapter::{DirEntry, EntryAttr, FsAdapter};
pub use drive_fs::{errno, DriveFs};
pub use inode_table::InodeTable;
pub use mount_manager::{
    prepare_mountpoint, FuseMounter, LiveMount, MountError, MountManager, MountManagerConfig,
    MountSession, Mounter,
};
pub use notifier::KernelNotifier;
