//! Core of drivefs: a lazily materialized mirror of a remote drive tree.
//!
//! The remote store only offers whole-object fetch and whole-object upload, so
//! this crate keeps a partial, possibly stale view of the folder tree and
//! bridges offset-based file IO onto it.
//!
//! # Architecture
//!
//! - [`RemoteTree`]: the authenticated client interface to the remote drive
//! - [`NodeCache`]: flat table of [`Node`]s, resolved on demand and invalidated
//!   after writes or remote changes
//! - [`FileBuffer`]: per-open-handle staging area with whole-object flush
//! - [`StalenessMonitor`]: change-feed poller that invalidates the cached tree

pub mod buffer;
pub mod cache;
pub mod error;
pub mod monitor;
pub mod node;
pub mod remote;

pub use buffer::{FileBuffer, DEFAULT_MAX_FILE_SIZE};
pub use cache::NodeCache;
pub use error::{DriveError, RemoteError, Result};
pub use monitor::{ChangeFeed, EntryNotifier, StaleEvent, StalenessMonitor};
pub use node::{Node, NodeId, NodeKind};
pub use remote::{
    ContinuationMarker, MemoryRemote, RemoteFolder, RemoteItem, RemoteTree, UploadReceipt,
    UploadTarget,
};
