//! Filesystem operations over the node cache
//!
//! The adapter speaks in inodes and file handles but knows nothing about the
//! kernel protocol; [`super::DriveFs`] forwards `fuser` callbacks here and
//! converts the results into replies.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::{Mutex, RwLock};

use common::{DriveError, FileBuffer, Node, NodeCache, NodeId, NodeKind, Result};

use super::inode_table::InodeTable;

/// Attributes of one node as seen through the mount
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryAttr {
    pub ino: u64,
    pub kind: NodeKind,
    pub size: u64,
    pub mtime: SystemTime,
    pub ctime: SystemTime,
}

/// One directory listing entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub ino: u64,
    pub kind: NodeKind,
    pub name: String,
}

type Handle = Arc<tokio::sync::Mutex<FileBuffer>>;

pub struct FsAdapter {
    cache: Arc<NodeCache>,
    inodes: RwLock<InodeTable>,
    handles: Mutex<HashMap<u64, Handle>>,
    next_fh: AtomicU64,
}

impl FsAdapter {
    /// Serve the subtree below `root`, which becomes inode 1
    pub fn new(cache: Arc<NodeCache>, root: NodeId) -> Self {
        Self {
            cache,
            inodes: RwLock::new(InodeTable::new(root)),
            handles: Mutex::new(HashMap::new()),
            next_fh: AtomicU64::new(1),
        }
    }

    pub fn cache(&self) -> &Arc<NodeCache> {
        &self.cache
    }

    pub fn root(&self) -> NodeId {
        self.inodes.read().root().clone()
    }

    /// Inode previously handed out for a node, if any
    pub fn inode_of(&self, id: &NodeId) -> Option<u64> {
        self.inodes.read().get_inode(id)
    }

    pub fn open_handles(&self) -> usize {
        self.handles.lock().len()
    }

    pub async fn lookup(&self, parent: u64, name: &str) -> Result<EntryAttr> {
        let parent_id = self.node_id(parent)?;
        let node = self.cache.lookup(&parent_id, name).await?;
        Ok(self.attr(&node))
    }

    pub async fn getattr(&self, ino: u64) -> Result<EntryAttr> {
        let id = self.node_id(ino)?;
        let node = self.cache.get(&id)?;
        Ok(self.attr(&node))
    }

    /// Inode of the folder containing `ino`, as reported for `..`.
    ///
    /// The mount root and nodes whose parent was never handed out resolve to
    /// the root inode.
    pub fn parent_inode(&self, ino: u64) -> Result<u64> {
        let id = self.node_id(ino)?;
        let inodes = self.inodes.read();
        if &id == inodes.root() {
            return Ok(InodeTable::ROOT_INODE);
        }
        let node = self.cache.get(&id)?;
        Ok(node
            .parent
            .as_ref()
            .and_then(|parent| inodes.get_inode(parent))
            .unwrap_or(InodeTable::ROOT_INODE))
    }

    /// Size and time changes are accepted and ignored
    pub async fn setattr(&self, ino: u64) -> Result<EntryAttr> {
        self.getattr(ino).await
    }

    pub async fn readdir(&self, ino: u64) -> Result<Vec<DirEntry>> {
        let id = self.node_id(ino)?;
        let children = self.cache.children(&id).await?;
        let mut inodes = self.inodes.write();
        Ok(children
            .into_iter()
            .map(|child| DirEntry {
                ino: inodes.register(&child.id),
                kind: child.kind,
                name: child.filename(),
            })
            .collect())
    }

    /// Open a file and return a fresh handle. Content is fetched on first use.
    pub async fn open(&self, ino: u64) -> Result<u64> {
        let id = self.node_id(ino)?;
        let node = self.cache.get(&id)?;
        if node.is_dir() {
            return Err(DriveError::State(format!("{} is a directory", node.filename())));
        }

        let buffer = FileBuffer::open(&node, self.cache.remote().clone(), self.cache.clone());
        let fh = self.next_fh.fetch_add(1, Ordering::Relaxed);
        self.handles
            .lock()
            .insert(fh, Arc::new(tokio::sync::Mutex::new(buffer)));
        tracing::debug!(ino, fh, file = %node.filename(), "opened file");
        Ok(fh)
    }

    pub async fn read(&self, fh: u64, offset: u64, size: usize) -> Result<Vec<u8>> {
        let handle = self.handle(fh)?;
        let mut buffer = handle.lock().await;
        buffer.read(offset, size).await
    }

    pub async fn write(&self, fh: u64, offset: u64, data: &[u8]) -> Result<usize> {
        let handle = self.handle(fh)?;
        let mut buffer = handle.lock().await;
        buffer.write(offset, data).await
    }

    pub async fn flush(&self, fh: u64) -> Result<()> {
        let handle = self.handle(fh)?;
        let mut buffer = handle.lock().await;
        buffer.flush().await
    }

    /// Drop a handle without flushing it
    pub fn release(&self, fh: u64) -> Result<()> {
        let handle = self
            .handles
            .lock()
            .remove(&fh)
            .ok_or_else(|| DriveError::State(format!("unknown file handle {}", fh)))?;
        if let Ok(buffer) = handle.try_lock() {
            if buffer.is_dirty() {
                tracing::warn!(fh, node = %buffer.node_id(), "released handle with unflushed writes");
            }
        }
        Ok(())
    }

    fn node_id(&self, ino: u64) -> Result<NodeId> {
        self.inodes
            .read()
            .get_id(ino)
            .cloned()
            .ok_or_else(|| DriveError::State(format!("unknown inode {}", ino)))
    }

    fn handle(&self, fh: u64) -> Result<Handle> {
        self.handles
            .lock()
            .get(&fh)
            .cloned()
            .ok_or_else(|| DriveError::State(format!("unknown file handle {}", fh)))
    }

    fn attr(&self, node: &Node) -> EntryAttr {
        let ino = self.inodes.write().register(&node.id);
        EntryAttr {
            ino,
            kind: node.kind,
            size: node.size,
            mtime: node.date_changed.into(),
            ctime: node.date_created.into(),
        }
    }
}

impl std::fmt::Debug for FsAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsAdapter")
            .field("root", &self.root())
            .field("inodes", &self.inodes.read().len())
            .field("handles", &self.open_handles())
            .finish()
    }
}
