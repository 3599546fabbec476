//! Per-handle staging buffer for whole-object files
//!
//! The remote store can only fetch or upload a file as a whole. A
//! [`FileBuffer`] fetches the content once, serves offset reads and writes from
//! memory, and uploads the full buffer again on flush.
//!
//! Writes are positioned at the absolute offset the caller passes; there is no
//! append-at-end mode and attribute-driven truncation is not supported. A
//! buffer never grows past its size limit, and growth that cannot be allocated
//! fails the write instead of the process.

use std::sync::Arc;

use bytes::Bytes;

use crate::cache::NodeCache;
use crate::error::{DriveError, Result};
use crate::node::{Node, NodeId};
use crate::remote::RemoteTree;

/// Largest file a buffer will hold unless configured otherwise (4 GiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 4 << 30;

/// Addressing for the node a buffer is bound to, captured at open time.
#[derive(Debug, Clone)]
struct Target {
    id: NodeId,
    zone: String,
    doc_id: String,
    filename: String,
    parent: Option<NodeId>,
}

/// In-memory copy of one open file.
pub struct FileBuffer {
    remote: Arc<dyn RemoteTree>,
    cache: Arc<NodeCache>,
    target: Target,
    data: Option<Vec<u8>>,
    dirty: bool,
    max_size: u64,
}

impl FileBuffer {
    /// Bind a new, not yet fetched buffer to `node`.
    pub fn open(node: &Node, remote: Arc<dyn RemoteTree>, cache: Arc<NodeCache>) -> Self {
        Self {
            remote,
            cache,
            target: Target {
                id: node.id.clone(),
                zone: node.zone.clone(),
                doc_id: node.doc_id.clone(),
                filename: node.filename(),
                parent: node.parent.clone(),
            },
            data: None,
            dirty: false,
            max_size: DEFAULT_MAX_FILE_SIZE,
        }
    }

    /// Cap the size writes may grow the file to.
    pub fn with_max_size(mut self, max_size: u64) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn node_id(&self) -> &NodeId {
        &self.target.id
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_fetched(&self) -> bool {
        self.data.is_some()
    }

    /// Length of the buffered content, if fetched.
    pub fn len(&self) -> Option<usize> {
        self.data.as_ref().map(Vec::len)
    }

    /// Fetch the remote content on first use; later calls are free.
    pub async fn ensure_fetched(&mut self) -> Result<&mut Vec<u8>> {
        if self.data.is_none() {
            let content = self
                .remote
                .fetch_content(&self.target.zone, &self.target.doc_id)
                .await?;
            tracing::debug!(
                node = %self.target.id,
                size = content.len(),
                "fetched file content"
            );
            self.data = Some(content.to_vec());
        }
        Ok(self.data.get_or_insert_with(Vec::new))
    }

    /// Bytes in `[offset, offset + len)`, clipped to the buffer. Reading at or
    /// past the end yields nothing.
    pub async fn read(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let data = self.ensure_fetched().await?;
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(data.len());
        let end = start.saturating_add(len).min(data.len());
        Ok(data[start..end].to_vec())
    }

    /// Splice `bytes` in at `offset`, zero-filling any gap past the current
    /// end. Returns the number of bytes written.
    ///
    /// Fails with [`DriveError::FileTooLarge`] when the write would end past
    /// the size limit, leaving the buffer untouched.
    pub async fn write(&mut self, offset: u64, bytes: &[u8]) -> Result<usize> {
        let limit = self.max_size;
        let requested = offset.saturating_add(bytes.len() as u64);
        let too_large = || DriveError::FileTooLarge { requested, limit };
        if requested > limit {
            return Err(too_large());
        }
        let start = usize::try_from(offset).map_err(|_| too_large())?;
        let end = usize::try_from(requested).map_err(|_| too_large())?;

        let data = self.ensure_fetched().await?;
        if end > data.len() {
            data.try_reserve(end - data.len())
                .map_err(|e| DriveError::OutOfMemory(e.to_string()))?;
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(bytes);
        self.dirty = true;
        Ok(bytes.len())
    }

    /// Upload the buffer if it has unsaved writes.
    ///
    /// On success the parent folder is invalidated so the next listing picks
    /// up the new size and timestamps. On failure the buffer stays dirty.
    pub async fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        let data = match &self.data {
            Some(data) => Bytes::copy_from_slice(data),
            None => return Ok(()),
        };
        let size = data.len();

        let target = self
            .remote
            .begin_upload(&self.target.zone, &self.target.filename)
            .await?;
        let receipt = self.remote.put_content(&target, data).await?;
        self.remote
            .commit_upload(&self.target.zone, &self.target.doc_id, &receipt)
            .await?;

        self.dirty = false;
        self.cache.record_upload(&self.target.id, size as u64);
        if let Some(parent) = &self.target.parent {
            self.cache.invalidate(parent);
        }
        tracing::info!(
            node = %self.target.id,
            filename = %self.target.filename,
            size = size,
            "flushed file"
        );
        Ok(())
    }
}

impl std::fmt::Debug for FileBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileBuffer")
            .field("node", &self.target.id)
            .field("filename", &self.target.filename)
            .field("fetched", &self.is_fetched())
            .field("len", &self.len())
            .field("dirty", &self.dirty)
            .field("max_size", &self.max_size)
            .finish()
    }
}
