//! Shared setup for cache, buffer and monitor tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ::common::remote::memory::MemoryRemote;
use ::common::{
    ContinuationMarker, EntryNotifier, NodeCache, NodeId, RemoteError, RemoteFolder,
    RemoteTree, UploadReceipt, UploadTarget,
};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::Notify;

/// A drive laid out as:
///
/// ```text
/// /
/// ├── a/
/// │   └── c.md   ("nested")
/// └── b.txt      ("abc")
/// ```
pub struct TestDrive {
    pub remote: Arc<MemoryRemote>,
    pub cache: Arc<NodeCache>,
    pub root: NodeId,
    pub a: NodeId,
    pub b: NodeId,
    pub c: NodeId,
}

pub async fn setup_drive() -> TestDrive {
    let remote = Arc::new(MemoryRemote::new());
    let root = remote.root_id();
    let a = remote.add_folder(&root, "a");
    let b = remote.add_file(&root, "b", "txt", "abc");
    let c = remote.add_file(&a, "c", "md", "nested");

    let cache = Arc::new(NodeCache::new(remote.clone()));
    cache.get_root().await.unwrap();
    remote.reset_calls();

    TestDrive {
        remote,
        cache,
        root,
        a,
        b,
        c,
    }
}

/// Records every entry the monitor asks the bridge to drop.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    pub entries: Mutex<Vec<(NodeId, String)>>,
}

impl EntryNotifier for RecordingNotifier {
    fn invalidate_entry(&self, parent: &NodeId, name: &str) -> std::io::Result<()> {
        self.entries.lock().push((parent.clone(), name.to_string()));
        Ok(())
    }
}

/// A remote whose folder fetches can be held open.
///
/// Once armed, `fetch_node` reads the drive, signals `fetched`, and then waits
/// for `release` before returning what it read. Useful for landing changes
/// while a resolve is in flight.
pub struct GatedRemote {
    pub inner: Arc<MemoryRemote>,
    armed: AtomicBool,
    pub fetched: Notify,
    pub release: Notify,
}

impl GatedRemote {
    pub fn new(inner: Arc<MemoryRemote>) -> Self {
        Self {
            inner,
            armed: AtomicBool::new(false),
            fetched: Notify::new(),
            release: Notify::new(),
        }
    }

    pub fn arm(&self, armed: bool) {
        self.armed.store(armed, Ordering::SeqCst);
    }
}

#[async_trait]
impl RemoteTree for GatedRemote {
    fn root_id(&self) -> NodeId {
        self.inner.root_id()
    }

    async fn fetch_node(&self, id: &NodeId) -> Result<RemoteFolder, RemoteError> {
        let folder = self.inner.fetch_node(id).await;
        if self.armed.swap(false, Ordering::SeqCst) {
            self.fetched.notify_one();
            self.release.notified().await;
        }
        folder
    }

    async fn fetch_content(&self, zone: &str, doc_id: &str) -> Result<Bytes, RemoteError> {
        self.inner.fetch_content(zone, doc_id).await
    }

    async fn begin_upload(&self, zone: &str, filename: &str) -> Result<UploadTarget, RemoteError> {
        self.inner.begin_upload(zone, filename).await
    }

    async fn put_content(
        &self,
        target: &UploadTarget,
        data: Bytes,
    ) -> Result<UploadReceipt, RemoteError> {
        self.inner.put_content(target, data).await
    }

    async fn commit_upload(
        &self,
        zone: &str,
        doc_id: &str,
        receipt: &UploadReceipt,
    ) -> Result<(), RemoteError> {
        self.inner.commit_upload(zone, doc_id, receipt).await
    }

    async fn poll_change_feed(&self) -> Result<ContinuationMarker, RemoteError> {
        self.inner.poll_change_feed().await
    }

    async fn has_advanced(&self, marker: &ContinuationMarker) -> Result<bool, RemoteError> {
        self.inner.has_advanced(marker).await
    }
}
