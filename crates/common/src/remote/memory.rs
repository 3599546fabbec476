//! Ephemeral in-process drive
//!
//! Implements [`RemoteTree`] over an in-memory folder tree. Used for trial
//! mounts that should not touch a real account, and by tests, which can count
//! calls per operation and inject failures.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use parking_lot::Mutex;

use super::{
    ContinuationMarker, RemoteFolder, RemoteItem, RemoteTree, UploadReceipt, UploadTarget,
};
use crate::error::RemoteError;
use crate::node::NodeId;

const ROOT_ID: &str = "FOLDER::memory::root";
const ZONE: &str = "memory";

/// Remote operations, for call accounting and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    FetchNode,
    FetchContent,
    BeginUpload,
    PutContent,
    CommitUpload,
    PollChangeFeed,
    HasAdvanced,
}

#[derive(Debug)]
struct Entry {
    item: RemoteItem,
    children: Vec<NodeId>,
    content: Bytes,
}

#[derive(Debug, Default)]
struct Drive {
    entries: HashMap<NodeId, Entry>,
    by_doc: HashMap<String, NodeId>,
    staged: HashMap<String, Bytes>,
    next_id: u64,
    generation: u64,
}

impl Drive {
    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory [`RemoteTree`].
#[derive(Debug)]
pub struct MemoryRemote {
    root: NodeId,
    drive: Mutex<Drive>,
    calls: Mutex<HashMap<Operation, usize>>,
    failing: Mutex<HashSet<Operation>>,
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRemote {
    /// Create a drive containing only an empty root folder.
    pub fn new() -> Self {
        let root = NodeId::new(ROOT_ID);
        let mut drive = Drive::default();
        let now = Utc::now();
        drive.entries.insert(
            root.clone(),
            Entry {
                item: RemoteItem {
                    id: root.clone(),
                    zone: ZONE.to_string(),
                    doc_id: "root".to_string(),
                    name: "root".to_string(),
                    extension: None,
                    size: 0,
                    etag: "0".to_string(),
                    date_created: now,
                    date_changed: now,
                },
                children: Vec::new(),
                content: Bytes::new(),
            },
        );

        Self {
            root,
            drive: Mutex::new(drive),
            calls: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
        }
    }

    /// Add a folder under `parent` and return its id.
    pub fn add_folder(&self, parent: &NodeId, name: &str) -> NodeId {
        self.insert(parent, name, None, Bytes::new())
    }

    /// Add a file `name.extension` under `parent` and return its id.
    pub fn add_file(
        &self,
        parent: &NodeId,
        name: &str,
        extension: &str,
        content: impl Into<Bytes>,
    ) -> NodeId {
        self.insert(parent, name, Some(extension), content.into())
    }

    /// Remove an entry from its parent folder. The change feed advances.
    pub fn remove(&self, id: &NodeId) {
        let mut drive = self.drive.lock();
        if let Some(entry) = drive.entries.remove(id) {
            drive.by_doc.remove(&entry.item.doc_id);
        }
        for entry in drive.entries.values_mut() {
            entry.children.retain(|child| child != id);
        }
        drive.generation += 1;
    }

    /// Current content of a file.
    pub fn content(&self, id: &NodeId) -> Option<Bytes> {
        self.drive
            .lock()
            .entries
            .get(id)
            .map(|entry| entry.content.clone())
    }

    /// Simulate a change made by another client: advances the change feed.
    pub fn touch(&self) {
        self.drive.lock().generation += 1;
    }

    /// Make every subsequent call of `op` fail (or succeed again).
    pub fn set_failing(&self, op: Operation, failing: bool) {
        let mut set = self.failing.lock();
        if failing {
            set.insert(op);
        } else {
            set.remove(&op);
        }
    }

    /// Number of calls made for `op`, failed ones included.
    pub fn calls(&self, op: Operation) -> usize {
        self.calls.lock().get(&op).copied().unwrap_or(0)
    }

    /// Number of calls made across all operations.
    pub fn total_calls(&self) -> usize {
        self.calls.lock().values().sum()
    }

    pub fn reset_calls(&self) {
        self.calls.lock().clear();
    }

    fn insert(
        &self,
        parent: &NodeId,
        name: &str,
        extension: Option<&str>,
        content: Bytes,
    ) -> NodeId {
        let mut drive = self.drive.lock();
        let n = drive.allocate();
        let prefix = if extension.is_some() { "FILE" } else { "FOLDER" };
        let id = NodeId::new(format!("{}::{}::{}", prefix, ZONE, n));
        let doc_id = format!("DOC-{}", n);
        let now = Utc::now();

        drive.entries.insert(
            id.clone(),
            Entry {
                item: RemoteItem {
                    id: id.clone(),
                    zone: ZONE.to_string(),
                    doc_id: doc_id.clone(),
                    name: name.to_string(),
                    extension: extension.map(str::to_string),
                    size: content.len() as u64,
                    etag: "1".to_string(),
                    date_created: now,
                    date_changed: now,
                },
                children: Vec::new(),
                content,
            },
        );
        drive.by_doc.insert(doc_id, id.clone());
        if let Some(parent) = drive.entries.get_mut(parent) {
            parent.children.push(id.clone());
        }
        drive.generation += 1;
        id
    }

    fn enter(&self, op: Operation) -> Result<(), RemoteError> {
        *self.calls.lock().entry(op).or_insert(0) += 1;
        if self.failing.lock().contains(&op) {
            return Err(RemoteError::Transport(format!("injected failure: {:?}", op)));
        }
        Ok(())
    }
}

fn not_found(what: &str) -> RemoteError {
    RemoteError::Status {
        status: 404,
        body: format!("{} not found", what),
    }
}

#[async_trait]
impl RemoteTree for MemoryRemote {
    fn root_id(&self) -> NodeId {
        self.root.clone()
    }

    async fn fetch_node(&self, id: &NodeId) -> Result<RemoteFolder, RemoteError> {
        self.enter(Operation::FetchNode)?;
        let drive = self.drive.lock();
        let entry = drive.entries.get(id).ok_or_else(|| not_found(id.as_str()))?;
        let items = entry
            .children
            .iter()
            .filter_map(|child| drive.entries.get(child))
            .map(|child| child.item.clone())
            .collect();
        Ok(RemoteFolder {
            node: entry.item.clone(),
            items,
        })
    }

    async fn fetch_content(&self, _zone: &str, doc_id: &str) -> Result<Bytes, RemoteError> {
        self.enter(Operation::FetchContent)?;
        let drive = self.drive.lock();
        drive
            .by_doc
            .get(doc_id)
            .and_then(|id| drive.entries.get(id))
            .map(|entry| entry.content.clone())
            .ok_or_else(|| not_found(doc_id))
    }

    async fn begin_upload(
        &self,
        zone: &str,
        filename: &str,
    ) -> Result<UploadTarget, RemoteError> {
        self.enter(Operation::BeginUpload)?;
        let mut drive = self.drive.lock();
        let n = drive.allocate();
        Ok(UploadTarget {
            document_id: format!("UPLOAD-{}", n),
            url: format!("memory://{}/upload/{}/{}", zone, n, filename),
        })
    }

    async fn put_content(
        &self,
        target: &UploadTarget,
        data: Bytes,
    ) -> Result<UploadReceipt, RemoteError> {
        self.enter(Operation::PutContent)?;
        let checksum = blake3::hash(&data).to_hex().to_string();
        let size = data.len() as u64;
        self.drive.lock().staged.insert(target.url.clone(), data);
        Ok(UploadReceipt {
            reference_checksum: checksum.clone(),
            file_checksum: checksum,
            wrapping_key: String::new(),
            size,
            receipt: target.url.clone(),
        })
    }

    async fn commit_upload(
        &self,
        _zone: &str,
        doc_id: &str,
        receipt: &UploadReceipt,
    ) -> Result<(), RemoteError> {
        self.enter(Operation::CommitUpload)?;
        let mut drive = self.drive.lock();
        let data = drive
            .staged
            .remove(&receipt.receipt)
            .ok_or_else(|| not_found(&receipt.receipt))?;
        let id = drive
            .by_doc
            .get(doc_id)
            .cloned()
            .ok_or_else(|| not_found(doc_id))?;
        let generation = drive.generation + 1;
        if let Some(entry) = drive.entries.get_mut(&id) {
            entry.item.size = data.len() as u64;
            entry.item.etag = generation.to_string();
            entry.item.date_changed = Utc::now();
            entry.content = data;
        }
        drive.generation = generation;
        Ok(())
    }

    async fn poll_change_feed(&self) -> Result<ContinuationMarker, RemoteError> {
        self.enter(Operation::PollChangeFeed)?;
        Ok(ContinuationMarker(self.drive.lock().generation.to_string()))
    }

    async fn has_advanced(&self, marker: &ContinuationMarker) -> Result<bool, RemoteError> {
        self.enter(Operation::HasAdvanced)?;
        Ok(self.drive.lock().generation.to_string() != marker.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_node_lists_children_in_insert_order() {
        let remote = MemoryRemote::new();
        let root = remote.root_id();
        remote.add_folder(&root, "a");
        remote.add_file(&root, "b", "txt", "abc");

        let folder = remote.fetch_node(&root).await.unwrap();
        let names: Vec<_> = folder.items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(folder.items[1].size, 3);
        assert_eq!(remote.calls(Operation::FetchNode), 1);
    }

    #[tokio::test]
    async fn test_upload_commit_replaces_content() {
        let remote = MemoryRemote::new();
        let root = remote.root_id();
        let file = remote.add_file(&root, "notes", "md", "old");
        let doc_id = remote.fetch_node(&root).await.unwrap().items[0].doc_id.clone();

        let target = remote.begin_upload(ZONE, "notes.md").await.unwrap();
        let receipt = remote
            .put_content(&target, Bytes::from_static(b"new content"))
            .await
            .unwrap();
        remote.commit_upload(ZONE, &doc_id, &receipt).await.unwrap();

        assert_eq!(remote.content(&file).unwrap(), Bytes::from_static(b"new content"));
    }

    #[tokio::test]
    async fn test_change_feed_advances_on_touch() {
        let remote = MemoryRemote::new();
        let marker = remote.poll_change_feed().await.unwrap();
        assert!(!remote.has_advanced(&marker).await.unwrap());
        remote.touch();
        assert!(remote.has_advanced(&marker).await.unwrap());
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let remote = MemoryRemote::new();
        remote.set_failing(Operation::FetchNode, true);
        assert!(remote.fetch_node(&remote.root_id()).await.is_err());
        remote.set_failing(Operation::FetchNode, false);
        assert!(remote.fetch_node(&remote.root_id()).await.is_ok());
        assert_eq!(remote.calls(Operation::FetchNode), 2);
    }
}
