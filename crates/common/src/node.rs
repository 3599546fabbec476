//! Tree entries mirrored from the remote drive

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::remote::RemoteItem;

/// Inode numbers below this are reserved (0 is invalid, 1 is the FUSE root).
const RESERVED_INODES: u64 = 2;

/// Opaque remote identifier, stable for the lifetime of the remote object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Stable numeric identity derived from the remote id.
    ///
    /// The same remote object always hashes to the same value, so the
    /// filesystem layer can hand it out as an inode number for the life of a
    /// mount. Reserved values are shifted out of the way.
    pub fn stable_ino(&self) -> u64 {
        let hash = blake3::hash(self.0.as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&hash.as_bytes()[..8]);
        let ino = u64::from_le_bytes(prefix);
        if ino < RESERVED_INODES {
            ino + RESERVED_INODES
        } else {
            ino
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Whether a node is a regular file or a folder.
///
/// Computed once from the presence of an extension: the remote drive reports
/// folders without one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    File,
    Directory,
}

impl NodeKind {
    pub fn from_extension(extension: Option<&str>) -> Self {
        match extension {
            Some(_) => NodeKind::File,
            None => NodeKind::Directory,
        }
    }
}

/// One remote file or folder.
///
/// Children are held as ids into the owning [`NodeCache`](crate::NodeCache)
/// table. `None` means the node is shallow: its children have not been fetched
/// (or were discarded by an invalidation).
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub zone: String,
    pub doc_id: String,
    pub name: String,
    pub extension: Option<String>,
    pub kind: NodeKind,
    pub size: u64,
    pub etag: String,
    pub date_created: DateTime<Utc>,
    pub date_changed: DateTime<Utc>,
    pub parent: Option<NodeId>,
    children: Option<Vec<NodeId>>,
}

impl Node {
    /// Build a node from remote metadata.
    ///
    /// Folders start shallow; files have no children to fetch and start
    /// materialized with an empty child list.
    pub fn from_remote(item: RemoteItem, parent: Option<NodeId>) -> Self {
        let kind = NodeKind::from_extension(item.extension.as_deref());
        let children = match kind {
            NodeKind::File => Some(Vec::new()),
            NodeKind::Directory => None,
        };
        Self {
            id: item.id,
            zone: item.zone,
            doc_id: item.doc_id,
            name: item.name,
            extension: item.extension,
            kind,
            size: item.size,
            etag: item.etag,
            date_created: item.date_created,
            date_changed: item.date_changed,
            parent,
            children,
        }
    }

    /// Name as exposed to the filesystem: `name` or `name.extension`.
    pub fn filename(&self) -> String {
        match &self.extension {
            Some(extension) => format!("{}.{}", self.name, extension),
            None => self.name.clone(),
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    pub fn is_shallow(&self) -> bool {
        self.children.is_none()
    }

    pub fn children(&self) -> Option<&[NodeId]> {
        self.children.as_deref()
    }

    pub fn stable_ino(&self) -> u64 {
        self.id.stable_ino()
    }

    pub(crate) fn set_children(&mut self, children: Vec<NodeId>) {
        self.children = Some(children);
    }

    /// Drop the cached child list. Files have nothing to refetch and stay
    /// materialized.
    pub(crate) fn clear_children(&mut self) {
        if self.is_dir() {
            self.children = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, extension: Option<&str>) -> RemoteItem {
        RemoteItem {
            id: NodeId::new(format!("ID::{}", name)),
            zone: "com.apple.CloudDocs".to_string(),
            doc_id: format!("DOC-{}", name),
            name: name.to_string(),
            extension: extension.map(str::to_string),
            size: 0,
            etag: "1".to_string(),
            date_created: Utc::now(),
            date_changed: Utc::now(),
        }
    }

    #[test]
    fn test_filename_with_extension() {
        let node = Node::from_remote(item("report", Some("pdf")), None);
        assert_eq!(node.filename(), "report.pdf");
    }

    #[test]
    fn test_filename_without_extension() {
        let node = Node::from_remote(item("Documents", None), None);
        assert_eq!(node.filename(), "Documents");
    }

    #[test]
    fn test_kind_follows_extension() {
        let dir = Node::from_remote(item("a", None), None);
        let file = Node::from_remote(item("b", Some("txt")), None);
        assert!(dir.is_dir());
        assert_eq!(dir.kind, NodeKind::Directory);
        assert!(!file.is_dir());
        assert_eq!(file.kind, NodeKind::File);
    }

    #[test]
    fn test_folders_start_shallow_files_do_not() {
        let dir = Node::from_remote(item("a", None), None);
        let file = Node::from_remote(item("b", Some("txt")), None);
        assert!(dir.is_shallow());
        assert!(dir.children().is_none());
        assert!(!file.is_shallow());
        assert_eq!(file.children(), Some(&[][..]));
    }

    #[test]
    fn test_clear_children_keeps_files_materialized() {
        let mut dir = Node::from_remote(item("a", None), None);
        dir.set_children(vec![NodeId::new("x")]);
        dir.clear_children();
        assert!(dir.is_shallow());

        let mut file = Node::from_remote(item("b", Some("txt")), None);
        file.clear_children();
        assert!(!file.is_shallow());
    }

    #[test]
    fn test_stable_ino() {
        let a = NodeId::new("FILE::com.apple.CloudDocs::1234");
        let b = NodeId::new("FILE::com.apple.CloudDocs::5678");
        assert_eq!(a.stable_ino(), a.clone().stable_ino());
        assert_ne!(a.stable_ino(), b.stable_ino());
        assert!(a.stable_ino() >= RESERVED_INODES);
    }
}
