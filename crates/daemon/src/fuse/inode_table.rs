//! Bidirectional inode ↔ node id mapping for the FUSE filesystem
//!
//! FUSE addresses files by 64-bit inode numbers. Inodes are derived from the
//! remote id by hashing, so the same remote object keeps the same inode for the
//! life of a mount even after the cached tree is invalidated and refetched.
//! The mount root is always inode 1.

use std::collections::HashMap;

use common::NodeId;

/// Bidirectional mapping between inodes and remote node ids
#[derive(Debug)]
pub struct InodeTable {
    /// Node id to inode mapping
    id_to_inode: HashMap<NodeId, u64>,
    /// Inode to node id mapping
    inode_to_id: HashMap<u64, NodeId>,
    /// Id of the mount root, pinned to `ROOT_INODE`
    root: NodeId,
}

impl InodeTable {
    /// Root inode number (always 1 in FUSE)
    pub const ROOT_INODE: u64 = 1;

    /// Create a new inode table with the mount root pre-registered
    pub fn new(root: NodeId) -> Self {
        let mut table = Self {
            id_to_inode: HashMap::new(),
            inode_to_id: HashMap::new(),
            root: root.clone(),
        };
        table.id_to_inode.insert(root.clone(), Self::ROOT_INODE);
        table.inode_to_id.insert(Self::ROOT_INODE, root);
        table
    }

    pub fn root(&self) -> &NodeId {
        &self.root
    }

    /// Get or assign the inode for a node id
    pub fn register(&mut self, id: &NodeId) -> u64 {
        if let Some(&inode) = self.id_to_inode.get(id) {
            return inode;
        }

        let inode = id.stable_ino();
        if let Some(existing) = self.inode_to_id.get(&inode) {
            tracing::warn!(inode, existing = %existing, id = %id, "inode hash collision");
        }
        self.id_to_inode.insert(id.clone(), inode);
        self.inode_to_id.insert(inode, id.clone());
        inode
    }

    /// Get the inode for a node id if it has been handed out
    pub fn get_inode(&self, id: &NodeId) -> Option<u64> {
        self.id_to_inode.get(id).copied()
    }

    /// Get the node id for an inode if it exists
    pub fn get_id(&self, inode: u64) -> Option<&NodeId> {
        self.inode_to_id.get(&inode)
    }

    /// Remove an inode and its id mapping. The root is never removed.
    pub fn remove(&mut self, inode: u64) -> Option<NodeId> {
        if inode == Self::ROOT_INODE {
            return None;
        }
        let id = self.inode_to_id.remove(&inode)?;
        self.id_to_inode.remove(&id);
        Some(id)
    }

    pub fn len(&self) -> usize {
        self.inode_to_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inode_to_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_inode() {
        let root = NodeId::new("FOLDER::com.apple.CloudDocs::root");
        let table = InodeTable::new(root.clone());
        assert_eq!(table.get_inode(&root), Some(InodeTable::ROOT_INODE));
        assert_eq!(table.get_id(InodeTable::ROOT_INODE), Some(&root));
    }

    #[test]
    fn test_register_is_stable() {
        let mut table = InodeTable::new(NodeId::new("root"));

        let foo = NodeId::new("FILE::zone::foo");
        let bar = NodeId::new("FILE::zone::bar");
        let inode1 = table.register(&foo);
        let inode2 = table.register(&foo);
        let inode3 = table.register(&bar);

        assert_eq!(inode1, inode2);
        assert_ne!(inode1, inode3);
        assert_ne!(inode1, InodeTable::ROOT_INODE);
        assert_eq!(inode1, foo.stable_ino());
    }

    #[test]
    fn test_same_id_same_inode_across_tables() {
        let id = NodeId::new("FOLDER::zone::docs");
        let mut first = InodeTable::new(NodeId::new("root"));
        let mut second = InodeTable::new(NodeId::new("root"));
        assert_eq!(first.register(&id), second.register(&id));
    }

    #[test]
    fn test_root_registers_as_root_inode() {
        let root = NodeId::new("root");
        let mut table = InodeTable::new(root.clone());
        assert_eq!(table.register(&root), InodeTable::ROOT_INODE);
    }

    #[test]
    fn test_remove() {
        let mut table = InodeTable::new(NodeId::new("root"));
        let id = NodeId::new("FILE::zone::foo");
        let inode = table.register(&id);

        assert_eq!(table.remove(inode), Some(id.clone()));
        assert!(table.get_inode(&id).is_none());
        assert!(table.remove(InodeTable::ROOT_INODE).is_none());
        assert_eq!(table.len(), 1);
    }
}
