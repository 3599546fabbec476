//! Lazily resolved mirror of the remote folder tree
//!
//! Nodes live in a flat table keyed by remote id; parent and child links are
//! ids into that table. A folder is either shallow (children never fetched or
//! discarded) or fully materialized by exactly one fetch. Nothing in between is
//! ever observable.
//!
//! Concurrent resolves of the same folder are not de-duplicated: both fetch and
//! the last one to complete wins. The table lock is never held across a remote
//! call.
//!
//! Every node carries a generation that is bumped whenever its children are
//! discarded or its record is replaced. A resolve only marks a node
//! materialized if the generation it read before fetching is still current;
//! otherwise the caller gets the listing it fetched and the node stays shallow,
//! so an invalidation that lands mid-fetch is never lost.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;

use crate::error::{DriveError, Result};
use crate::node::{Node, NodeId};
use crate::remote::{RemoteItem, RemoteTree};

#[derive(Debug, Default)]
struct Table {
    nodes: HashMap<NodeId, Node>,
    generations: HashMap<NodeId, u64>,
}

impl Table {
    fn get(&self, id: &NodeId) -> Result<Node> {
        self.nodes
            .get(id)
            .cloned()
            .ok_or_else(|| DriveError::NotFound(id.to_string()))
    }

    fn generation(&self, id: &NodeId) -> u64 {
        self.generations.get(id).copied().unwrap_or(0)
    }

    fn bump(&mut self, id: &NodeId) {
        *self.generations.entry(id.clone()).or_default() += 1;
    }

    fn clear_children(&mut self, id: &NodeId) -> bool {
        match self.nodes.get_mut(id) {
            Some(node) => {
                node.clear_children();
                self.bump(id);
                true
            }
            None => false,
        }
    }

    /// Store child records for `parent` and return their ids in remote order.
    ///
    /// With `replace` every record is overwritten, so previously materialized
    /// folders come back shallow. Without it only unknown children are added.
    fn insert_children(
        &mut self,
        parent: &NodeId,
        items: Vec<RemoteItem>,
        replace: bool,
    ) -> Vec<NodeId> {
        let mut children = Vec::with_capacity(items.len());
        for item in items {
            let child = Node::from_remote(item, Some(parent.clone()));
            let id = child.id.clone();
            if replace || !self.nodes.contains_key(&id) {
                self.nodes.insert(id.clone(), child);
                self.bump(&id);
            }
            children.push(id);
        }
        children
    }

    fn set_children(&mut self, id: &NodeId, children: Vec<NodeId>) -> Result<Node> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| DriveError::NotFound(id.to_string()))?;
        node.set_children(children);
        Ok(node.clone())
    }
}

/// Partially materialized tree backed by a [`RemoteTree`].
pub struct NodeCache {
    remote: Arc<dyn RemoteTree>,
    table: RwLock<Table>,
    root: RwLock<Option<NodeId>>,
}

impl NodeCache {
    pub fn new(remote: Arc<dyn RemoteTree>) -> Self {
        Self {
            remote,
            table: RwLock::new(Table::default()),
            root: RwLock::new(None),
        }
    }

    pub fn remote(&self) -> &Arc<dyn RemoteTree> {
        &self.remote
    }

    /// The drive's top-level folder, fetched once and then served from cache.
    pub async fn get_root(&self) -> Result<Node> {
        if let Some(root) = self.root.read().clone() {
            return self.get(&root);
        }

        let root_id = self.remote.root_id();
        let folder = self.remote.fetch_node(&root_id).await?;
        let root = Node::from_remote(folder.node, None);
        let id = root.id.clone();
        let node = {
            let mut table = self.table.write();
            table.nodes.insert(id.clone(), root);
            table.bump(&id);
            let children = table.insert_children(&id, folder.items, true);
            table.set_children(&id, children)?
        };
        tracing::debug!(root = %id, "fetched drive root");
        *self.root.write() = Some(id);
        Ok(node)
    }

    /// Current cached copy of a node.
    pub fn get(&self, id: &NodeId) -> Result<Node> {
        self.table.read().get(id)
    }

    /// Make sure a node's children are materialized.
    ///
    /// A shallow node costs one remote fetch; on failure it stays shallow so a
    /// later call can retry. A materialized node is returned as is.
    pub async fn resolve(&self, id: &NodeId) -> Result<Node> {
        let (node, generation) = {
            let table = self.table.read();
            (table.get(id)?, table.generation(id))
        };
        if !node.is_shallow() {
            return Ok(node);
        }

        tracing::debug!(node = %id, "resolving shallow node");
        let folder = self.remote.fetch_node(id).await.map_err(|e| {
            tracing::warn!(node = %id, error = %e, "failed to resolve node");
            e
        })?;

        let mut table = self.table.write();
        if table.generation(id) != generation {
            tracing::debug!(node = %id, "node invalidated while resolving, leaving it shallow");
            let children = table.insert_children(id, folder.items, false);
            let mut node = table.get(id)?;
            node.set_children(children);
            return Ok(node);
        }
        let children = table.insert_children(id, folder.items, true);
        table.set_children(id, children)
    }

    /// Children of a node in the order the remote returned them.
    pub async fn children(&self, id: &NodeId) -> Result<Vec<Node>> {
        let node = self.resolve(id).await?;
        let table = self.table.read();
        Ok(node
            .children()
            .unwrap_or_default()
            .iter()
            .filter_map(|child| table.nodes.get(child).cloned())
            .collect())
    }

    /// Find a child by its exposed filename (case sensitive).
    pub async fn lookup(&self, id: &NodeId, name: &str) -> Result<Node> {
        self.children(id)
            .await?
            .into_iter()
            .find(|child| child.filename() == name)
            .ok_or_else(|| DriveError::NotFound(name.to_string()))
    }

    /// Walk a `/`-separated path from the drive root.
    pub async fn node_by_path(&self, path: &str) -> Result<Node> {
        let mut node = self.get_root().await?;
        for component in path.split('/').filter(|c| !c.is_empty()) {
            let child = self.lookup(&node.id, component).await?;
            node = self.resolve(&child.id).await?;
        }
        Ok(node)
    }

    /// Discard a node's cached children so the next access refetches them.
    pub fn invalidate(&self, id: &NodeId) {
        if self.table.write().clear_children(id) {
            tracing::debug!(node = %id, "invalidated node");
        }
    }

    /// Invalidate a node and every materialized folder below it.
    pub fn invalidate_subtree(&self, id: &NodeId) {
        let mut table = self.table.write();
        let mut pending = vec![id.clone()];
        let mut count = 0usize;
        while let Some(current) = pending.pop() {
            if let Some(children) = table.nodes.get(&current).and_then(Node::children) {
                pending.extend(children.iter().cloned());
            }
            if table.clear_children(&current) {
                count += 1;
            }
        }
        tracing::debug!(root = %id, nodes = count, "invalidated subtree");
    }

    /// Record a completed upload on the cached copy of a file, so its
    /// attributes are current before the parent is listed again.
    pub fn record_upload(&self, id: &NodeId, size: u64) {
        if let Some(node) = self.table.write().nodes.get_mut(id) {
            node.size = size;
            node.date_changed = Utc::now();
        }
    }

    /// Every `(parent, filename)` pair currently materialized below `id`.
    pub fn materialized_entries(&self, id: &NodeId) -> Vec<(NodeId, String)> {
        let table = self.table.read();
        let mut entries = Vec::new();
        let mut pending = vec![id.clone()];
        while let Some(current) = pending.pop() {
            let Some(children) = table.nodes.get(&current).and_then(Node::children) else {
                continue;
            };
            for child in children {
                if let Some(node) = table.nodes.get(child) {
                    entries.push((current.clone(), node.filename()));
                    if node.is_dir() {
                        pending.push(child.clone());
                    }
                }
            }
        }
        entries
    }
}

impl std::fmt::Debug for NodeCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeCache")
            .field("root", &*self.root.read())
            .field("node_count", &self.table.read().nodes.len())
            .finish()
    }
}
