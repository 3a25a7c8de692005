//! Index manager - the hierarchical path namespace
//!
//! Three views are kept on disk, each in its own sharded layout:
//! - `nodes/<node_id>`        the node record (source of truth)
//! - `_paths/<path key>`      full path -> node id
//! - `_children/<node_id>`    ordered child ids of a directory
//!
//! The views are updated with separate writes and best-effort rollback, not
//! transactionally. All mutations go through one writer lock, so a single
//! manager never interleaves two protocols; a crash mid-protocol can still
//! leave the derived views behind the node table.

use super::path::{join_path, normalize_path, path_key, validate_name};
use crate::model::{now_millis, IndexNode, NodeId};
use crate::store::ShardedLayout;
use crate::{Error, Result};
use parking_lot::Mutex;
use std::path::Path;
use tracing::{debug, error, warn};

/// Upper bound on parent-chain length while resolving a node's path
const MAX_DEPTH: usize = 4096;

pub struct IndexManager {
    nodes: ShardedLayout,
    paths: ShardedLayout,
    children: ShardedLayout,
    writer: Mutex<()>,
}

impl IndexManager {
    /// Open the index rooted at `base`, creating the root node if missing
    pub fn open(base: impl AsRef<Path>) -> Result<Self> {
        let base = base.as_ref();
        let manager = IndexManager {
            nodes: ShardedLayout::new(base.join("nodes")),
            paths: ShardedLayout::new(base.join("_paths")),
            children: ShardedLayout::new(base.join("_children")),
            writer: Mutex::new(()),
        };
        manager.ensure_root()?;
        Ok(manager)
    }

    pub fn root_id(&self) -> NodeId {
        NodeId::root()
    }

    /// Add a node under its parent. Assigns an id if the node has none.
    pub fn create_node(&self, mut node: IndexNode) -> Result<IndexNode> {
        let _w = self.writer.lock();
        validate_name(&node.name)?;

        let parent = self.get_node(&node.parent_id)?;
        if !parent.is_dir() {
            return Err(Error::NotADirectory(self.node_path(&parent.node_id)?));
        }
        if node.node_id.is_empty() {
            node.node_id = NodeId::generate();
        }

        let path = join_path(&self.node_path(&parent.node_id)?, &node.name);
        let key = path_key(&path);
        if self.paths.exists(&key)? {
            return Err(Error::AlreadyExists(path));
        }
        if self.nodes.exists(node.node_id.as_str())? {
            return Err(Error::AlreadyExists(format!("node {}", node.node_id)));
        }

        self.put_node(&node)?;
        if let Err(e) = self.put_path(&key, &node.node_id) {
            self.compensate("remove node record", self.nodes.delete(node.node_id.as_str()));
            return Err(e);
        }
        if let Err(e) = self.add_child(&node.parent_id, &node.node_id) {
            self.compensate("remove path entry", self.paths.delete(&key));
            self.compensate("remove node record", self.nodes.delete(node.node_id.as_str()));
            return Err(e);
        }

        debug!(path = %path, id = %node.node_id, "created node");
        Ok(node)
    }

    pub fn get_node(&self, id: &NodeId) -> Result<IndexNode> {
        let bytes = self.nodes.read(id.as_str()).map_err(|e| match e {
            Error::NotFound(_) => Error::NotFound(format!("node {id}")),
            other => other,
        })?;
        Ok(bincode::deserialize(&bytes)?)
    }

    pub fn get_node_by_path(&self, path: &str) -> Result<IndexNode> {
        let path = normalize_path(path)?;
        let bytes = self.paths.read(&path_key(&path)).map_err(|e| match e {
            Error::NotFound(_) => Error::NotFound(path.clone()),
            other => other,
        })?;
        let id: NodeId = bincode::deserialize(&bytes)?;
        self.get_node(&id)
    }

    /// Full path of a node, resolved through its parent chain
    pub fn node_path(&self, id: &NodeId) -> Result<String> {
        let mut names = Vec::new();
        let mut current = self.get_node(id)?;
        while !current.is_root() {
            if names.len() >= MAX_DEPTH {
                return Err(Error::InvalidInput(format!(
                    "parent chain of node {id} does not reach the root"
                )));
            }
            names.push(current.name.clone());
            current = self.get_node(&current.parent_id)?;
        }
        if names.is_empty() {
            return Ok("/".to_string());
        }
        names.reverse();
        Ok(format!("/{}", names.join("/")))
    }

    /// Overwrite a node's record. Parent, name and type must be unchanged;
    /// use [`IndexManager::move_node`] to relocate a node.
    pub fn update_node(&self, node: &IndexNode) -> Result<()> {
        let _w = self.writer.lock();
        let existing = self.get_node(&node.node_id)?;
        if existing.node_type != node.node_type {
            return Err(Error::InvalidInput(format!(
                "node {} cannot change type",
                node.node_id
            )));
        }
        if existing.parent_id != node.parent_id || existing.name != node.name {
            return Err(Error::InvalidInput(format!(
                "node {} cannot be relocated by an update",
                node.node_id
            )));
        }
        self.put_node(node)
    }

    /// Remove a node. Directories must be empty.
    pub fn delete_node(&self, id: &NodeId) -> Result<IndexNode> {
        let _w = self.writer.lock();
        let node = self.get_node(id)?;
        if node.is_root() {
            return Err(Error::InvalidInput("the root cannot be deleted".into()));
        }
        let path = self.node_path(id)?;
        if node.is_dir() && !self.read_children(id)?.is_empty() {
            return Err(Error::NotEmpty(path));
        }

        self.nodes.delete(id.as_str())?;
        ignore_missing(self.paths.delete(&path_key(&path)))?;
        self.remove_child(&node.parent_id, id)?;

        debug!(path = %path, id = %id, "deleted node");
        Ok(node)
    }

    /// Children of a directory, sorted by name. Unresolvable ids are skipped.
    pub fn list_children(&self, parent: &NodeId) -> Result<Vec<IndexNode>> {
        let mut nodes = Vec::new();
        for child in self.read_children(parent)? {
            match self.get_node(&child) {
                Ok(node) => nodes.push(node),
                Err(e) => warn!(parent = %parent, child = %child, error = %e, "skipping unresolvable child"),
            }
        }
        nodes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(nodes)
    }

    /// Move and/or rename a node.
    ///
    /// Steps: detach from the old parent and attach to the new one, rewrite the
    /// path entries of the node and all its descendants, then update the node
    /// record. A failing step rolls back the earlier ones on a best-effort basis.
    pub fn move_node(&self, id: &NodeId, new_parent_id: &NodeId, new_name: &str) -> Result<IndexNode> {
        let _w = self.writer.lock();
        validate_name(new_name)?;

        let node = self.get_node(id)?;
        if node.is_root() {
            return Err(Error::InvalidInput("the root cannot be moved".into()));
        }
        let new_parent = self.get_node(new_parent_id)?;
        let new_parent_path = self.node_path(new_parent_id)?;
        if !new_parent.is_dir() {
            return Err(Error::NotADirectory(new_parent_path));
        }

        let old_path = self.node_path(id)?;
        let new_path = join_path(&new_parent_path, new_name);
        if new_path == old_path {
            return Ok(node);
        }
        if node.is_dir() && new_path.starts_with(&format!("{old_path}/")) {
            return Err(Error::InvalidInput(format!(
                "cannot move {old_path} into its own subtree"
            )));
        }
        if self.paths.exists(&path_key(&new_path))? {
            return Err(Error::AlreadyExists(new_path));
        }

        let entries = self.subtree_paths(&node, &old_path, &new_path)?;
        let old_parent_id = node.parent_id.clone();
        let reparent = &old_parent_id != new_parent_id;

        if reparent {
            self.remove_child(&old_parent_id, id)?;
            if let Err(e) = self.add_child(new_parent_id, id) {
                self.compensate("restore old parent link", self.add_child(&old_parent_id, id));
                return Err(e);
            }
        }
        let undo_children = || {
            if reparent {
                self.compensate("detach from new parent", self.remove_child(new_parent_id, id));
                self.compensate("restore old parent link", self.add_child(&old_parent_id, id));
            }
        };

        let mut rewritten: Vec<&PathEntry> = Vec::new();
        for entry in &entries {
            if let Err(e) = self.repoint_path(&entry.old, &entry.new, &entry.id) {
                for done in rewritten.iter().rev() {
                    self.compensate("restore path entry", self.repoint_path(&done.new, &done.old, &done.id));
                }
                undo_children();
                return Err(e);
            }
            rewritten.push(entry);
        }

        let mut updated = node;
        updated.parent_id = new_parent_id.clone();
        updated.name = new_name.to_string();
        updated.mtime = now_millis();
        if let Err(e) = self.put_node(&updated) {
            for done in rewritten.iter().rev() {
                self.compensate("restore path entry", self.repoint_path(&done.new, &done.old, &done.id));
            }
            undo_children();
            return Err(e);
        }

        debug!(from = %old_path, to = %new_path, id = %id, "moved node");
        Ok(updated)
    }

    // === Internal helpers ===

    /// Create the root node and its path entry, repairing either if missing
    fn ensure_root(&self) -> Result<()> {
        let _w = self.writer.lock();
        let root = NodeId::root();
        if !self.nodes.exists(root.as_str())? {
            self.put_node(&IndexNode::root())?;
            debug!("created namespace root");
        }
        let key = path_key("/");
        if !self.paths.exists(&key)? {
            self.put_path(&key, &root)?;
            debug!("wrote root path entry");
        }
        Ok(())
    }

    fn put_node(&self, node: &IndexNode) -> Result<()> {
        let bytes = bincode::serialize(node)?;
        self.nodes.write(node.node_id.as_str(), &bytes)
    }

    fn put_path(&self, key: &str, id: &NodeId) -> Result<()> {
        let bytes = bincode::serialize(id)?;
        self.paths.write(key, &bytes)
    }

    /// Delete the old path entry, then write the new one
    fn repoint_path(&self, old_path: &str, new_path: &str, id: &NodeId) -> Result<()> {
        let old_key = path_key(old_path);
        ignore_missing(self.paths.delete(&old_key))?;
        if let Err(e) = self.put_path(&path_key(new_path), id) {
            self.compensate("restore path entry", self.put_path(&old_key, id));
            return Err(e);
        }
        Ok(())
    }

    fn read_children(&self, id: &NodeId) -> Result<Vec<NodeId>> {
        match self.children.read(id.as_str()) {
            Ok(bytes) => Ok(bincode::deserialize(&bytes)?),
            Err(Error::NotFound(_)) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    fn write_children(&self, id: &NodeId, list: &[NodeId]) -> Result<()> {
        if list.is_empty() {
            return ignore_missing(self.children.delete(id.as_str()));
        }
        let bytes = bincode::serialize(list)?;
        self.children.write(id.as_str(), &bytes)
    }

    fn add_child(&self, parent: &NodeId, child: &NodeId) -> Result<()> {
        let mut list = self.read_children(parent)?;
        if !list.contains(child) {
            list.push(child.clone());
        }
        self.write_children(parent, &list)
    }

    fn remove_child(&self, parent: &NodeId, child: &NodeId) -> Result<()> {
        let mut list = self.read_children(parent)?;
        list.retain(|c| c != child);
        self.write_children(parent, &list)
    }

    /// Old and new path of a node and every descendant, parents first
    fn subtree_paths(&self, node: &IndexNode, old_path: &str, new_path: &str) -> Result<Vec<PathEntry>> {
        let mut entries = vec![PathEntry {
            id: node.node_id.clone(),
            old: old_path.to_string(),
            new: new_path.to_string(),
        }];
        if !node.is_dir() {
            return Ok(entries);
        }

        let mut i = 0;
        while i < entries.len() {
            let (id, old, new) = {
                let e = &entries[i];
                (e.id.clone(), e.old.clone(), e.new.clone())
            };
            for child in self.list_children(&id)? {
                entries.push(PathEntry {
                    id: child.node_id.clone(),
                    old: join_path(&old, &child.name),
                    new: join_path(&new, &child.name),
                });
            }
            i += 1;
        }
        Ok(entries)
    }

    fn compensate(&self, step: &str, result: Result<()>) {
        if let Err(e) = ignore_missing(result) {
            error!(step, error = %e, "rollback step failed; index may be inconsistent");
        }
    }
}

struct PathEntry {
    id: NodeId,
    old: String,
    new: String,
}

fn ignore_missing(result: Result<()>) -> Result<()> {
    match result {
        Err(e) if e.is_not_found() => Ok(()),
        other => other,
    }
}
