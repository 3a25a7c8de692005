//! High-level Filestore API
//!
//! Composes the index manager and the metadata service into path-oriented
//! operations. Content is written before its index entry and the index entry
//! is removed before its content, so an interrupted operation leaves at worst
//! unreferenced content behind, never an entry pointing at nothing.

use crate::config::StoreConfig;
use crate::content::{ContentAssembler, ContentReader};
use crate::index::{normalize_path, split_parent, validate_name, IndexManager};
use crate::model::{ContentId, FileMetaRecord, IndexNode, NodeId, NodeType};
use crate::service::MetadataService;
use crate::store::{BlobStore, MetadataStore};
use crate::{Error, Result};
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

/// What `stat` and `list` report about an entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FileInfo {
    pub path: String,
    pub name: String,
    pub node_id: String,
    pub node_type: NodeType,
    pub size: u64,
    pub mode: u32,
    /// Unix millis; content modification time for files
    pub mtime: u64,
    pub ctime: u64,
    pub content_id: Option<String>,
    pub mime_type: Option<String>,
}

impl FileInfo {
    pub fn is_dir(&self) -> bool {
        self.node_type == NodeType::Directory
    }
}

/// The main file store interface
pub struct Filestore {
    root: PathBuf,
    index: IndexManager,
    meta: MetadataService,
}

impl Filestore {
    /// Open (or initialize) a store described by `config`
    pub fn open(config: &StoreConfig) -> Result<Self> {
        config.validate()?;
        let blobs = BlobStore::open(config.blobs_dir());
        let assembler = ContentAssembler::new(blobs.clone(), config.chunk_size)?;
        let meta = MetadataService::new(MetadataStore::open(config.meta_dir()), blobs, assembler);
        let index = IndexManager::open(config.index_dir())?;

        debug!(root = %config.root.display(), chunk_size = config.chunk_size, "opened filestore");
        Ok(Filestore {
            root: config.root.clone(),
            index,
            meta,
        })
    }

    /// Base directory of the store
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn index(&self) -> &IndexManager {
        &self.index
    }

    pub fn metadata(&self) -> &MetadataService {
        &self.meta
    }

    // === Queries ===

    /// Entries of a directory, sorted by name
    pub fn list(&self, path: &str) -> Result<Vec<FileInfo>> {
        let path = normalize_path(path)?;
        let dir = self.index.get_node_by_path(&path)?;
        if !dir.is_dir() {
            return Err(Error::NotADirectory(path));
        }

        let mut entries = Vec::new();
        for child in self.index.list_children(&dir.node_id)? {
            let child_path = crate::index::join_path(&path, &child.name);
            let mut info = describe(&child_path, &child);
            if let Some(id) = child.content_id {
                match self.meta.get(&id) {
                    Ok(meta) => attach(&mut info, meta.size(), meta.mod_time(), meta.mime_type()),
                    Err(e) => warn!(path = %child_path, error = %e, "metadata unreadable; listing without size"),
                }
            }
            entries.push(info);
        }
        Ok(entries)
    }

    pub fn stat(&self, path: &str) -> Result<FileInfo> {
        let path = normalize_path(path)?;
        let node = self.index.get_node_by_path(&path)?;
        self.info(&path, &node)
    }

    pub fn exists(&self, path: &str) -> Result<bool> {
        match self.index.get_node_by_path(path) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Open a file for reading
    pub fn read(&self, path: &str) -> Result<ContentReader> {
        let path = normalize_path(path)?;
        let node = self.index.get_node_by_path(&path)?;
        let id = file_content(&path, &node)?;
        self.meta.read(&id)
    }

    /// Read a whole file into memory
    pub fn read_to_vec(&self, path: &str) -> Result<Vec<u8>> {
        let mut reader = self.read(path)?;
        let mut out = Vec::new();
        reader
            .read_to_end(&mut out)
            .map_err(|e| Error::io_at(path.to_string(), e))?;
        Ok(out)
    }

    // === Mutations ===

    /// Store a new file at `path`, creating missing parent directories.
    ///
    /// `size` of `None` or `Some(0)` means the length is unknown. On failure
    /// the freshly stored content and any parents this call created are
    /// released again.
    pub fn write<R: Read>(&self, path: &str, reader: R, size: Option<u64>) -> Result<FileInfo> {
        let path = normalize_path(path)?;
        let (parent_path, name) = split_parent(&path)
            .ok_or_else(|| Error::InvalidInput("cannot write to the root".into()))?;
        validate_name(name)?;
        let (parent, created) = self.ensure_dir(parent_path)?;

        let content_id = match self.meta.create(reader, size) {
            Ok(id) => id,
            Err(e) => {
                self.remove_dirs(&created);
                return Err(e);
            }
        };
        let node = match self
            .index
            .create_node(IndexNode::file(parent.node_id, name, content_id))
        {
            Ok(node) => node,
            Err(e) => {
                if let Err(cleanup) = self.meta.delete(&content_id) {
                    error!(
                        path = %path,
                        content = %content_id,
                        error = %cleanup,
                        "content orphaned after failed index update"
                    );
                }
                self.remove_dirs(&created);
                return Err(e);
            }
        };

        debug!(path = %path, content = %content_id.short(), "wrote file");
        self.info(&path, &node)
    }

    /// Create a directory, including missing parents
    pub fn mkdir(&self, path: &str) -> Result<FileInfo> {
        let path = normalize_path(path)?;
        let (parent_path, name) =
            split_parent(&path).ok_or_else(|| Error::AlreadyExists("/".into()))?;
        let (parent, created) = self.ensure_dir(parent_path)?;
        match self
            .index
            .create_node(IndexNode::directory(parent.node_id, name))
        {
            Ok(node) => Ok(describe(&path, &node)),
            Err(e) => {
                self.remove_dirs(&created);
                Err(e)
            }
        }
    }

    /// Remove a file or an empty directory.
    ///
    /// Once the index entry is gone the call succeeds; a failure to release the
    /// file's content afterwards is only logged.
    pub fn delete(&self, path: &str) -> Result<()> {
        let path = normalize_path(path)?;
        let node = self.index.get_node_by_path(&path)?;
        if node.is_root() {
            return Err(Error::InvalidInput("the root cannot be deleted".into()));
        }
        if node.is_dir() && !self.index.list_children(&node.node_id)?.is_empty() {
            return Err(Error::NotEmpty(path));
        }

        let removed = self.index.delete_node(&node.node_id)?;
        if let Some(id) = removed.content_id {
            if let Err(e) = self.meta.delete(&id) {
                error!(path = %path, content = %id, error = %e, "content orphaned after delete");
            }
        }
        debug!(path = %path, "deleted");
        Ok(())
    }

    /// Move an entry to a new path; content is untouched
    pub fn rename(&self, old_path: &str, new_path: &str) -> Result<FileInfo> {
        let old_path = normalize_path(old_path)?;
        let new_path = normalize_path(new_path)?;
        let node = self.index.get_node_by_path(&old_path)?;
        let (parent_path, name) = split_parent(&new_path)
            .ok_or_else(|| Error::InvalidInput("cannot rename onto the root".into()))?;
        let parent = self.index.get_node_by_path(parent_path)?;

        let moved = self.index.move_node(&node.node_id, &parent.node_id, name)?;
        self.info(&new_path, &moved)
    }

    /// Upgrade a legacy metadata record
    pub fn migrate(&self, id: &ContentId) -> Result<FileMetaRecord> {
        self.meta.migrate(id)
    }

    // === Internal helpers ===

    fn info(&self, path: &str, node: &IndexNode) -> Result<FileInfo> {
        let mut info = describe(path, node);
        if let Some(id) = &node.content_id {
            let meta = self.meta.get(id)?;
            attach(&mut info, meta.size(), meta.mod_time(), meta.mime_type());
        }
        Ok(info)
    }

    /// Resolve a directory path, creating any missing components. Also
    /// returns the ids of the directories it created, outermost first.
    fn ensure_dir(&self, path: &str) -> Result<(IndexNode, Vec<NodeId>)> {
        let mut created = Vec::new();
        match self.walk_dirs(path, &mut created) {
            Ok(dir) => Ok((dir, created)),
            Err(e) => {
                self.remove_dirs(&created);
                Err(e)
            }
        }
    }

    fn walk_dirs(&self, path: &str, created: &mut Vec<NodeId>) -> Result<IndexNode> {
        let mut current = self.index.get_node(&self.index.root_id())?;
        let mut current_path = String::from("/");

        for name in path.split('/').filter(|s| !s.is_empty()) {
            let next_path = crate::index::join_path(&current_path, name);
            let next = match self.index.get_node_by_path(&next_path) {
                Ok(node) => node,
                Err(e) if e.is_not_found() => {
                    match self
                        .index
                        .create_node(IndexNode::directory(current.node_id.clone(), name))
                    {
                        Ok(node) => {
                            created.push(node.node_id.clone());
                            node
                        }
                        // Lost a race with another creator
                        Err(Error::AlreadyExists(_)) => self.index.get_node_by_path(&next_path)?,
                        Err(e) => return Err(e),
                    }
                }
                Err(e) => return Err(e),
            };
            if !next.is_dir() {
                return Err(Error::NotADirectory(next_path));
            }
            current = next;
            current_path = next_path;
        }
        Ok(current)
    }

    /// Remove directories created by a failed call, innermost first. One that
    /// another writer has started to use is left alone.
    fn remove_dirs(&self, created: &[NodeId]) {
        for id in created.iter().rev() {
            match self.index.delete_node(id) {
                Ok(_) => debug!(id = %id, "removed directory of failed write"),
                Err(Error::NotEmpty(_)) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => warn!(id = %id, error = %e, "could not remove directory of failed write"),
            }
        }
    }
}

fn describe(path: &str, node: &IndexNode) -> FileInfo {
    FileInfo {
        path: path.to_string(),
        name: if node.is_root() {
            "/".to_string()
        } else {
            node.name.clone()
        },
        node_id: node.node_id.to_string(),
        node_type: node.node_type,
        size: 0,
        mode: node.mode,
        mtime: node.mtime,
        ctime: node.ctime,
        content_id: node.content_id.map(|id| id.to_hex()),
        mime_type: None,
    }
}

fn attach(info: &mut FileInfo, size: u64, mtime: u64, mime: &str) {
    info.size = size;
    info.mtime = mtime;
    info.mime_type = Some(mime.to_string());
}

fn file_content(path: &str, node: &IndexNode) -> Result<ContentId> {
    if !node.is_file() {
        return Err(Error::NotAFile(path.to_string()));
    }
    node.content_id
        .ok_or_else(|| Error::NotFound(format!("{path} has no content")))
}
