//! Index node type - one entry in the path namespace

use super::meta::now_millis;
use super::ContentId;
use serde::{Deserialize, Serialize};

/// Stable identifier for an index node (not derived from content)
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    /// Id of the namespace root
    pub const ROOT: &'static str = "root";

    pub fn new(id: impl Into<String>) -> Self {
        NodeId(id.into())
    }

    /// Generate a fresh random id
    pub fn generate() -> Self {
        NodeId(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn root() -> Self {
        NodeId(Self::ROOT.to_string())
    }

    pub fn is_root(&self) -> bool {
        self.0 == Self::ROOT
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        NodeId(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        NodeId(s)
    }
}

/// Kind of namespace entry; never changes after creation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    File,
    Directory,
}

/// Default permission bits for new files
pub const FILE_MODE: u32 = 0o644;

/// Default permission bits for new directories
pub const DIR_MODE: u32 = 0o755;

/// An entry in the hierarchical namespace
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexNode {
    /// Empty until the index manager assigns one
    pub node_id: NodeId,
    /// Empty only for the root
    pub parent_id: NodeId,
    pub name: String,
    pub node_type: NodeType,
    pub mode: u32,
    pub owner_id: u32,
    pub group_id: u32,
    /// Unix millis
    pub atime: u64,
    pub mtime: u64,
    pub ctime: u64,
    /// Set for files only
    pub content_id: Option<ContentId>,
}

impl IndexNode {
    /// A new file node under `parent_id`
    pub fn file(parent_id: NodeId, name: impl Into<String>, content_id: ContentId) -> Self {
        Self::new(parent_id, name, NodeType::File, Some(content_id))
    }

    /// A new directory node under `parent_id`
    pub fn directory(parent_id: NodeId, name: impl Into<String>) -> Self {
        Self::new(parent_id, name, NodeType::Directory, None)
    }

    /// The namespace root
    pub fn root() -> Self {
        let mut node = Self::new(NodeId::new(""), "/", NodeType::Directory, None);
        node.node_id = NodeId::root();
        node
    }

    fn new(
        parent_id: NodeId,
        name: impl Into<String>,
        node_type: NodeType,
        content_id: Option<ContentId>,
    ) -> Self {
        let now = now_millis();
        IndexNode {
            node_id: NodeId::new(""),
            parent_id,
            name: name.into(),
            node_type,
            mode: match node_type {
                NodeType::File => FILE_MODE,
                NodeType::Directory => DIR_MODE,
            },
            owner_id: 0,
            group_id: 0,
            atime: now,
            mtime: now,
            ctime: now,
            content_id,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.node_type == NodeType::Directory
    }

    pub fn is_file(&self) -> bool {
        self.node_type == NodeType::File
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_empty()
    }
}
