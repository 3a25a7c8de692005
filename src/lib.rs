//! # shardstore
//!
//! A small content-addressed file storage engine.
//!
//! File content is identified by its SHA-256 hash. Small files are embedded
//! directly in their metadata record; larger ones are split into fixed-size
//! chunk blobs. A hierarchical namespace maps paths to content, and the
//! [`Filestore`] façade exposes list/stat/read/write/mkdir/delete/rename.
//!
//! ## Layers
//!
//! - **Sharded layout**: id → `base/id[0:2]/id[2:4]/id`, atomic writes
//! - **Blob store**: raw chunks keyed by their hash
//! - **Metadata store**: versioned metadata envelopes keyed by content id
//! - **Content assembler**: stream ⇄ embedded record or chunk list
//! - **Metadata service**: create/get/read/delete of content, ref counted
//! - **Index manager**: nodes, path index and child lists
//!
//! ## Example
//!
//! ```no_run
//! use shardstore::{Filestore, StoreConfig};
//!
//! let fs = Filestore::open(&StoreConfig::new("/tmp/store"))?;
//! fs.write("/notes/hello.txt", &b"hi"[..], Some(2))?;
//! assert_eq!(fs.read_to_vec("/notes/hello.txt")?, b"hi");
//! # Ok::<(), shardstore::Error>(())
//! ```

pub mod config;
pub mod content;
pub mod index;
pub mod model;
pub mod service;
pub mod store;

mod error;
mod filestore;

pub use config::StoreConfig;
pub use content::{ContentAssembler, ContentReader, DEFAULT_CHUNK_SIZE, EMBED_THRESHOLD};
pub use error::{Error, Result};
pub use filestore::{FileInfo, Filestore};
pub use index::IndexManager;
pub use model::{
    BlobId, ContentId, FileMetaRecord, FileMetaV1, Hash, IndexNode, NodeId, NodeType,
    VersionedMeta,
};
pub use service::MetadataService;
pub use store::{BlobStore, MetadataStore, ShardedLayout};
