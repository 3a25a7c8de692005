//! Core data model types for shardstore

mod hash;
mod meta;
mod node;

pub use hash::{BlobId, ContentId, Hash};
pub use meta::{
    now_millis, sniff_mime, FileMetaRecord, FileMetaV1, VersionedMeta, DEFAULT_MIME, SCHEMA_V1,
    SCHEMA_V2, SNIFF_LEN,
};
pub use node::{IndexNode, NodeId, NodeType, DIR_MODE, FILE_MODE};
