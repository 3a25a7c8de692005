//! Metadata store - versioned metadata envelopes keyed by content id

use super::{codec, ShardedLayout};
use crate::model::{ContentId, FileMetaRecord, VersionedMeta};
use crate::Result;
use std::path::Path;
use tracing::debug;

/// Persists file metadata records atop a sharded layout
#[derive(Clone, Debug)]
pub struct MetadataStore {
    layout: ShardedLayout,
}

impl MetadataStore {
    pub fn new(layout: ShardedLayout) -> Self {
        MetadataStore { layout }
    }

    /// Open the metadata store rooted at `base`
    pub fn open(base: impl AsRef<Path>) -> Self {
        MetadataStore::new(ShardedLayout::new(base))
    }

    /// Schema version new records are written with
    pub fn current_version(&self) -> u32 {
        codec::CURRENT_VERSION
    }

    /// Store a record. Last write wins; no existence check.
    pub fn create(&self, id: &ContentId, record: &FileMetaRecord) -> Result<()> {
        self.put(id, record)
    }

    /// Replace a record. Last write wins; no existence check.
    pub fn update(&self, id: &ContentId, record: &FileMetaRecord) -> Result<()> {
        self.put(id, record)
    }

    pub fn get(&self, id: &ContentId) -> Result<VersionedMeta> {
        let bytes = self.layout.read(&id.to_hex())?;
        codec::decode(&bytes)
    }

    pub fn exists(&self, id: &ContentId) -> Result<bool> {
        self.layout.exists(&id.to_hex())
    }

    /// Remove a record; `NotFound` if absent
    pub fn delete(&self, id: &ContentId) -> Result<()> {
        self.layout.delete(&id.to_hex())
    }

    /// Rewrite a legacy record at the current version and return it.
    ///
    /// Records already at the current version are returned untouched.
    pub fn migrate(&self, id: &ContentId) -> Result<FileMetaRecord> {
        match self.get(id)? {
            VersionedMeta::V1(v1) => {
                let record = codec::upgrade(v1);
                self.update(id, &record)?;
                debug!(id = %id.short(), "migrated metadata record to v{}", codec::CURRENT_VERSION);
                Ok(record)
            }
            VersionedMeta::V2(record) => Ok(record),
        }
    }

    /// Write a raw, already-encoded envelope. Used to seed legacy records.
    pub fn put_raw(&self, id: &ContentId, bytes: &[u8]) -> Result<()> {
        self.layout.write(&id.to_hex(), bytes)
    }

    fn put(&self, id: &ContentId, record: &FileMetaRecord) -> Result<()> {
        let bytes = codec::encode(record)?;
        self.layout.write(&id.to_hex(), &bytes)
    }
}
