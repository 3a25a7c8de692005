//! Metadata service - content records keyed by content id
//!
//! Orchestrates the content assembler, the blob store and the metadata store.
//! Records are reference counted: writing content that already has a record
//! bumps its count, and deleting only removes blobs once the count hits zero.
//!
//! Writers may run concurrently with each other but never with the removal
//! of a last reference: a write that finds its chunks already on disk relies
//! on them until its record is persisted.

use crate::content::{ContentAssembler, ContentReader};
use crate::model::{BlobId, ContentId, FileMetaRecord, VersionedMeta};
use crate::store::{BlobStore, MetadataStore};
use crate::{Error, Result};
use parking_lot::{Mutex, RwLock};
use std::io::Read;
use tracing::{debug, error};

pub struct MetadataService {
    store: MetadataStore,
    blobs: BlobStore,
    assembler: ContentAssembler,
    /// Shared by writers, exclusive for deletes
    sweep: RwLock<()>,
    /// Serializes the read-modify-write of reference counts
    refs: Mutex<()>,
}

impl MetadataService {
    pub fn new(store: MetadataStore, blobs: BlobStore, assembler: ContentAssembler) -> Self {
        MetadataService {
            store,
            blobs,
            assembler,
            sweep: RwLock::new(()),
            refs: Mutex::new(()),
        }
    }

    /// Persist a stream and return its content id.
    ///
    /// `reader` must not call back into this service.
    pub fn create<R: Read>(&self, reader: R, size_hint: Option<u64>) -> Result<ContentId> {
        let _pin = self.sweep.read();
        let written = self.assembler.write_content(reader, size_hint)?;
        let id = written.id;

        let _guard = self.refs.lock();
        let existing = match self.store.get(&id) {
            Ok(meta) => Some(meta),
            Err(e) if e.is_not_found() => None,
            Err(e) => {
                self.assembler.discard(&written.new_blobs);
                return Err(e);
            }
        };

        let (record, stale) = match existing {
            None => (written.record, Vec::new()),
            Some(meta) => adopt(meta, written.record, &written.new_blobs),
        };

        if let Err(e) = self.store.create(&id, &record) {
            self.assembler.discard(&written.new_blobs);
            return Err(e);
        }
        self.assembler.discard(&stale);

        debug!(id = %id.short(), size = record.size, refs = record.ref_count, "created content");
        Ok(id)
    }

    pub fn get(&self, id: &ContentId) -> Result<VersionedMeta> {
        self.store.get(id)
    }

    /// Open the content of `id` for reading
    pub fn read(&self, id: &ContentId) -> Result<ContentReader> {
        let meta = self.store.get(id)?;
        self.assembler.new_reader(&meta)
    }

    /// Release one reference to `id`.
    ///
    /// The last reference removes every blob (stopping at the first failure)
    /// and then the record. A missing record is not an error.
    pub fn delete(&self, id: &ContentId) -> Result<()> {
        let _sweep = self.sweep.write();
        let _guard = self.refs.lock();
        let meta = match self.store.get(id) {
            Ok(meta) => meta,
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(e),
        };

        if meta.ref_count() > 1 {
            let mut record = meta.into_current();
            record.ref_count -= 1;
            self.store.update(id, &record)?;
            debug!(id = %id.short(), refs = record.ref_count, "released content reference");
            return Ok(());
        }

        for blob in meta.shards() {
            match self.blobs.delete(blob) {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    error!(id = %id, blob = %blob, error = %e, "blob removal failed");
                    return Err(Error::PartialFailure(format!(
                        "content {id}: blob {blob} could not be removed: {e}"
                    )));
                }
            }
        }

        match self.store.delete(id) {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }
        debug!(id = %id.short(), "deleted content");
        Ok(())
    }

    /// Upgrade a legacy record in place
    pub fn migrate(&self, id: &ContentId) -> Result<FileMetaRecord> {
        let _guard = self.refs.lock();
        self.store.migrate(id)
    }
}

/// Merge a fresh write into an existing record for the same content.
///
/// Returns the record to persist and the freshly written blobs it does not use.
fn adopt(
    existing: VersionedMeta,
    fresh: FileMetaRecord,
    new_blobs: &[BlobId],
) -> (FileMetaRecord, Vec<BlobId>) {
    let refs = existing.ref_count().max(1) + 1;
    let has_content =
        existing.size() == 0 || existing.embedded_data().is_some() || !existing.shards().is_empty();

    if has_content {
        let mut record = existing.into_current();
        record.ref_count = refs;
        let stale = new_blobs
            .iter()
            .filter(|b| !record.blob_hashes.contains(b))
            .copied()
            .collect();
        (record, stale)
    } else {
        // Legacy records carry no content of their own; take the new one
        let mut record = fresh;
        record.ref_count = refs;
        (record, Vec::new())
    }
}
