//! Blob store - the unit of content-addressed storage
//!
//! A blob is one raw chunk of bytes stored under the SHA-256 of those bytes.

use super::ShardedLayout;
use crate::model::BlobId;
use crate::Result;
use std::path::Path;

/// Content-addressed storage of raw byte blocks
#[derive(Clone, Debug)]
pub struct BlobStore {
    layout: ShardedLayout,
}

impl BlobStore {
    pub fn new(layout: ShardedLayout) -> Self {
        BlobStore { layout }
    }

    /// Open the blob store rooted at `base`
    pub fn open(base: impl AsRef<Path>) -> Self {
        BlobStore::new(ShardedLayout::new(base))
    }

    /// Store a blob and return its id. Re-writing identical bytes is harmless.
    pub fn write(&self, data: &[u8]) -> Result<BlobId> {
        let id = BlobId::digest(data);
        self.layout.write(&id.to_hex(), data)?;
        Ok(id)
    }

    /// Store a blob unless it is already present.
    ///
    /// Returns the id and whether this call created the blob.
    pub fn write_new(&self, data: &[u8]) -> Result<(BlobId, bool)> {
        let id = BlobId::digest(data);
        let hex = id.to_hex();
        if self.layout.exists(&hex)? {
            return Ok((id, false));
        }
        self.layout.write(&hex, data)?;
        Ok((id, true))
    }

    pub fn read(&self, id: &BlobId) -> Result<Vec<u8>> {
        self.layout.read(&id.to_hex())
    }

    pub fn exists(&self, id: &BlobId) -> Result<bool> {
        self.layout.exists(&id.to_hex())
    }

    pub fn delete(&self, id: &BlobId) -> Result<()> {
        self.layout.delete(&id.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use tempfile::tempdir;

    #[test]
    fn test_blob_id_is_sha256() {
        let dir = tempdir().unwrap();
        let store = BlobStore::open(dir.path());

        let id = store.write(b"hello world").unwrap();
        assert_eq!(id, BlobId::digest(b"hello world"));
        assert_eq!(store.read(&id).unwrap(), b"hello world");

        let hex = id.to_hex();
        let on_disk = dir.path().join(&hex[0..2]).join(&hex[2..4]).join(&hex);
        assert_eq!(std::fs::read(on_disk).unwrap(), b"hello world");
    }

    #[test]
    fn test_deduplication() {
        let dir = tempdir().unwrap();
        let store = BlobStore::open(dir.path());

        let id1 = store.write(b"duplicate data").unwrap();
        let id2 = store.write(b"duplicate data").unwrap();

        assert_eq!(id1, id2);
        assert_eq!(store.read(&id1).unwrap(), b"duplicate data");
    }

    #[test]
    fn test_write_new_reports_fresh_blobs() {
        let dir = tempdir().unwrap();
        let store = BlobStore::open(dir.path());

        let (id, fresh) = store.write_new(b"chunk").unwrap();
        assert!(fresh);
        let (again, fresh) = store.write_new(b"chunk").unwrap();
        assert_eq!(id, again);
        assert!(!fresh);
    }

    #[test]
    fn test_delete() {
        let dir = tempdir().unwrap();
        let store = BlobStore::open(dir.path());

        let id = store.write(b"bye").unwrap();
        assert!(store.exists(&id).unwrap());
        store.delete(&id).unwrap();
        assert!(!store.exists(&id).unwrap());
        assert!(matches!(store.read(&id), Err(Error::NotFound(_))));
    }
}
