//! Readers that present stored content as one continuous stream

use crate::model::{BlobId, VersionedMeta};
use crate::store::BlobStore;
use crate::{Error, Result};
use std::io::{self, Cursor, Read};

/// A readable view over a file's content, embedded or chunked
pub struct ContentReader {
    size: u64,
    inner: Inner,
}

enum Inner {
    Empty,
    Embedded(Cursor<Vec<u8>>),
    Chunked(ChunkListReader),
}

impl ContentReader {
    /// Build a reader for a metadata record.
    ///
    /// Fails when the record claims bytes it does not reference, as legacy
    /// records do.
    pub fn new(blobs: BlobStore, meta: &VersionedMeta) -> Result<Self> {
        let size = meta.size();
        let inner = if let Some(data) = meta.embedded_data() {
            if data.len() as u64 != size {
                return Err(Error::SizeMismatch {
                    expected: size,
                    actual: data.len() as u64,
                });
            }
            Inner::Embedded(Cursor::new(data.to_vec()))
        } else if !meta.shards().is_empty() {
            Inner::Chunked(ChunkListReader::new(blobs, meta.shards().to_vec()))
        } else if size == 0 {
            Inner::Empty
        } else {
            return Err(Error::NotFound(format!(
                "content of a {size}-byte v{} record",
                meta.version()
            )));
        };
        Ok(ContentReader { size, inner })
    }

    /// Size recorded in the metadata
    pub fn size(&self) -> u64 {
        self.size
    }
}

impl Read for ContentReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.inner {
            Inner::Empty => Ok(0),
            Inner::Embedded(cursor) => cursor.read(buf),
            Inner::Chunked(chunks) => chunks.read(buf),
        }
    }
}

/// Reads each blob of a chunk list in order, loading one blob at a time
struct ChunkListReader {
    blobs: BlobStore,
    remaining: std::vec::IntoIter<BlobId>,
    current: Cursor<Vec<u8>>,
}

impl ChunkListReader {
    fn new(blobs: BlobStore, hashes: Vec<BlobId>) -> Self {
        ChunkListReader {
            blobs,
            remaining: hashes.into_iter(),
            current: Cursor::new(Vec::new()),
        }
    }
}

impl Read for ChunkListReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            let n = self.current.read(buf)?;
            if n > 0 {
                return Ok(n);
            }
            match self.remaining.next() {
                Some(id) => {
                    let data = self.blobs.read(&id).map_err(|e| e.into_io())?;
                    self.current = Cursor::new(data);
                }
                None => return Ok(0),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FileMetaRecord, FileMetaV1};
    use tempfile::tempdir;

    #[test]
    fn test_chunked_reader_concatenates_in_order() {
        let dir = tempdir().unwrap();
        let blobs = BlobStore::open(dir.path());

        let ids: Vec<_> = [&b"abc"[..], b"def", b"g"]
            .iter()
            .map(|chunk| blobs.write(chunk).unwrap())
            .collect();
        let meta = VersionedMeta::V2(FileMetaRecord::chunked(7, ids, 3, "text/plain"));

        let mut out = String::new();
        ContentReader::new(blobs, &meta)
            .unwrap()
            .read_to_string(&mut out)
            .unwrap();
        assert_eq!(out, "abcdefg");
    }

    #[test]
    fn test_missing_blob_surfaces_not_found() {
        let dir = tempdir().unwrap();
        let blobs = BlobStore::open(dir.path());

        let meta = VersionedMeta::V2(FileMetaRecord::chunked(
            3,
            vec![BlobId::digest(b"gone")],
            3,
            "text/plain",
        ));
        let err = ContentReader::new(blobs, &meta)
            .unwrap()
            .read_to_end(&mut Vec::new())
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_empty_record_reads_nothing() {
        let dir = tempdir().unwrap();
        let meta = VersionedMeta::V2(FileMetaRecord::empty());
        let mut reader = ContentReader::new(BlobStore::open(dir.path()), &meta).unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert!(out.is_empty());
        assert_eq!(reader.size(), 0);
    }

    #[test]
    fn test_sized_record_without_content_is_rejected() {
        let dir = tempdir().unwrap();
        let blobs = BlobStore::open(dir.path());

        let legacy = VersionedMeta::V1(FileMetaV1 {
            size: 11,
            mime_type: "text/plain".into(),
            modify_time: 1,
            ref_count: 1,
        });
        let err = ContentReader::new(blobs.clone(), &legacy).err().unwrap();
        assert!(err.is_not_found());

        let upgraded = VersionedMeta::V2(legacy.into_current());
        assert!(ContentReader::new(blobs.clone(), &upgraded).err().unwrap().is_not_found());

        let mut truncated = FileMetaRecord::embedded(b"abc".to_vec(), "text/plain");
        truncated.size = 10;
        let err = ContentReader::new(blobs, &VersionedMeta::V2(truncated)).err().unwrap();
        assert!(matches!(err, Error::SizeMismatch { expected: 10, actual: 3 }));
    }
}
