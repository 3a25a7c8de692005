//! Content assembler
//!
//! Turns a byte stream into either an embedded record (small content) or an
//! ordered list of chunk blobs plus a record referencing them, and turns a
//! record back into a readable stream.

use super::ContentReader;
use crate::model::{sniff_mime, BlobId, ContentId, FileMetaRecord, Hash, VersionedMeta, SNIFF_LEN};
use crate::store::BlobStore;
use crate::{Error, Result};
use sha2::{Digest, Sha256};
use std::io::{self, Cursor, ErrorKind, Read};
use tracing::{debug, error};

/// Content at or below this many bytes is embedded in its metadata record
pub const EMBED_THRESHOLD: usize = 256 * 1024;

/// Default size of a chunk blob
pub const DEFAULT_CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// Result of persisting a stream's bytes
#[derive(Clone, Debug)]
pub struct WrittenContent {
    /// SHA-256 of the whole stream
    pub id: ContentId,
    pub record: FileMetaRecord,
    /// Blobs this call created; a failed caller should discard exactly these
    pub new_blobs: Vec<BlobId>,
}

/// Stateless converter between streams and metadata records
#[derive(Clone, Debug)]
pub struct ContentAssembler {
    blobs: BlobStore,
    chunk_size: usize,
}

impl ContentAssembler {
    pub fn new(blobs: BlobStore, chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::InvalidInput("chunk size must be at least 1".into()));
        }
        Ok(ContentAssembler { blobs, chunk_size })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Persist the bytes of `reader`.
    ///
    /// `size_hint` of `None` or `Some(0)` means the length is unknown. A known
    /// size above the embed threshold is verified after chunking.
    pub fn write_content<R: Read>(&self, mut reader: R, size_hint: Option<u64>) -> Result<WrittenContent> {
        let threshold = EMBED_THRESHOLD as u64;
        match size_hint {
            Some(size) if size > 0 && size <= threshold => {
                let mut buf = vec![0u8; size as usize];
                let n = read_full(&mut reader, &mut buf)
                    .map_err(|e| Error::io_at("content stream", e))?;
                if n as u64 != size {
                    return Err(Error::SizeMismatch {
                        expected: size,
                        actual: n as u64,
                    });
                }
                Ok(embed(buf))
            }
            Some(size) if size > threshold => {
                let written = self.chunk_data(reader)?;
                if written.record.size != size {
                    self.discard(&written.new_blobs);
                    return Err(Error::SizeMismatch {
                        expected: size,
                        actual: written.record.size,
                    });
                }
                Ok(written)
            }
            _ => {
                let mut prefix = Vec::new();
                (&mut reader)
                    .take(threshold + 1)
                    .read_to_end(&mut prefix)
                    .map_err(|e| Error::io_at("content stream", e))?;
                if prefix.len() <= EMBED_THRESHOLD {
                    Ok(embed(prefix))
                } else {
                    self.chunk_data(Cursor::new(prefix).chain(reader))
                }
            }
        }
    }

    /// Split `reader` into fixed-size blobs while hashing the whole stream.
    ///
    /// On failure the blobs this call created are removed again.
    pub fn chunk_data<R: Read>(&self, reader: R) -> Result<WrittenContent> {
        let mut new_blobs = Vec::new();
        match self.chunk_into(reader, &mut new_blobs) {
            Ok((id, record)) => {
                debug!(
                    id = %id.short(),
                    size = record.size,
                    chunks = record.blob_hashes.len(),
                    "chunked content"
                );
                Ok(WrittenContent {
                    id,
                    record,
                    new_blobs,
                })
            }
            Err(e) => {
                self.discard(&new_blobs);
                Err(e)
            }
        }
    }

    /// A reader over the content a record describes
    pub fn new_reader(&self, meta: &VersionedMeta) -> Result<ContentReader> {
        ContentReader::new(self.blobs.clone(), meta)
    }

    /// Best-effort removal of blobs; failures are logged, not returned
    pub fn discard(&self, blobs: &[BlobId]) {
        for id in blobs {
            match self.blobs.delete(id) {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => error!(blob = %id, error = %e, "failed to remove blob"),
            }
        }
    }

    fn chunk_into<R: Read>(
        &self,
        mut reader: R,
        new_blobs: &mut Vec<BlobId>,
    ) -> Result<(ContentId, FileMetaRecord)> {
        let mut hasher = Sha256::new();
        let mut hashes = Vec::new();
        let mut total = 0u64;
        let mut head = Vec::with_capacity(SNIFF_LEN);
        let mut buf = vec![0u8; self.chunk_size];

        loop {
            let n = read_full(&mut reader, &mut buf).map_err(|e| Error::io_at("content stream", e))?;
            if n == 0 {
                break;
            }
            let block = &buf[..n];
            hasher.update(block);
            if head.len() < SNIFF_LEN {
                let take = (SNIFF_LEN - head.len()).min(n);
                head.extend_from_slice(&block[..take]);
            }

            let (id, created) = self.blobs.write_new(block)?;
            if created {
                new_blobs.push(id);
            }
            hashes.push(id);
            total += n as u64;

            if n < buf.len() {
                break;
            }
        }

        let id = Hash::from_hasher(hasher);
        let record = if total == 0 {
            FileMetaRecord::empty()
        } else {
            FileMetaRecord::chunked(
                total,
                hashes,
                self.chunk_size as u64,
                sniff_mime(&head),
            )
        };
        Ok((id, record))
    }
}

fn embed(data: Vec<u8>) -> WrittenContent {
    let id = ContentId::digest(&data);
    let record = if data.is_empty() {
        FileMetaRecord::empty()
    } else {
        let mime = sniff_mime(&data);
        FileMetaRecord::embedded(data, mime)
    };
    WrittenContent {
        id,
        record,
        new_blobs: Vec::new(),
    }
}

/// Fill `buf` as far as the stream allows; a short count means end of stream
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    fn assembler(dir: &std::path::Path, chunk_size: usize) -> ContentAssembler {
        ContentAssembler::new(BlobStore::open(dir), chunk_size).unwrap()
    }

    fn read_back(asm: &ContentAssembler, record: &FileMetaRecord) -> Vec<u8> {
        let mut out = Vec::new();
        asm.new_reader(&VersionedMeta::V2(record.clone()))
            .unwrap()
            .read_to_end(&mut out)
            .unwrap();
        out
    }

    #[test]
    fn test_small_known_size_is_embedded() {
        let dir = tempdir().unwrap();
        let asm = assembler(dir.path(), 1024);

        let written = asm.write_content(&b"hi"[..], Some(2)).unwrap();
        assert_eq!(written.id, Hash::digest(b"hi"));
        assert_eq!(written.record.embedded_data.as_deref(), Some(&b"hi"[..]));
        assert_eq!(written.record.ref_count, 1);
        assert!(written.new_blobs.is_empty());
        assert_eq!(read_back(&asm, &written.record), b"hi");
    }

    #[test]
    fn test_short_stream_for_known_small_size() {
        let dir = tempdir().unwrap();
        let asm = assembler(dir.path(), 1024);

        let err = asm.write_content(&b"abc"[..], Some(10)).unwrap_err();
        assert!(matches!(err, Error::SizeMismatch { expected: 10, actual: 3 }));
    }

    #[test]
    fn test_unknown_size_at_threshold_is_embedded() {
        let dir = tempdir().unwrap();
        let asm = assembler(dir.path(), 64 * 1024);
        let data = pattern(EMBED_THRESHOLD);

        let written = asm.write_content(&data[..], None).unwrap();
        assert!(written.record.is_embedded());
        assert_eq!(written.id, Hash::digest(&data));
    }

    #[test]
    fn test_unknown_size_above_threshold_is_chunked() {
        let dir = tempdir().unwrap();
        let asm = assembler(dir.path(), 100_000);
        let data = pattern(EMBED_THRESHOLD + 1);

        let written = asm.write_content(&data[..], Some(0)).unwrap();
        assert!(written.record.is_chunked());
        assert_eq!(written.record.size, data.len() as u64);
        assert_eq!(written.record.blob_hashes.len(), 3);
        assert_eq!(written.id, Hash::digest(&data));
        assert_eq!(read_back(&asm, &written.record), data);
    }

    #[test]
    fn test_known_size_mismatch_removes_blobs() {
        let dir = tempdir().unwrap();
        let blobs = BlobStore::open(dir.path());
        let asm = ContentAssembler::new(blobs.clone(), 64 * 1024).unwrap();
        let data = pattern(EMBED_THRESHOLD + 10);

        let err = asm
            .write_content(&data[..], Some(EMBED_THRESHOLD as u64 + 20))
            .unwrap_err();
        assert!(matches!(err, Error::SizeMismatch { .. }));

        let first = BlobId::digest(&data[..64 * 1024]);
        assert!(!blobs.exists(&first).unwrap());
    }

    #[test]
    fn test_chunks_reassemble_for_any_chunk_size() {
        let dir = tempdir().unwrap();
        for chunk_size in [1usize, 7, 64, 100] {
            let asm = assembler(dir.path(), chunk_size);
            // Exact multiple and ragged tail
            for len in [chunk_size * 3, chunk_size * 3 + 1, 1] {
                let data = pattern(len);
                let written = asm.chunk_data(&data[..]).unwrap();
                assert_eq!(written.id, Hash::digest(&data));
                assert_eq!(written.record.blob_hashes.len(), len.div_ceil(chunk_size));

                let mut joined = Vec::new();
                for id in &written.record.blob_hashes {
                    joined.extend(BlobStore::open(dir.path()).read(id).unwrap());
                }
                assert_eq!(joined, data);
            }
        }
    }

    #[test]
    fn test_empty_stream() {
        let dir = tempdir().unwrap();
        let asm = assembler(dir.path(), 16);

        for hint in [None, Some(0)] {
            let written = asm.write_content(io::empty(), hint).unwrap();
            assert_eq!(written.id, Hash::digest(b""));
            assert_eq!(written.record.size, 0);
            assert_eq!(written.record.ref_count, 1);
            assert!(read_back(&asm, &written.record).is_empty());
        }

        let chunked = asm.chunk_data(io::empty()).unwrap();
        assert_eq!(chunked.record.size, 0);
        assert!(chunked.record.blob_hashes.is_empty());
    }

    #[test]
    fn test_read_error_discards_created_blobs() {
        struct Failing {
            sent: bool,
        }
        impl Read for Failing {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                if self.sent {
                    return Err(io::Error::new(ErrorKind::BrokenPipe, "stream died"));
                }
                self.sent = true;
                buf[..4].copy_from_slice(b"abcd");
                Ok(4)
            }
        }

        let dir = tempdir().unwrap();
        let blobs = BlobStore::open(dir.path());
        let asm = ContentAssembler::new(blobs.clone(), 4).unwrap();

        let err = asm.chunk_data(Failing { sent: false }).unwrap_err();
        assert!(matches!(err, Error::IoAt { .. }));
        assert!(!blobs.exists(&BlobId::digest(b"abcd")).unwrap());
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let dir = tempdir().unwrap();
        assert!(ContentAssembler::new(BlobStore::open(dir.path()), 0).is_err());
    }

    #[test]
    fn test_mime_sniffed_across_small_chunks() {
        let dir = tempdir().unwrap();
        let asm = assembler(dir.path(), 4);

        let mut png = b"\x89PNG\r\n\x1a\n".to_vec();
        png.extend(pattern(100));
        let written = asm.chunk_data(&png[..]).unwrap();
        assert_eq!(written.record.mime_type, "image/png");

        let text = "plain words ".repeat(10);
        let written = asm.chunk_data(text.as_bytes()).unwrap();
        assert_eq!(written.record.mime_type, "text/plain; charset=utf-8");
    }
}
