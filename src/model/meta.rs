//! File metadata records and their schema versions

use super::Hash;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Legacy schema: size, mime type, time and ref count only
pub const SCHEMA_V1: u32 = 1;

/// Current schema: adds embedding and chunking
pub const SCHEMA_V2: u32 = 2;

/// Legacy (read-only) metadata record
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetaV1 {
    pub size: u64,
    pub mime_type: String,
    /// Unix millis
    pub modify_time: u64,
    pub ref_count: u64,
}

/// Current metadata record
///
/// For `size > 0` exactly one of `embedded_data` / `blob_hashes` is populated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetaRecord {
    pub size: u64,
    /// Unix millis
    pub modify_time: u64,
    pub mime_type: String,
    pub ref_count: u64,
    /// Inline content for small files
    pub embedded_data: Option<Vec<u8>>,
    /// Ordered chunk ids; concatenating them in order gives the content
    pub blob_hashes: Vec<Hash>,
    /// Chunk size the blobs were cut with (0 when not chunked)
    pub blob_chunk_size: u64,
}

impl FileMetaRecord {
    /// Record for inline content
    pub fn embedded(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        FileMetaRecord {
            size: data.len() as u64,
            modify_time: now_millis(),
            mime_type: mime_type.into(),
            ref_count: 1,
            embedded_data: if data.is_empty() { None } else { Some(data) },
            blob_hashes: Vec::new(),
            blob_chunk_size: 0,
        }
    }

    /// Record for chunked content
    pub fn chunked(
        size: u64,
        blob_hashes: Vec<Hash>,
        blob_chunk_size: u64,
        mime_type: impl Into<String>,
    ) -> Self {
        FileMetaRecord {
            size,
            modify_time: now_millis(),
            mime_type: mime_type.into(),
            ref_count: 1,
            embedded_data: None,
            blob_hashes,
            blob_chunk_size,
        }
    }

    /// Record for zero-length content
    pub fn empty() -> Self {
        FileMetaRecord::embedded(Vec::new(), DEFAULT_MIME)
    }

    pub fn is_embedded(&self) -> bool {
        self.embedded_data.is_some()
    }

    pub fn is_chunked(&self) -> bool {
        !self.blob_hashes.is_empty()
    }
}

impl From<FileMetaV1> for FileMetaRecord {
    /// Upgrade a legacy record; embedding and chunking stay empty
    fn from(v1: FileMetaV1) -> Self {
        FileMetaRecord {
            size: v1.size,
            modify_time: v1.modify_time,
            mime_type: v1.mime_type,
            ref_count: v1.ref_count,
            embedded_data: None,
            blob_hashes: Vec::new(),
            blob_chunk_size: 0,
        }
    }
}

/// A decoded record of any supported schema version
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VersionedMeta {
    V1(FileMetaV1),
    V2(FileMetaRecord),
}

impl VersionedMeta {
    pub fn version(&self) -> u32 {
        match self {
            VersionedMeta::V1(_) => SCHEMA_V1,
            VersionedMeta::V2(_) => SCHEMA_V2,
        }
    }

    pub fn size(&self) -> u64 {
        match self {
            VersionedMeta::V1(m) => m.size,
            VersionedMeta::V2(m) => m.size,
        }
    }

    pub fn mod_time(&self) -> u64 {
        match self {
            VersionedMeta::V1(m) => m.modify_time,
            VersionedMeta::V2(m) => m.modify_time,
        }
    }

    pub fn mime_type(&self) -> &str {
        match self {
            VersionedMeta::V1(m) => &m.mime_type,
            VersionedMeta::V2(m) => &m.mime_type,
        }
    }

    pub fn ref_count(&self) -> u64 {
        match self {
            VersionedMeta::V1(m) => m.ref_count,
            VersionedMeta::V2(m) => m.ref_count,
        }
    }

    pub fn embedded_data(&self) -> Option<&[u8]> {
        match self {
            VersionedMeta::V1(_) => None,
            VersionedMeta::V2(m) => m.embedded_data.as_deref(),
        }
    }

    /// Chunk ids in content order (empty for embedded or legacy records)
    pub fn shards(&self) -> &[Hash] {
        match self {
            VersionedMeta::V1(_) => &[],
            VersionedMeta::V2(m) => &m.blob_hashes,
        }
    }

    /// Convert to the current schema
    pub fn into_current(self) -> FileMetaRecord {
        match self {
            VersionedMeta::V1(m) => m.into(),
            VersionedMeta::V2(m) => m,
        }
    }
}

impl From<FileMetaRecord> for VersionedMeta {
    fn from(record: FileMetaRecord) -> Self {
        VersionedMeta::V2(record)
    }
}

/// Fallback mime type for unrecognized or empty content
pub const DEFAULT_MIME: &str = "application/octet-stream";

/// How many leading bytes [`sniff_mime`] looks at
pub const SNIFF_LEN: usize = 512;

/// Guess a mime type from the leading bytes of some content
pub fn sniff_mime(prefix: &[u8]) -> &'static str {
    const MAGIC: &[(&[u8], &str)] = &[
        (b"\x89PNG\r\n\x1a\n", "image/png"),
        (b"\xff\xd8\xff", "image/jpeg"),
        (b"GIF87a", "image/gif"),
        (b"GIF89a", "image/gif"),
        (b"%PDF-", "application/pdf"),
        (b"PK\x03\x04", "application/zip"),
        (b"\x1f\x8b\x08", "application/x-gzip"),
    ];

    if prefix.is_empty() {
        return DEFAULT_MIME;
    }
    for &(magic, mime) in MAGIC {
        if prefix.starts_with(magic) {
            return mime;
        }
    }

    let sample = &prefix[..prefix.len().min(SNIFF_LEN)];
    let text = match std::str::from_utf8(sample) {
        Ok(_) => true,
        // A multi-byte character cut at the sample boundary is still text
        Err(e) => e.error_len().is_none(),
    };
    if text && !sample.contains(&0) {
        "text/plain; charset=utf-8"
    } else {
        DEFAULT_MIME
    }
}

/// Current time in unix millis
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
