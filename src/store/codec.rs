//! Versioned binary codec for file metadata records
//!
//! Encoded form:
//! ```text
//! [version: u32 LE][record: bincode, schema chosen by version]
//! ```
//!
//! The version is decoded on its own first, then the full envelope is decoded
//! with the schema for that version. Only the current schema is ever written.

use crate::model::{FileMetaRecord, FileMetaV1, VersionedMeta, SCHEMA_V1, SCHEMA_V2};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Schema version written by [`encode`]
pub const CURRENT_VERSION: u32 = SCHEMA_V2;

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    version: u32,
    data: &'a T,
}

#[derive(Deserialize)]
struct EnvelopeHeader {
    version: u32,
}

#[derive(Deserialize)]
struct Envelope<T> {
    version: u32,
    data: T,
}

/// Encode a record at the current schema version
pub fn encode(record: &FileMetaRecord) -> Result<Vec<u8>> {
    Ok(bincode::serialize(&EnvelopeRef {
        version: CURRENT_VERSION,
        data: record,
    })?)
}

/// Encode a legacy record. Only used to produce V1 fixtures; stores never call it.
pub fn encode_v1(record: &FileMetaV1) -> Result<Vec<u8>> {
    Ok(bincode::serialize(&EnvelopeRef {
        version: SCHEMA_V1,
        data: record,
    })?)
}

/// Read just the version tag of an encoded record
pub fn peek_version(bytes: &[u8]) -> Result<u32> {
    let header: EnvelopeHeader = bincode::deserialize(bytes)?;
    Ok(header.version)
}

/// Decode a record of any supported version
pub fn decode(bytes: &[u8]) -> Result<VersionedMeta> {
    match peek_version(bytes)? {
        SCHEMA_V1 => {
            let env: Envelope<FileMetaV1> = bincode::deserialize(bytes)?;
            debug_assert_eq!(env.version, SCHEMA_V1);
            Ok(VersionedMeta::V1(env.data))
        }
        SCHEMA_V2 => {
            let env: Envelope<FileMetaRecord> = bincode::deserialize(bytes)?;
            debug_assert_eq!(env.version, SCHEMA_V2);
            Ok(VersionedMeta::V2(env.data))
        }
        other => Err(Error::UnsupportedVersion(other)),
    }
}

/// Build the current-schema equivalent of a legacy record
pub fn upgrade(v1: FileMetaV1) -> FileMetaRecord {
    v1.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Hash;

    fn legacy() -> FileMetaV1 {
        FileMetaV1 {
            size: 7,
            mime_type: "text/plain".into(),
            modify_time: 1_700_000_000_000,
            ref_count: 1,
        }
    }

    #[test]
    fn test_encode_writes_current_version() {
        let record = FileMetaRecord::embedded(b"hi".to_vec(), "text/plain");
        let bytes = encode(&record).unwrap();
        assert_eq!(peek_version(&bytes).unwrap(), CURRENT_VERSION);
        assert_eq!(decode(&bytes).unwrap(), VersionedMeta::V2(record));
    }

    #[test]
    fn test_chunked_record_keeps_blob_order() {
        let hashes = vec![Hash::digest(b"b"), Hash::digest(b"a"), Hash::digest(b"c")];
        let record = FileMetaRecord::chunked(30, hashes.clone(), 10, "application/octet-stream");
        let decoded = decode(&encode(&record).unwrap()).unwrap();
        assert_eq!(decoded.shards(), hashes.as_slice());
    }

    #[test]
    fn test_legacy_v1_still_decodes() {
        let bytes = encode_v1(&legacy()).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.version(), SCHEMA_V1);
        assert_eq!(decoded, VersionedMeta::V1(legacy()));
    }

    #[test]
    fn test_unknown_version_rejected() {
        let mut bytes = encode_v1(&legacy()).unwrap();
        bytes[0..4].copy_from_slice(&99u32.to_le_bytes());
        let err = decode(&bytes).unwrap_err();
        assert!(matches!(err, Error::UnsupportedVersion(99)));
        assert!(err.is_invalid_input());
    }

    #[test]
    fn test_truncated_input() {
        assert!(matches!(decode(&[1, 0]), Err(Error::Serialization(_))));
    }

    #[test]
    fn test_upgrade() {
        let v2 = upgrade(legacy());
        assert_eq!(v2.size, 7);
        assert!(v2.embedded_data.is_none());
        assert!(v2.blob_hashes.is_empty());
        assert_eq!(v2.blob_chunk_size, 0);
    }
}
