//! Error types for shardstore

use thiserror::Error;

/// Result type alias for shardstore operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in shardstore operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("IO error at {context}: {source}")]
    IoAt {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unsupported metadata version: {0}")]
    UnsupportedVersion(u32),

    #[error("Size mismatch: expected {expected} bytes, read {actual}")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("Directory not empty: {0}")]
    NotEmpty(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("Not a file: {0}")]
    NotAFile(String),

    #[error("Partial failure: {0}")]
    PartialFailure(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    /// Attach path or id context to an I/O error
    pub fn io_at(context: impl Into<String>, source: std::io::Error) -> Self {
        Error::IoAt {
            context: context.into(),
            source,
        }
    }

    /// True for misses, including I/O errors of kind `NotFound`
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound(_) => true,
            Error::Io(e) | Error::IoAt { source: e, .. } => {
                e.kind() == std::io::ErrorKind::NotFound
            }
            _ => false,
        }
    }

    /// True for the invalid-input family (bad ids, size mismatch, bad version tag)
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            Error::InvalidInput(_) | Error::UnsupportedVersion(_) | Error::SizeMismatch { .. }
        )
    }

    /// Convert into an `std::io::Error` for use inside `Read` impls
    pub(crate) fn into_io(self) -> std::io::Error {
        use std::io::ErrorKind;
        match self {
            Error::Io(e) | Error::IoAt { source: e, .. } => e,
            Error::NotFound(_) => std::io::Error::new(ErrorKind::NotFound, self),
            Error::SizeMismatch { .. } => std::io::Error::new(ErrorKind::UnexpectedEof, self),
            other => std::io::Error::new(ErrorKind::Other, other),
        }
    }
}
