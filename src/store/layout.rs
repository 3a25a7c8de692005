//! Sharded on-disk layout
//!
//! Maps an opaque string id to `base/id[0:2]/id[2:4]/id` and provides atomic
//! byte-level writes (temp file beside the target, then rename).

use crate::{Error, Result};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::trace;

/// Minimum id length; the first four characters pick the shard directories
pub const MIN_ID_LEN: usize = 4;

/// A directory of files spread over two levels of prefix subdirectories
#[derive(Clone, Debug)]
pub struct ShardedLayout {
    base: PathBuf,
}

impl ShardedLayout {
    /// Create a layout rooted at `base`. Directories are created lazily on write.
    pub fn new(base: impl AsRef<Path>) -> Self {
        ShardedLayout {
            base: base.as_ref().to_path_buf(),
        }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Resolve the file path for an id
    pub fn id_to_path(&self, id: &str) -> Result<PathBuf> {
        if id.len() < MIN_ID_LEN || !id.is_char_boundary(2) || !id.is_char_boundary(4) {
            return Err(Error::InvalidInput(format!(
                "id {id:?} is shorter than {MIN_ID_LEN} characters"
            )));
        }
        if id.contains(['/', '\\']) || id.starts_with('.') {
            return Err(Error::InvalidInput(format!(
                "id {id:?} contains path characters"
            )));
        }
        Ok(self.base.join(&id[0..2]).join(&id[2..4]).join(id))
    }

    /// Atomically write `data` under `id`, replacing any previous content
    pub fn write(&self, id: &str, data: &[u8]) -> Result<()> {
        let path = self.id_to_path(id)?;
        let dir = path
            .parent()
            .ok_or_else(|| Error::InvalidInput(format!("no parent for {}", path.display())))?;
        fs::create_dir_all(dir).map_err(|e| Error::io_at(dir.display().to_string(), e))?;

        let mut tmp =
            NamedTempFile::new_in(dir).map_err(|e| Error::io_at(dir.display().to_string(), e))?;
        tmp.write_all(data)
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| Error::io_at(tmp.path().display().to_string(), e))?;
        tmp.persist(&path)
            .map_err(|e| Error::io_at(path.display().to_string(), e.error))?;

        trace!(id, bytes = data.len(), "layout write");
        Ok(())
    }

    /// Read the content stored under `id`
    pub fn read(&self, id: &str) -> Result<Vec<u8>> {
        let path = self.id_to_path(id)?;
        fs::read(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => Error::NotFound(id.to_string()),
            _ => Error::io_at(path.display().to_string(), e),
        })
    }

    /// Whether `id` is present. Absence is `Ok(false)`, never an error.
    pub fn exists(&self, id: &str) -> Result<bool> {
        let path = self.id_to_path(id)?;
        Ok(path.is_file())
    }

    /// Remove the content stored under `id`
    pub fn delete(&self, id: &str) -> Result<()> {
        let path = self.id_to_path(id)?;
        fs::remove_file(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => Error::NotFound(id.to_string()),
            _ => Error::io_at(path.display().to_string(), e),
        })?;
        trace!(id, "layout delete");
        Ok(())
    }
}
