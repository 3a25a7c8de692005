//! Store configuration
//!
//! Supplied by the embedding application at construction time, or loaded
//! from a JSON file:
//!
//! ```json
//! { "driver": "local", "root": "/var/lib/shardstore", "chunk_size": 4194304 }
//! ```

use crate::content::DEFAULT_CHUNK_SIZE;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The only supported storage driver
pub const LOCAL_DRIVER: &str = "local";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Storage driver name; must be "local"
    #[serde(default = "default_driver")]
    pub driver: String,
    /// Base directory holding `blobs/`, `meta/` and `index/`
    pub root: PathBuf,
    /// Size of chunk blobs for large files
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_driver() -> String {
    LOCAL_DRIVER.to_string()
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

impl StoreConfig {
    /// Local store at `root` with the default chunk size
    pub fn new(root: impl Into<PathBuf>) -> Self {
        StoreConfig {
            driver: default_driver(),
            root: root.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Load a JSON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        let config: StoreConfig = serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Default store location (`<data dir>/shardstore`)
    pub fn default_root() -> Result<PathBuf> {
        dirs::data_dir()
            .map(|d| d.join("shardstore"))
            .ok_or_else(|| Error::Config("Could not find data directory".into()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.driver != LOCAL_DRIVER {
            return Err(Error::Config(format!(
                "Unsupported driver '{}' (expected '{}')",
                self.driver, LOCAL_DRIVER
            )));
        }
        if self.chunk_size == 0 {
            return Err(Error::Config("chunk_size must be at least 1".into()));
        }
        Ok(())
    }

    pub fn blobs_dir(&self) -> PathBuf {
        self.root.join("blobs")
    }

    pub fn meta_dir(&self) -> PathBuf {
        self.root.join("meta")
    }

    pub fn index_dir(&self) -> PathBuf {
        self.root.join("index")
    }
}
