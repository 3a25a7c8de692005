//! Hierarchical path namespace over sharded flat files

mod manager;
mod path;

pub use manager::IndexManager;
pub use path::{join_path, normalize_path, path_key, split_parent, validate_name};
