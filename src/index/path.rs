//! Namespace path helpers

use crate::model::Hash;
use crate::{Error, Result};

/// Normalize an absolute path: collapse repeated slashes, drop `.` segments
/// and any trailing slash. `..` is rejected rather than resolved.
pub fn normalize_path(path: &str) -> Result<String> {
    if !path.starts_with('/') {
        return Err(Error::InvalidInput(format!("path {path:?} is not absolute")));
    }
    if path.contains('\0') {
        return Err(Error::InvalidInput(format!("path {path:?} contains NUL")));
    }

    let mut out = String::with_capacity(path.len());
    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                return Err(Error::InvalidInput(format!(
                    "path {path:?} contains '..'"
                )))
            }
            name => {
                out.push('/');
                out.push_str(name);
            }
        }
    }
    if out.is_empty() {
        out.push('/');
    }
    Ok(out)
}

/// Split a normalized path into parent path and final name. `None` for `/`.
pub fn split_parent(path: &str) -> Option<(&str, &str)> {
    if path == "/" {
        return None;
    }
    let idx = path.rfind('/')?;
    let parent = if idx == 0 { "/" } else { &path[..idx] };
    Some((parent, &path[idx + 1..]))
}

/// Join a normalized parent path and a child name
pub fn join_path(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// Key of a normalized path in the path index
pub fn path_key(path: &str) -> String {
    Hash::digest(path.as_bytes()).to_hex()
}

/// A single path component
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\0']) {
        return Err(Error::InvalidInput(format!("invalid name {name:?}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize_path("/").unwrap(), "/");
        assert_eq!(normalize_path("//a//b/").unwrap(), "/a/b");
        assert_eq!(normalize_path("/a/./b").unwrap(), "/a/b");
        assert!(normalize_path("a/b").is_err());
        assert!(normalize_path("/a/../b").is_err());
    }

    #[test]
    fn test_split_and_join() {
        assert_eq!(split_parent("/"), None);
        assert_eq!(split_parent("/a.txt"), Some(("/", "a.txt")));
        assert_eq!(split_parent("/dir/a.txt"), Some(("/dir", "a.txt")));
        assert_eq!(join_path("/", "a"), "/a");
        assert_eq!(join_path("/dir", "a"), "/dir/a");
    }

    #[test]
    fn test_path_key_is_shardable() {
        let key = path_key("/");
        assert_eq!(key.len(), 64);
        assert_ne!(path_key("/a"), path_key("/b"));
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("notes.md").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("a/b").is_err());
        assert!(validate_name("..").is_err());
    }
}
