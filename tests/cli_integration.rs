//! CLI Integration Tests
//!
//! These tests verify that the CLI commands work correctly end-to-end.
//! They test the actual binary behavior, not just the library.
//!
//! Run with:
//! ```bash
//! cargo test --test cli_integration
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::tempdir;

/// Get the path to the built binary
fn shardstore_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_shardstore"))
}

/// Run shardstore command and return (stdout, stderr, success)
fn run(args: &[&str], root: &Path) -> (String, String, bool) {
    let output = Command::new(shardstore_binary())
        .args(["-r", root.to_str().unwrap(), "-f", "json"])
        .args(args)
        .output()
        .expect("Failed to execute shardstore");

    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.success(),
    )
}

fn json(stdout: &str) -> serde_json::Value {
    serde_json::from_str(stdout.trim()).expect("stdout should be JSON")
}

// ============================================================================
// File Commands
// ============================================================================

#[test]
fn test_cli_put_cat_stat() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("store");
    let source = dir.path().join("hello.txt");
    std::fs::write(&source, "hello from disk").unwrap();

    let (stdout, stderr, success) = run(&["put", source.to_str().unwrap(), "/docs/hello.txt"], &root);
    assert!(success, "put should succeed: {stderr}");
    let put = json(&stdout);
    assert_eq!(put["status"], "ok");
    assert_eq!(put["size"], 15);

    let (stdout, _, success) = run(&["cat", "/docs/hello.txt"], &root);
    assert!(success);
    assert_eq!(stdout, "hello from disk");

    let (stdout, _, success) = run(&["stat", "/docs/hello.txt"], &root);
    assert!(success);
    let stat = json(&stdout);
    assert_eq!(stat["node_type"], "file");
    assert_eq!(stat["size"], 15);
}

#[test]
fn test_cli_put_from_stdin() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("store");

    let mut child = Command::new(shardstore_binary())
        .args(["-r", root.to_str().unwrap(), "put", "-", "/piped.txt"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("Failed to execute shardstore");
    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"streamed bytes")
        .unwrap();
    assert!(child.wait_with_output().unwrap().status.success());

    let (stdout, _, success) = run(&["cat", "/piped.txt"], &root);
    assert!(success);
    assert_eq!(stdout, "streamed bytes");
}

// ============================================================================
// Namespace Commands
// ============================================================================

#[test]
fn test_cli_mkdir_ls_mv_rm() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("store");
    let source = dir.path().join("a.txt");
    std::fs::write(&source, "a").unwrap();

    assert!(run(&["mkdir", "/inbox"], &root).2);
    assert!(run(&["mkdir", "/archive"], &root).2);
    assert!(run(&["put", source.to_str().unwrap(), "/inbox/a.txt"], &root).2);

    let (stdout, _, success) = run(&["ls", "/"], &root);
    assert!(success);
    let listing = json(&stdout);
    assert_eq!(listing["count"], 2);

    assert!(run(&["mv", "/inbox/a.txt", "/archive/a.txt"], &root).2);
    let listing = json(&run(&["ls", "/archive"], &root).0);
    assert_eq!(listing["entries"][0]["name"], "a.txt");

    let (_, _, success) = run(&["rm", "/archive"], &root);
    assert!(!success, "removing a non-empty directory should fail");

    assert!(run(&["rm", "/archive/a.txt"], &root).2);
    assert!(run(&["rm", "/archive"], &root).2);
    let listing = json(&run(&["ls"], &root).0);
    assert_eq!(listing["count"], 1);
}

#[test]
fn test_cli_missing_path_fails() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("store");

    let (_, stderr, success) = run(&["cat", "/nope"], &root);
    assert!(!success);
    assert!(stderr.contains("Not found"), "stderr was: {stderr}");
}

#[test]
fn test_cli_rejects_bad_config() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("store.json");
    std::fs::write(&config, r#"{ "driver": "s3", "root": "/tmp/x" }"#).unwrap();

    let output = Command::new(shardstore_binary())
        .args(["-c", config.to_str().unwrap(), "ls"])
        .output()
        .expect("Failed to execute shardstore");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Unsupported driver"));
}
