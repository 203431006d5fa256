//! Shared test helpers for splice integration tests.
//!
//! All tests use temp directories, with no side effects on the real repo.
//! Each test builds its own throwaway git repos via `setup_repo()` /
//! `setup_subtree_repo()`.

#![allow(dead_code)]

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

/// Run a git command in the given directory. Panics on failure.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let out = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_AUTHOR_NAME", "Test")
        .env("GIT_AUTHOR_EMAIL", "test@test.invalid")
        .env("GIT_COMMITTER_NAME", "Test")
        .env("GIT_COMMITTER_EMAIL", "test@test.invalid")
        .output()
        .unwrap_or_else(|e| panic!("failed to spawn git {}: {e}", args.join(" ")));
    assert!(
        out.status.success(),
        "git {} failed (exit {}):\nstdout: {}\nstderr: {}",
        args.join(" "),
        out.status.code().unwrap_or(-1),
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr),
    );
    String::from_utf8_lossy(&out.stdout).trim().to_owned()
}

/// Create a fresh git repo with one initial commit on `main`.
pub fn setup_repo() -> TempDir {
    let dir = TempDir::new().expect("failed to create temp dir");
    let root = dir.path();

    git(root, &["init", "-b", "main"]);
    git(root, &["config", "user.name", "Test"]);
    git(root, &["config", "user.email", "test@test.invalid"]);
    git(root, &["config", "commit.gpgsign", "false"]);

    std::fs::write(root.join("README.md"), "# mainline\n").unwrap();
    git(root, &["add", "README.md"]);
    git(root, &["commit", "-m", "initial mainline commit"]);

    dir
}

/// Create a standalone "library" repo with two commits, to be added as a
/// subtree. Returns the repo and its tip commit id.
pub fn setup_subtree_repo() -> (TempDir, String) {
    let dir = TempDir::new().expect("failed to create temp dir");
    let root = dir.path();

    git(root, &["init", "-b", "main"]);
    git(root, &["config", "user.name", "Lib Author"]);
    git(root, &["config", "user.email", "lib@test.invalid"]);
    git(root, &["config", "commit.gpgsign", "false"]);

    std::fs::write(root.join("lib.rs"), "pub fn one() {}\n").unwrap();
    git(root, &["add", "lib.rs"]);
    git(root, &["commit", "-m", "lib: initial"]);

    std::fs::write(root.join("lib.rs"), "pub fn one() {}\npub fn two() {}\n").unwrap();
    git(root, &["add", "lib.rs"]);
    git(root, &["commit", "-m", "lib: add two"]);

    let tip = git(root, &["rev-parse", "HEAD"]);
    (dir, tip)
}

/// Write a file and commit it. Returns the new commit id.
pub fn commit_file(dir: &Path, rel_path: &str, content: &str, message: &str) -> String {
    let path = dir.join(rel_path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
    git(dir, &["add", rel_path]);
    git(dir, &["commit", "-m", message]);
    git(dir, &["rev-parse", "HEAD"])
}

/// Run splice with the given args in the given directory.
pub fn splice_in(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_splice"))
        .args(args)
        .current_dir(dir)
        .output()
        .expect("failed to execute splice")
}

/// Run splice and assert it succeeds. Returns stdout as string.
pub fn splice_ok(dir: &Path, args: &[&str]) -> String {
    let out = splice_in(dir, args);
    let stderr = String::from_utf8_lossy(&out.stderr);
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(
        out.status.success(),
        "splice {} failed:\nstdout: {stdout}\nstderr: {stderr}",
        args.join(" "),
    );
    stdout.to_string()
}

/// Run splice and assert it fails with exit code 1. Returns stderr.
pub fn splice_fails(dir: &Path, args: &[&str]) -> String {
    let out = splice_in(dir, args);
    assert!(
        !out.status.success(),
        "Expected splice {} to fail, but it succeeded.\nstdout: {}",
        args.join(" "),
        String::from_utf8_lossy(&out.stdout),
    );
    assert_eq!(
        out.status.code(),
        Some(1),
        "expected exit code 1 from splice {}",
        args.join(" "),
    );
    String::from_utf8_lossy(&out.stderr).to_string()
}

/// First line of a commit's message.
pub fn subject(dir: &Path, rev: &str) -> String {
    git(dir, &["log", "-1", "--format=%s", rev])
}

/// Full message body of a commit.
pub fn message(dir: &Path, rev: &str) -> String {
    git(dir, &["log", "-1", "--format=%B", rev])
}

/// `HEAD` of a repo.
pub fn head(dir: &Path) -> String {
    git(dir, &["rev-parse", "HEAD"])
}

/// All commit subjects reachable from `rev`, newest first.
pub fn subjects_of_history(dir: &Path, rev: &str) -> Vec<String> {
    git(dir, &["log", "--format=%s", rev])
        .lines()
        .map(str::to_owned)
        .collect()
}
