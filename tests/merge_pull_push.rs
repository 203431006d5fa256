//! merge / pull / push drivers: squash chains, the already-at fast
//! path, and publishing split history to a remote.

mod common;

use common::*;

#[test]
fn pull_squash_chains_squash_commits() {
    let mainline = setup_repo();
    let (lib, _) = setup_subtree_repo();
    let lib_path = lib.path().display().to_string();

    splice_ok(
        mainline.path(),
        &["add", "--prefix=sub", "--squash", &lib_path, "main"],
    );

    // Upstream moves on.
    let lib_tip = commit_file(lib.path(), "lib.rs", "pub fn three() {}\n", "lib: add three");

    splice_ok(
        mainline.path(),
        &["pull", "--prefix=sub", "--squash", &lib_path, "main"],
    );

    // Subtree content was updated.
    let content = std::fs::read_to_string(mainline.path().join("sub/lib.rs")).unwrap();
    assert!(content.contains("three"));

    // The merge's second parent is a range squash chained onto the add's
    // squash commit.
    let squash = git(mainline.path(), &["rev-parse", "HEAD^2"]);
    let squash_msg = message(mainline.path(), &squash);
    assert!(
        squash_msg.starts_with("Squashed 'sub/' changes from "),
        "squash message: {squash_msg}"
    );
    assert!(squash_msg.contains(&format!("git-subtree-split: {lib_tip}")));
    let prior = git(mainline.path(), &["rev-parse", &format!("{squash}^")]);
    assert!(message(mainline.path(), &prior).starts_with("Squashed 'sub/' content from commit "));
}

#[test]
fn pull_squash_without_upstream_changes_is_noop() {
    let mainline = setup_repo();
    let (lib, _) = setup_subtree_repo();
    let lib_path = lib.path().display().to_string();

    splice_ok(
        mainline.path(),
        &["add", "--prefix=sub", "--squash", &lib_path, "main"],
    );

    let head_before = head(mainline.path());
    let out = splice_in(
        mainline.path(),
        &["pull", "--prefix=sub", "--squash", &lib_path, "main"],
    );
    assert!(
        out.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    assert!(
        String::from_utf8_lossy(&out.stderr).contains("already at commit"),
        "stderr: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    assert_eq!(head(mainline.path()), head_before, "HEAD must not move");
}

#[test]
fn merge_without_add_fails_for_squash() {
    let mainline = setup_repo();
    commit_file(mainline.path(), "sub/app.txt", "v1\n", "sub: create app");

    let stderr = splice_fails(
        mainline.path(),
        &["merge", "--prefix=sub", "--squash", "HEAD"],
    );
    assert!(stderr.contains("never added"), "stderr: {stderr}");
}

#[test]
fn merge_missing_prefix_fails() {
    let mainline = setup_repo();
    let stderr = splice_fails(mainline.path(), &["merge", "--prefix=sub", "HEAD"]);
    assert!(stderr.contains("does not exist in HEAD"), "stderr: {stderr}");
}

#[test]
fn plain_merge_brings_in_subtree_commit() {
    let mainline = setup_repo();
    let (lib, _) = setup_subtree_repo();
    let lib_path = lib.path().display().to_string();

    splice_ok(mainline.path(), &["add", "--prefix=sub", &lib_path, "main"]);
    let lib_tip = commit_file(lib.path(), "lib.rs", "pub fn three() {}\n", "lib: add three");

    splice_ok(
        mainline.path(),
        &["pull", "--prefix=sub", &lib_path, "main"],
    );

    assert_eq!(git(mainline.path(), &["rev-parse", "HEAD^2"]), lib_tip);
    let content = std::fs::read_to_string(mainline.path().join("sub/lib.rs")).unwrap();
    assert!(content.contains("three"));
}

#[test]
fn push_publishes_split_history() {
    let mainline = setup_repo();
    commit_file(mainline.path(), "sub/app.txt", "v1\n", "sub: create app");
    commit_file(mainline.path(), "sub/app.txt", "v2\n", "sub: bump app");

    let remote = tempfile::TempDir::new().unwrap();
    git(remote.path(), &["init", "--bare", "-b", "main"]);
    let remote_path = remote.path().display().to_string();

    splice_ok(
        mainline.path(),
        &["push", "--prefix=sub", &remote_path, "feature"],
    );

    // The remote branch exists and carries the subtree's tree.
    let remote_tip = git(remote.path(), &["rev-parse", "refs/heads/feature"]);
    let local_split = splice_ok(mainline.path(), &["split", "--prefix=sub"]);
    assert_eq!(remote_tip, local_split.trim());
    assert_eq!(
        git(remote.path(), &["rev-parse", "refs/heads/feature^{tree}"]),
        git(mainline.path(), &["rev-parse", "HEAD:sub"]),
    );
}

#[test]
fn push_uses_configured_remote() {
    let mainline = setup_repo();
    commit_file(mainline.path(), "sub/app.txt", "v1\n", "sub: create app");

    let remote = tempfile::TempDir::new().unwrap();
    git(remote.path(), &["init", "--bare", "-b", "main"]);

    std::fs::write(
        mainline.path().join(".splice.toml"),
        format!(
            "[subtree.sub]\nrepository = \"{}\"\nbranch = \"exported\"\n",
            remote.path().display()
        ),
    )
    .unwrap();
    git(mainline.path(), &["add", ".splice.toml"]);
    git(mainline.path(), &["commit", "-m", "configure sub remote"]);

    splice_ok(mainline.path(), &["push", "--prefix=sub"]);
    let remote_tip = git(remote.path(), &["rev-parse", "refs/heads/exported"]);
    assert_eq!(
        git(remote.path(), &[
            "rev-parse",
            &format!("{remote_tip}^{{tree}}")
        ]),
        git(mainline.path(), &["rev-parse", "HEAD:sub"]),
    );
}

#[test]
fn pull_without_repository_or_config_fails() {
    let mainline = setup_repo();
    commit_file(mainline.path(), "sub/app.txt", "v1\n", "sub: create app");

    let stderr = splice_fails(mainline.path(), &["pull", "--prefix=sub"]);
    assert!(stderr.contains("no repository"), "stderr: {stderr}");
}
