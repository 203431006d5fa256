//! Rejoin cycles: recorded mappings stop later walks, squash rejoins
//! peel correctly, and round-tripped history stays clean.

mod common;

use common::*;

#[test]
fn rejoin_records_marker_and_reuses_history() {
    let repo = setup_repo();
    commit_file(repo.path(), "sub/app.txt", "v1\n", "sub: create app");

    let first = splice_ok(repo.path(), &["split", "--prefix=sub", "--rejoin"]);
    let first = first.trim().to_owned();

    // The rejoin merge records the mapping.
    let body = message(repo.path(), "HEAD");
    assert!(body.contains("git-subtree-dir: sub"), "body: {body}");
    assert!(body.contains(&format!("git-subtree-split: {first}")), "body: {body}");
    assert_eq!(git(repo.path(), &["rev-parse", "HEAD^2"]), first);

    // No new subtree commits: a second split reuses the recorded tip.
    commit_file(repo.path(), "notes.txt", "n\n", "mainline: notes");
    let second = splice_ok(repo.path(), &["split", "--prefix=sub"]);
    assert_eq!(second.trim(), first);
}

#[test]
fn rejoin_loop_keeps_subtree_history_clean() {
    let mainline = setup_repo();
    let (lib, _) = setup_subtree_repo();

    splice_ok(
        mainline.path(),
        &[
            "add",
            "--prefix=sub",
            &lib.path().display().to_string(),
            "main",
        ],
    );

    // Two split+rejoin cycles with interleaved commits on both sides.
    for round in 1..=2 {
        commit_file(
            mainline.path(),
            "notes.txt",
            &format!("round {round}\n"),
            &format!("mainline: notes {round}"),
        );
        commit_file(
            mainline.path(),
            "sub/feature.txt",
            &format!("feature {round}\n"),
            &format!("sub: feature {round}"),
        );
        splice_ok(mainline.path(), &["split", "--prefix=sub", "--rejoin"]);
    }

    // A third split must contain exactly the subtree-touching commits
    // (the library's own history plus the two features) and no markers.
    let tip = splice_ok(mainline.path(), &["split", "--prefix=sub"]);
    let subjects = subjects_of_history(mainline.path(), tip.trim());
    assert_eq!(
        subjects,
        vec![
            "sub: feature 2".to_owned(),
            "sub: feature 1".to_owned(),
            "lib: add two".to_owned(),
            "lib: initial".to_owned(),
        ]
    );
    for rev in git(mainline.path(), &["rev-list", tip.trim()]).lines() {
        let body = message(mainline.path(), rev);
        assert!(
            !body.contains("git-subtree"),
            "marker leaked into split history: {body}"
        );
    }
}

#[test]
fn rejoin_is_idempotent_across_runs() {
    let repo = setup_repo();
    commit_file(repo.path(), "sub/app.txt", "v1\n", "sub: create app");
    splice_ok(repo.path(), &["split", "--prefix=sub", "--rejoin"]);

    commit_file(repo.path(), "sub/app.txt", "v2\n", "sub: bump app");
    let second = splice_ok(repo.path(), &["split", "--prefix=sub", "--rejoin"]);

    // Splitting again without changes reproduces the same tip.
    let third = splice_ok(repo.path(), &["split", "--prefix=sub"]);
    assert_eq!(third.trim(), second.trim());
}

#[test]
fn ignore_joins_rederives_mainline_history() {
    let repo = setup_repo();
    commit_file(repo.path(), "sub/app.txt", "v1\n", "sub: create app");
    splice_ok(repo.path(), &["split", "--prefix=sub", "--rejoin"]);
    commit_file(repo.path(), "sub/app.txt", "v2\n", "sub: bump app");

    // Honoring the join reuses the recorded (unannotated) history below
    // the rejoin point.
    let honored = splice_ok(repo.path(), &["split", "--prefix=sub", "--annotate=(x) "]);
    assert_eq!(
        subjects_of_history(repo.path(), honored.trim()),
        vec!["(x) sub: bump app".to_owned(), "sub: create app".to_owned()],
    );

    // Ignoring joins walks through the rejoin merge and re-derives every
    // mainline commit, so the annotation reaches all of them.
    let ignored = splice_ok(
        repo.path(),
        &["split", "--prefix=sub", "--annotate=(x) ", "--ignore-joins"],
    );
    assert_eq!(
        subjects_of_history(repo.path(), ignored.trim()),
        vec![
            "(x) sub: bump app".to_owned(),
            "(x) sub: create app".to_owned(),
        ],
    );
}

#[test]
fn squash_rejoin_creates_squash_second_parent() {
    let repo = setup_repo();
    commit_file(repo.path(), "sub/app.txt", "v1\n", "sub: create app");

    let tip = splice_ok(
        repo.path(),
        &["split", "--prefix=sub", "--rejoin", "--squash"],
    );
    let tip = tip.trim().to_owned();

    // The merge's second parent is the squash commit, while the trailer
    // records the real split tip.
    let squash = git(repo.path(), &["rev-parse", "HEAD^2"]);
    assert_ne!(squash, tip);
    assert!(message(repo.path(), &squash).starts_with("Squashed 'sub/' content from commit "));
    let body = message(repo.path(), "HEAD");
    assert!(body.contains(&format!("git-subtree-split: {tip}")), "body: {body}");
}

#[test]
fn squash_rejoin_peels_through_prior_squash() {
    let repo = setup_repo();
    commit_file(repo.path(), "sub/app.txt", "v1\n", "sub: create app");
    splice_ok(
        repo.path(),
        &["split", "--prefix=sub", "--rejoin", "--squash"],
    );

    commit_file(repo.path(), "sub/app.txt", "v2\n", "sub: bump app");
    splice_ok(
        repo.path(),
        &["split", "--prefix=sub", "--rejoin", "--squash"],
    );

    // The second squash must chain onto the first (one-step peel through
    // the rejoin merge's second parent), producing a range message.
    let squash = git(repo.path(), &["rev-parse", "HEAD^2"]);
    let squash_msg = message(repo.path(), &squash);
    assert!(
        squash_msg.starts_with("Squashed 'sub/' changes from "),
        "squash message: {squash_msg}"
    );
    let squash_parent = git(repo.path(), &["rev-parse", &format!("{squash}^")]);
    assert!(
        message(repo.path(), &squash_parent).starts_with("Squashed 'sub/' content from commit "),
        "squash should chain onto the prior squash"
    );
}

#[test]
fn squash_rejoin_without_changes_reports_up_to_date() {
    let repo = setup_repo();
    commit_file(repo.path(), "sub/app.txt", "v1\n", "sub: create app");
    let first = splice_ok(
        repo.path(),
        &["split", "--prefix=sub", "--rejoin", "--squash"],
    );

    let head_before = head(repo.path());
    let out = splice_in(
        repo.path(),
        &["split", "--prefix=sub", "--rejoin", "--squash"],
    );
    assert!(out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("already at commit"), "stderr: {stderr}");
    assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), first.trim());
    assert_eq!(head(repo.path()), head_before, "HEAD must not move");
}
