//! CLI subcommands.
//!
//! Thin orchestrators over the split engine and the git service. Each
//! module exposes a clap `Args` struct and a `run` function; shared
//! commit-shape synthesis (squash commits, marker lookup) lives here.

pub mod add;
pub mod merge;
pub mod pull;
pub mod push;
pub mod split;

use anyhow::Result;

use crate::annotation::{Annotation, TrailerBlock, with_trailers};
use crate::error::SpliceError;
use crate::git::GitRepo;
use crate::model::CommitId;

/// Resolve a user-supplied revision or fail with the offending token.
pub(crate) fn resolve_required(repo: &GitRepo, rev: &str) -> Result<CommitId, SpliceError> {
    match repo.resolve(rev)? {
        Some(id) => Ok(id),
        None => Err(SpliceError::BadRevision { rev: rev.to_owned() }),
    }
}

/// Refuse to run on a dirty index or working tree.
pub(crate) fn ensure_clean(repo: &GitRepo) -> Result<(), SpliceError> {
    if repo.is_clean()? {
        Ok(())
    } else {
        Err(SpliceError::WorkingTreeDirty)
    }
}

/// Require the prefix to exist as a directory tree at the given commit.
pub(crate) fn require_prefix(
    repo: &GitRepo,
    commit: &CommitId,
    prefix: &str,
) -> Result<(), SpliceError> {
    if repo.subtree_of(commit, prefix)?.is_some() {
        Ok(())
    } else {
        Err(SpliceError::PrefixNotFound {
            prefix: prefix.to_owned(),
        })
    }
}

/// Find the most recent squash state for `dir` in the history of `from`.
///
/// Returns `(squash_commit, subtree_tip)`:
///
/// - a squash marker (`{dir, split}`) yields itself and its recorded tip;
/// - an add/rejoin marker (`{dir, mainline, split}`) is peeled one step to
///   the marker merge's second parent, which is the squash commit for a
///   squashed join and the split tip itself otherwise.
pub(crate) fn find_latest_squash(
    repo: &GitRepo,
    dir: &str,
    from: &CommitId,
) -> Result<Option<(CommitId, CommitId)>, SpliceError> {
    let grep = format!("^git-subtree-dir: {dir}/*$");
    for record in repo.log_grep(from, &grep)? {
        let ann = Annotation::parse(&record.message);
        if !ann.names_dir(dir) {
            continue;
        }
        let Some(split_raw) = ann.split.as_deref() else {
            continue;
        };
        let Some(split) = repo.resolve(split_raw)? else {
            tracing::debug!(commit = %record.commit, "marker split does not resolve, skipping");
            continue;
        };
        if ann.mainline.is_some() {
            let peeled = format!("{}^2", record.commit);
            let Some(squash) = repo.resolve(&peeled)? else {
                tracing::debug!(commit = %record.commit, "join marker has no second parent, skipping");
                continue;
            };
            tracing::debug!(squash = %squash, tip = %split, "latest squash via join marker");
            return Ok(Some((squash, split)));
        }
        tracing::debug!(squash = %record.commit, tip = %split, "latest squash");
        return Ok(Some((record.commit, split)));
    }
    Ok(None)
}

/// Synthesize a squash commit collapsing subtree history up to `new_tip`.
///
/// The message embeds the rev-range summary produced by git (treated as
/// opaque text) plus the `{dir, split}` trailers that let later runs
/// recognize the squash.
pub(crate) fn new_squash_commit(
    repo: &GitRepo,
    dir: &str,
    old_squash: Option<&CommitId>,
    old_tip: Option<&CommitId>,
    new_tip: &CommitId,
) -> Result<CommitId, SpliceError> {
    let tree = repo.root_tree(new_tip)?;
    let new_short = repo.short(new_tip)?;

    let subject = match old_tip {
        Some(old) => {
            let old_short = repo.short(old)?;
            let forward = repo.oneline_log(old, new_tip, "")?;
            let reverted = repo.oneline_log(new_tip, old, "REVERT: ")?;
            let mut body = format!("Squashed '{dir}/' changes from {old_short}..{new_short}\n");
            if !forward.trim().is_empty() {
                body.push('\n');
                body.push_str(forward.trim_end());
                body.push('\n');
            }
            if !reverted.trim().is_empty() {
                body.push_str(reverted.trim_end());
                body.push('\n');
            }
            body
        }
        None => format!("Squashed '{dir}/' content from commit {new_short}"),
    };

    let trailers = TrailerBlock {
        dir: dir.to_owned(),
        mainline: None,
        split: new_tip.to_string(),
    };
    let message = with_trailers(&subject, &trailers);

    let parents: Vec<CommitId> = old_squash.cloned().into_iter().collect();
    Ok(repo.commit_tree(&tree, &parents, None, &message)?)
}

/// Shared squash-aware merge driver for `merge` and `pull`.
pub(crate) fn merge_into(
    repo: &GitRepo,
    prefix: &str,
    rev: &CommitId,
    squash: bool,
    message: Option<&str>,
    quiet: bool,
) -> Result<()> {
    let head = repo.head()?;
    require_prefix(repo, &head, prefix)?;
    ensure_clean(repo)?;

    let merge_rev = if squash {
        let Some((old_squash, old_tip)) = find_latest_squash(repo, prefix, &head)? else {
            return Err(SpliceError::SubtreeNeverAdded {
                prefix: prefix.to_owned(),
            }
            .into());
        };
        if old_tip == *rev {
            // Already at the target: success, not an error.
            if !quiet {
                eprintln!("Subtree is already at commit {rev}.");
            }
            return Ok(());
        }
        new_squash_commit(repo, prefix, Some(&old_squash), Some(&old_tip), rev)?
    } else {
        rev.clone()
    };

    repo.subtree_merge(&merge_rev, prefix, message, false)?;
    Ok(())
}
