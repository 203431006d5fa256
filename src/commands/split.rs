//! `splice split`: synthesize the subtree's independent history.

use anyhow::Result;
use clap::Args;

use crate::annotation::{TrailerBlock, normalize_dir, with_trailers};
use crate::engine::{SplitOptions, Splitter};
use crate::error::SpliceError;
use crate::git::GitRepo;
use crate::model::CommitId;

use super::{ensure_clean, find_latest_squash, new_squash_commit, require_prefix, resolve_required};

/// Extract the prefix directory's history as a standalone branch
///
/// Walks the mainline history, synthesizes a commit for every change that
/// touched the prefix, and prints the resulting subtree tip on stdout.
/// Re-running with identical flags reproduces identical commit ids, and
/// prior splits recorded by --rejoin stop the walk early.
#[derive(Args, Debug)]
pub struct SplitArgs {
    /// Subdirectory to split out
    #[arg(long, value_name = "DIR")]
    pub prefix: String,

    /// Mainline commit to split from (defaults to HEAD)
    #[arg(value_name = "COMMIT")]
    pub commit: Option<String>,

    /// Prepend this text to every synthesized commit message
    #[arg(long, value_name = "TEXT")]
    pub annotate: Option<String>,

    /// Create or fast-forward this branch to the split tip
    #[arg(long, short, value_name = "BRANCH")]
    pub branch: Option<String>,

    /// Ignore prior rejoin markers and re-derive everything
    #[arg(long)]
    pub ignore_joins: bool,

    /// Treat this commit as already-split subtree history (repeatable)
    #[arg(long, value_name = "COMMIT")]
    pub onto: Vec<String>,

    /// Treat this commit as predating the subtree (repeatable)
    #[arg(long, value_name = "COMMIT")]
    pub notree: Vec<String>,

    /// Merge the split history back, recording the mapping for later runs
    #[arg(long)]
    pub rejoin: bool,

    /// Assert that BEFORE was previously split as AFTER (repeatable)
    #[arg(long, value_name = "BEFORE:AFTER")]
    pub remember: Vec<String>,

    /// Squash the rejoin merge (requires --rejoin)
    #[arg(long)]
    pub squash: bool,

    /// Use this message for the rejoin commit (requires --rejoin)
    #[arg(long, short, value_name = "TEXT")]
    pub message: Option<String>,
}

/// Post-split actions shared between `split` and `push`.
pub(crate) struct Finish<'a> {
    pub rejoin: bool,
    pub squash: bool,
    pub message: Option<&'a str>,
    pub branch: Option<&'a str>,
}

pub fn run(args: &SplitArgs, quiet: bool) -> Result<()> {
    require_rejoin_for(args.squash, args.message.is_some(), args.rejoin)?;

    let repo = GitRepo::discover()?;
    let prefix = normalize_dir(&args.prefix);
    let rev = resolve_required(&repo, args.commit.as_deref().unwrap_or("HEAD"))?;
    require_prefix(&repo, &rev, &prefix)?;
    if args.rejoin {
        ensure_clean(&repo)?;
    }

    let options = SplitOptions {
        annotate: args.annotate.clone(),
        ignore_joins: args.ignore_joins,
        onto: args.onto.clone(),
        notree: args.notree.clone(),
        remember: args.remember.clone(),
        quiet,
    };
    let mut splitter = Splitter::new(&repo, prefix.clone(), options);
    let result = splitter.run(&rev)?;

    finish(
        &repo,
        &prefix,
        &splitter,
        &rev,
        &result,
        &Finish {
            rejoin: args.rejoin,
            squash: args.squash,
            message: args.message.as_deref(),
            branch: args.branch.as_deref(),
        },
        quiet,
    )?;

    println!("{result}");
    Ok(())
}

/// Reject add/merge-group flags on a split-producing command unless a
/// rejoin commit will carry them.
pub(crate) fn require_rejoin_for(
    squash: bool,
    message: bool,
    rejoin: bool,
) -> Result<(), SpliceError> {
    if (squash || message) && !rejoin {
        let flag = if squash { "--squash" } else { "--message" };
        return Err(SpliceError::InvalidFlags {
            detail: format!("'{flag}' on a split only applies to the rejoin commit; add '--rejoin'."),
        });
    }
    Ok(())
}

/// Apply `--rejoin` and `--branch` after a successful split.
pub(crate) fn finish(
    repo: &GitRepo,
    prefix: &str,
    splitter: &Splitter<'_>,
    rev: &CommitId,
    result: &CommitId,
    fin: &Finish<'_>,
    quiet: bool,
) -> Result<()> {
    if fin.rejoin {
        let mainline = splitter.latest_mainline().unwrap_or(rev).clone();
        let core = fin
            .message
            .map(str::to_owned)
            .unwrap_or_else(|| format!("Split '{prefix}/' into commit '{result}'"));
        let trailers = TrailerBlock {
            dir: prefix.to_owned(),
            mainline: Some(mainline.to_string()),
            split: result.to_string(),
        };
        let full_message = with_trailers(&core, &trailers);

        let merge_rev = if fin.squash {
            match find_latest_squash(repo, prefix, &repo.head()?)? {
                Some((_, old_tip)) if old_tip == *result => {
                    if !quiet {
                        eprintln!("Subtree is already at commit {result}.");
                    }
                    None
                }
                Some((old_squash, old_tip)) => Some(new_squash_commit(
                    repo,
                    prefix,
                    Some(&old_squash),
                    Some(&old_tip),
                    result,
                )?),
                None => Some(new_squash_commit(repo, prefix, None, None, result)?),
            }
        } else {
            Some(result.clone())
        };

        if let Some(merge_rev) = merge_rev {
            repo.subtree_merge(&merge_rev, prefix, Some(&full_message), true)?;
        }
    }

    if let Some(branch) = fin.branch {
        let refname = format!("refs/heads/{branch}");
        if repo.ref_exists(&refname)? {
            let existing = resolve_required(repo, branch)?;
            if !repo.is_ancestor(&existing, result)? {
                return Err(SpliceError::BranchNotAncestor {
                    branch: branch.to_owned(),
                    commit: result.clone(),
                }
                .into());
            }
        }
        repo.update_ref(&refname, result)?;
        if !quiet {
            eprintln!("Updated branch '{branch}'");
        }
    }

    Ok(())
}
