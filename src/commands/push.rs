//! `splice push`: split and push the subtree history to a remote.

use anyhow::Result;
use clap::Args;

use crate::annotation::normalize_dir;
use crate::config::SpliceConfig;
use crate::engine::{SplitOptions, Splitter};
use crate::error::SpliceError;
use crate::git::GitRepo;

use super::split::{Finish, finish, require_rejoin_for};
use super::{ensure_clean, require_prefix, resolve_required};

/// Split the prefix history and push it to a remote repository
///
/// Performs the same walk as `splice split`, then pushes the synthesized
/// tip to the given ref. Repository and ref fall back to the
/// `[subtree."<prefix>"]` section of .splice.toml when omitted.
#[derive(Args, Debug)]
pub struct PushArgs {
    /// Subdirectory to split out
    #[arg(long, value_name = "DIR")]
    pub prefix: String,

    /// Remote repository URL or path
    #[arg(value_name = "REPOSITORY")]
    pub repository: Option<String>,

    /// Remote ref to push to
    #[arg(value_name = "REF")]
    pub remote_ref: Option<String>,

    /// Prepend this text to every synthesized commit message
    #[arg(long, value_name = "TEXT")]
    pub annotate: Option<String>,

    /// Create or fast-forward this local branch to the split tip
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

pub fn run(args: &PushArgs, quiet: bool) -> Result<()> {
    require_rejoin_for(args.squash, args.message.is_some(), args.rejoin)?;

    let repo = GitRepo::discover()?;
    let prefix = normalize_dir(&args.prefix);
    let config = SpliceConfig::load(repo.root())?;
    let sub_config = config.subtree(&prefix);

    let repository = args
        .repository
        .as_deref()
        .or(sub_config.and_then(|c| c.repository.as_deref()))
        .ok_or_else(|| SpliceError::InvalidFlags {
            detail: format!(
                "no repository given and none configured for '{prefix}'.\n  \
                 Usage: splice push --prefix={prefix} <repository> <ref>"
            ),
        })?;
    let remote_ref = args
        .remote_ref
        .as_deref()
        .or(sub_config.and_then(|c| c.branch.as_deref()))
        .ok_or_else(|| SpliceError::InvalidFlags {
            detail: format!(
                "no ref given and none configured for '{prefix}'.\n  \
                 Usage: splice push --prefix={prefix} <repository> <ref>"
            ),
        })?;

    let rev = resolve_required(&repo, "HEAD")?;
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

    let refspec = if remote_ref.starts_with("refs/") {
        remote_ref.to_owned()
    } else {
        format!("refs/heads/{remote_ref}")
    };
    repo.push(repository, &result, &refspec)?;
    if !quiet {
        eprintln!("Pushed {result} to {repository} {refspec}");
    }
    Ok(())
}
