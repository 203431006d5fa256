//! `splice pull`: fetch and merge remote subtree history.

use anyhow::Result;
use clap::Args;

use crate::annotation::normalize_dir;
use crate::config::SpliceConfig;
use crate::error::SpliceError;
use crate::git::GitRepo;

use super::merge_into;

/// Fetch a ref from a remote repository and merge it into the prefix
///
/// Equivalent to a fetch followed by `splice merge` of FETCH_HEAD.
/// Repository and ref fall back to the `[subtree."<prefix>"]` section of
/// .splice.toml when omitted.
#[derive(Args, Debug)]
pub struct PullArgs {
    /// Subdirectory the subtree lives at
    #[arg(long, value_name = "DIR")]
    pub prefix: String,

    /// Remote repository URL or path
    #[arg(value_name = "REPOSITORY")]
    pub repository: Option<String>,

    /// Remote ref to fetch
    #[arg(value_name = "REF")]
    pub remote_ref: Option<String>,

    /// Collapse incoming changes into a single squash commit
    #[arg(long)]
    pub squash: bool,

    /// Use this message for the merge commit instead of the default
    #[arg(long, short, value_name = "TEXT")]
    pub message: Option<String>,
}

pub fn run(args: &PullArgs, quiet: bool) -> Result<()> {
    let repo = GitRepo::discover()?;
    let prefix = normalize_dir(&args.prefix);
    let config = SpliceConfig::load(repo.root())?;
    let sub_config = config.subtree(&prefix);
    let squash = args.squash || sub_config.is_some_and(|c| c.squash);

    let repository = args
        .repository
        .as_deref()
        .or(sub_config.and_then(|c| c.repository.as_deref()))
        .ok_or_else(|| SpliceError::InvalidFlags {
            detail: format!(
                "no repository given and none configured for '{prefix}'.\n  \
                 Usage: splice pull --prefix={prefix} <repository> <ref>"
            ),
        })?;
    let remote_ref = args
        .remote_ref
        .as_deref()
        .or(sub_config.and_then(|c| c.branch.as_deref()))
        .ok_or_else(|| SpliceError::InvalidFlags {
            detail: format!(
                "no ref given and none configured for '{prefix}'.\n  \
                 Usage: splice pull --prefix={prefix} <repository> <ref>"
            ),
        })?;

    let fetched = repo.fetch(repository, remote_ref)?;
    merge_into(&repo, &prefix, &fetched, squash, args.message.as_deref(), quiet)
}
