//! `splice merge`: merge new subtree history into the subdirectory.

use anyhow::Result;
use clap::Args;

use crate::annotation::normalize_dir;
use crate::config::SpliceConfig;
use crate::git::GitRepo;

use super::{merge_into, resolve_required};

/// Merge recent subtree changes into the prefix directory
///
/// Merges a subtree commit into HEAD using the subtree merge strategy.
/// With --squash (or `squash = true` in .splice.toml) the incoming
/// changes since the last squash are collapsed into one synthesized
/// commit first, keeping the mainline history free of subtree noise.
#[derive(Args, Debug)]
pub struct MergeArgs {
    /// Subdirectory the subtree lives at
    #[arg(long, value_name = "DIR")]
    pub prefix: String,

    /// Subtree commit to merge
    #[arg(value_name = "COMMIT")]
    pub commit: String,

    /// Collapse incoming changes into a single squash commit
    #[arg(long)]
    pub squash: bool,

    /// Use this message for the merge commit instead of the default
    #[arg(long, short, value_name = "TEXT")]
    pub message: Option<String>,
}

pub fn run(args: &MergeArgs, quiet: bool) -> Result<()> {
    let repo = GitRepo::discover()?;
    let prefix = normalize_dir(&args.prefix);
    let config = SpliceConfig::load(repo.root())?;
    let squash = args.squash || config.subtree(&prefix).is_some_and(|c| c.squash);

    let rev = resolve_required(&repo, &args.commit)?;
    merge_into(&repo, &prefix, &rev, squash, args.message.as_deref(), quiet)
}
