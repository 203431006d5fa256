//! `splice add`: import a history into a new subdirectory.

use anyhow::Result;
use clap::Args;

use crate::annotation::{TrailerBlock, normalize_dir, with_trailers};
use crate::config::SpliceConfig;
use crate::error::SpliceError;
use crate::git::GitRepo;
use crate::model::CommitId;

use super::{ensure_clean, new_squash_commit};

/// Add a commit or remote history as a new subtree
///
/// Imports the contents of a commit into a subdirectory of the current
/// repository, recording the origin in commit trailers so later merges
/// and splits recognize it.
///
/// The source is either a local commit, or a repository plus ref:
///
///   splice add --prefix=vendor/lib <commit>
///   splice add --prefix=vendor/lib <repository> <ref>
///
/// With a `[subtree."<prefix>"]` section in .splice.toml, both can be
/// omitted. By default the full imported history becomes part of the
/// mainline; --squash collapses it to a single synthesized commit first.
#[derive(Args, Debug)]
pub struct AddArgs {
    /// Subdirectory to place the subtree at
    #[arg(long, value_name = "DIR")]
    pub prefix: String,

    /// Local commit to add, or a repository when a ref follows
    #[arg(value_name = "COMMIT-OR-REPOSITORY")]
    pub source: Option<String>,

    /// Remote ref to fetch when the first argument is a repository
    #[arg(value_name = "REF")]
    pub remote_ref: Option<String>,

    /// Collapse the imported history into a single squash commit
    #[arg(long)]
    pub squash: bool,

    /// Use this message for the merge commit instead of the default
    #[arg(long, short, value_name = "TEXT")]
    pub message: Option<String>,
}

pub fn run(args: &AddArgs, quiet: bool) -> Result<()> {
    let repo = GitRepo::discover()?;
    let prefix = normalize_dir(&args.prefix);
    let config = SpliceConfig::load(repo.root())?;
    let sub_config = config.subtree(&prefix);
    let squash = args.squash || sub_config.is_some_and(|c| c.squash);

    if repo.root().join(&prefix).exists() {
        return Err(SpliceError::PrefixExists { prefix }.into());
    }
    ensure_clean(&repo)?;

    let rev = resolve_source(
        &repo,
        args.source.as_deref(),
        args.remote_ref.as_deref(),
        sub_config.and_then(|c| c.repository.as_deref()),
        sub_config.and_then(|c| c.branch.as_deref()),
    )?;

    let headrev = repo.head()?;
    repo.read_tree_into_prefix(&rev, &prefix)?;
    repo.checkout_path(&prefix)?;
    let tree = repo.write_tree()?;

    let (second_parent, message) = if squash {
        let squashed = new_squash_commit(&repo, &prefix, None, None, &rev)?;
        let message = args
            .message
            .clone()
            .unwrap_or_else(|| format!("Merge commit '{rev}' as '{prefix}'"));
        (squashed, message)
    } else {
        let core = args
            .message
            .clone()
            .unwrap_or_else(|| format!("Add '{prefix}/' from commit '{rev}'"));
        let trailers = TrailerBlock {
            dir: prefix.clone(),
            mainline: Some(headrev.to_string()),
            split: rev.to_string(),
        };
        (rev.clone(), with_trailers(&core, &trailers))
    };

    let commit = repo.commit_tree(&tree, &[headrev, second_parent], None, &message)?;
    repo.reset_to(&commit)?;

    if !quiet {
        eprintln!("Added '{prefix}/' from commit {}", repo.short(&rev)?);
    }
    Ok(())
}

/// Work out which commit to add from positionals and config defaults.
fn resolve_source(
    repo: &GitRepo,
    source: Option<&str>,
    remote_ref: Option<&str>,
    config_repository: Option<&str>,
    config_branch: Option<&str>,
) -> Result<CommitId, SpliceError> {
    match (source, remote_ref) {
        (Some(repository), Some(remote_ref)) => Ok(repo.fetch(repository, remote_ref)?),
        (Some(token), None) => {
            if let Some(id) = repo.resolve(token)? {
                return Ok(id);
            }
            // Not a commit: with a configured branch, treat the token as
            // a repository.
            if let Some(branch) = config_branch {
                return Ok(repo.fetch(token, branch)?);
            }
            Err(SpliceError::BadRevision {
                rev: token.to_owned(),
            })
        }
        (None, _) => match (config_repository, config_branch) {
            (Some(repository), Some(branch)) => Ok(repo.fetch(repository, branch)?),
            _ => Err(SpliceError::InvalidFlags {
                detail: "no commit given and no repository configured.\n  \
                         Usage: splice add --prefix=<dir> <commit>\n  \
                         or:    splice add --prefix=<dir> <repository> <ref>"
                    .to_owned(),
            }),
        },
    }
}
