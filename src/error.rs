//! Domain error type for splice operations.
//!
//! Defines [`SpliceError`], the unified error for everything above the git
//! subprocess layer. Messages are designed to be actionable: each variant
//! says what went wrong and, where there is a fix, how to apply it.

use std::fmt;

use crate::git::GitError;
use crate::model::CommitId;

/// Unified error type for splice operations.
#[derive(Debug)]
pub enum SpliceError {
    /// `add` was asked to create a prefix that already exists.
    PrefixExists {
        /// The occupied prefix.
        prefix: String,
    },

    /// A command other than `add` was given a prefix that does not exist
    /// at HEAD.
    PrefixNotFound {
        /// The missing prefix.
        prefix: String,
    },

    /// A squash merge was requested for a prefix with no prior add.
    SubtreeNeverAdded {
        /// The prefix that was never added.
        prefix: String,
    },

    /// A revision argument did not resolve to a commit.
    BadRevision {
        /// The offending revision expression.
        rev: String,
    },

    /// The working tree or index has uncommitted changes.
    WorkingTreeDirty,

    /// `--branch` named an existing ref that does not contain the split.
    BranchNotAncestor {
        /// The existing branch name.
        branch: String,
        /// The synthesized split tip.
        commit: CommitId,
    },

    /// The split walk produced nothing for the requested tip.
    NoNewRevisions,

    /// Re-deriving a commit disagreed with its pinned prior mapping.
    SplitNotIdempotent {
        /// The mainline commit whose rewrite drifted.
        commit: CommitId,
        /// The mapping inherited from a prior run.
        prior: CommitId,
        /// What this run derived instead.
        recomputed: CommitId,
        /// Every commit currently tagged for re-derivation.
        redo_stack: Vec<CommitId>,
    },

    /// A `--remember BEFORE:AFTER` pair failed validation.
    RememberInvalid {
        before: String,
        after: String,
        /// Which check failed.
        reason: String,
    },

    /// A `--remember` argument was not of the form `BEFORE:AFTER`.
    RememberMalformed {
        /// The argument as given.
        arg: String,
    },

    /// Internal cache consistency failure. Indicates a bug.
    CacheConflict {
        commit: CommitId,
        existing: String,
        new: String,
    },

    /// A flag combination the CLI schema cannot express was rejected.
    InvalidFlags {
        /// Description of the conflict.
        detail: String,
    },

    /// An underlying git operation failed.
    Git(GitError),
}

impl fmt::Display for SpliceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PrefixExists { prefix } => write!(
                f,
                "prefix '{prefix}' already exists.\n  To fix: pick an unused directory, or use 'splice merge --prefix={prefix}' to update it."
            ),
            Self::PrefixNotFound { prefix } => write!(
                f,
                "'{prefix}' does not exist in HEAD.\n  To fix: add the subtree first:\n    splice add --prefix={prefix} <commit>"
            ),
            Self::SubtreeNeverAdded { prefix } => write!(
                f,
                "can't squash-merge: '{prefix}' was never added.\n  To fix: run 'splice add --prefix={prefix} --squash <commit>' first."
            ),
            Self::BadRevision { rev } => {
                write!(f, "'{rev}' does not refer to a commit")
            }
            Self::WorkingTreeDirty => write!(
                f,
                "working tree has modifications.\n  To fix: commit or stash your changes, then retry."
            ),
            Self::BranchNotAncestor { branch, commit } => {
                write!(f, "Branch '{branch}' is not an ancestor of commit '{commit}'.")
            }
            Self::NoNewRevisions => write!(f, "no new revisions were found"),
            Self::SplitNotIdempotent {
                commit,
                prior,
                recomputed,
                redo_stack,
            } => {
                write!(
                    f,
                    "split is not idempotent: {commit} was previously split as {prior}, but this run produced {recomputed}."
                )?;
                if !redo_stack.is_empty() {
                    write!(f, "\n  Commits pending re-derivation:")?;
                    for c in redo_stack {
                        write!(f, "\n    {c}")?;
                    }
                }
                write!(
                    f,
                    "\n  To fix: if the new result is intended (e.g. --annotate changed), re-run with:\n    --remember {commit}:{recomputed}"
                )
            }
            Self::RememberInvalid {
                before,
                after,
                reason,
            } => write!(
                f,
                "--remember {before}:{after} failed validation: {reason}\n  Both sides must describe the same change: equal trees, matching author/committer, and the new message must end with the old one."
            ),
            Self::RememberMalformed { arg } => write!(
                f,
                "malformed --remember value '{arg}'.\n  Expected two revisions separated by a colon: --remember BEFORE:AFTER"
            ),
            Self::CacheConflict {
                commit,
                existing,
                new,
            } => write!(
                f,
                "internal consistency error: commit {commit} already maps to {existing}, refusing to remap to {new}.\n  This is a bug in splice; please report it."
            ),
            Self::InvalidFlags { detail } => write!(f, "{detail}"),
            Self::Git(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for SpliceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Git(e) => Some(e),
            _ => None,
        }
    }
}

impl From<GitError> for SpliceError {
    fn from(e: GitError) -> Self {
        Self::Git(e)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
