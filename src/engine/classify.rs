//! Per-commit classification.
//!
//! Every commit the walk visits is exactly one of:
//!
//! - `MainlineTree`: on the mainline, contains the subdirectory;
//! - `MainlineNoTree`: on the mainline, predates the subdirectory;
//! - `Split`: already a subtree commit (descends from known subtree
//!   history);
//! - `Squash`: a synthesized squash commit standing in for a range of
//!   subtree history, collapsed to its recorded tip.

use crate::annotation::Annotation;
use crate::error::SpliceError;
use crate::model::{CommitId, TreeId};

use super::Splitter;

/// What a commit is, from the split engine's point of view.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Classification {
    /// Mainline commit containing the subdirectory tree.
    MainlineTree(TreeId),
    /// Mainline commit without the subdirectory.
    MainlineNoTree,
    /// The commit is itself a subtree commit.
    Split,
    /// Squash commit; the payload is its recorded subtree tip.
    Squash(CommitId),
}

impl Splitter<'_> {
    /// Classify a commit per the rules above.
    ///
    /// Squash trailers are honored unconditionally; add/rejoin markers
    /// only shape pre-load, so a marker commit here falls through to
    /// plain tree inspection (its tree contains the subdirectory).
    pub(super) fn classify(&mut self, commit: &CommitId) -> Result<Classification, SpliceError> {
        let ann = Annotation::parse(&self.repo.message(commit)?);
        if ann.names_dir(&self.dir)
            && let Some(split_raw) = ann.split.as_deref()
        {
            match self.repo.resolve(split_raw)? {
                Some(split) if ann.mainline.is_none() => {
                    return Ok(Classification::Squash(split));
                }
                Some(_) => {
                    // Add/rejoin marker: a regular mainline commit as far
                    // as classification goes.
                }
                None => {
                    tracing::debug!(%commit, split = split_raw, "malformed trailer ignored");
                }
            }
        }

        if let Some(tree) = self.repo.subtree_of(commit, &self.dir)? {
            return Ok(Classification::MainlineTree(tree));
        }

        if self.has_subtree_ancestor(commit)? {
            Ok(Classification::Split)
        } else {
            Ok(Classification::MainlineNoTree)
        }
    }

    /// Does `commit` have an ancestor known to be a subtree commit?
    ///
    /// The candidate set (identity-mapped cache keys) can be large, so it
    /// is first reduced to independent tips in bounded batches, then each
    /// survivor is tested for shared ancestry, short-circuiting on the
    /// first hit. Sharing any ancestor with a subtree commit is enough:
    /// subtree history is ancestor-closed, so the shared commit is itself
    /// a subtree commit.
    fn has_subtree_ancestor(&mut self, commit: &CommitId) -> Result<bool, SpliceError> {
        // Fast path: a parent already identity-mapped settles it.
        for parent in self.repo.parents(commit)? {
            if self.cache.is_identity(&parent) {
                return Ok(true);
            }
        }

        let candidates = self.cache.identity_keys();
        if candidates.is_empty() {
            return Ok(false);
        }
        let reduced = self.reduce_to_independent(candidates)?;
        for candidate in &reduced {
            if self.repo.related(candidate, commit)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Iterate batched `merge-base --independent` passes to a fixpoint.
    ///
    /// Batching keeps each invocation under the host's argument-list
    /// limit; iterating catches cross-batch redundancy. Convergence is
    /// guaranteed because the set can only shrink.
    fn reduce_to_independent(
        &self,
        mut candidates: Vec<CommitId>,
    ) -> Result<Vec<CommitId>, SpliceError> {
        const BATCH: usize = 64;
        loop {
            let before = candidates.len();
            if before <= 1 {
                return Ok(candidates);
            }
            let mut next = Vec::with_capacity(before);
            for chunk in candidates.chunks(BATCH) {
                next.extend(self.repo.independent_tips(chunk)?);
            }
            if next.len() >= before {
                return Ok(next);
            }
            candidates = next;
        }
    }
}
