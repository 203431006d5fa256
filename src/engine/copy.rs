//! The copy-or-skip decision.
//!
//! Given a mainline commit, its subdirectory tree, and the rewritten
//! parents, decide whether an existing parent can stand in for the
//! rewrite (its root tree already equals the target tree) or a fresh
//! commit must be synthesized. Skipping too eagerly loses history;
//! copying too eagerly breaks idempotence. The rules:
//!
//! - among tree-identical parents, a descendant subsumes its ancestors;
//!   two unrelated identical parents force a copy (both histories must
//!   survive via a new merge commit);
//! - a non-identical parent with commits unreachable from the identical
//!   survivor forces a copy for the same reason;
//! - otherwise a lone identical survivor is reused as-is.

use crate::error::SpliceError;
use crate::model::{CommitId, TreeId};

use super::Splitter;

impl Splitter<'_> {
    /// Rewrite `source` as either an existing tree-identical parent or a
    /// freshly synthesized commit carrying `source`'s metadata and
    /// message (with the optional annotation prefix).
    pub(super) fn copy_or_skip(
        &mut self,
        source: &CommitId,
        tree: &TreeId,
        new_parents: &[CommitId],
    ) -> Result<CommitId, SpliceError> {
        let mut parents: Vec<CommitId> = Vec::new();
        let mut identical: Vec<CommitId> = Vec::new();
        let mut nonidentical: Vec<CommitId> = Vec::new();
        for parent in new_parents {
            if parents.contains(parent) {
                continue;
            }
            parents.push(parent.clone());
            if self.repo.root_tree(parent)? == *tree {
                identical.push(parent.clone());
            } else {
                nonidentical.push(parent.clone());
            }
        }

        let mut force_copy = false;

        // Reduce identical parents to one representative by ancestry.
        let mut survivor: Option<CommitId> = None;
        for candidate in identical {
            match &survivor {
                None => survivor = Some(candidate),
                Some(current) => {
                    if self.repo.is_ancestor(current, &candidate)? {
                        survivor = Some(candidate);
                    } else if self.repo.is_ancestor(&candidate, current)? {
                        // Keep the descendant already held.
                    } else {
                        // Independent identical histories: both must be
                        // preserved, so a merge commit is required.
                        tracing::debug!(%source, "unrelated identical parents, forcing copy");
                        force_copy = true;
                    }
                }
            }
        }

        // A non-identical parent carrying history the survivor cannot
        // reach must be preserved too.
        if let Some(keep) = &survivor
            && !force_copy
        {
            for other in &nonidentical {
                if self.repo.count_between(keep, other)? > 0 {
                    tracing::debug!(%source, preserved = %other, "divergent history on non-identical parent, forcing copy");
                    force_copy = true;
                    break;
                }
            }
        }

        if let Some(keep) = survivor
            && !force_copy
        {
            tracing::debug!(%source, reused = %keep, "skip");
            return Ok(keep);
        }

        let meta = self.repo.metadata(source)?;
        let original = self.repo.message(source)?;
        let message = match &self.opts.annotate {
            Some(prefix) => format!("{prefix}{original}"),
            None => original,
        };
        let newrev = self.repo.commit_tree(tree, &parents, Some(&meta), &message)?;
        tracing::debug!(%source, %newrev, "copy");
        Ok(newrev)
    }
}
