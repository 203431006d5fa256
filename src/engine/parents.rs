//! Parent selection for the DAG walk.
//!
//! For most commits the walk follows every parent. Two-parent merges get
//! structural treatment: a merge of one subdirectory-bearing parent with
//! one subtree-like parent is a subtree merge, and depending on the trees
//! involved it is either a rejoin (walk stops, the merge collapses to the
//! subtree parent) or a merge of some other subtree (the foreign parent
//! is dropped from the walk).

use crate::cache::CacheValue;
use crate::error::SpliceError;
use crate::model::CommitId;

use super::{Classification, Splitter};

impl Splitter<'_> {
    /// The parents the traversal should recurse into, memoized so the
    /// counter and the processor see one consistent decision (and the
    /// rejoin side effect fires once).
    pub(super) fn select_parents(
        &mut self,
        commit: &CommitId,
    ) -> Result<Vec<CommitId>, SpliceError> {
        if let Some(cached) = self.selected.get(commit) {
            return Ok(cached.clone());
        }
        let parents = self.repo.parents(commit)?;
        let result = self.select_fresh(commit, parents)?;
        self.selected.insert(commit.clone(), result.clone());
        Ok(result)
    }

    fn select_fresh(
        &mut self,
        commit: &CommitId,
        parents: Vec<CommitId>,
    ) -> Result<Vec<CommitId>, SpliceError> {
        if parents.len() != 2 {
            return Ok(parents);
        }

        // Bipartition: exactly one parent carries the subdirectory.
        let tree0 = self.repo.subtree_of(&parents[0], &self.dir)?;
        let tree1 = self.repo.subtree_of(&parents[1], &self.dir)?;
        let (mainline, mainline_tree, subtree) = match (tree0, tree1) {
            (Some(t), None) => (parents[0].clone(), t, parents[1].clone()),
            (None, Some(t)) => (parents[1].clone(), t, parents[0].clone()),
            _ => return Ok(parents),
        };

        let Some(merge_tree) = self.repo.subtree_of(commit, &self.dir)? else {
            return Ok(parents);
        };
        let subtree_root = self.repo.root_tree(&subtree)?;

        if !self.opts.ignore_joins && merge_tree == mainline_tree && merge_tree == subtree_root {
            // Rejoin shape: the merge changed nothing on either side.
            // Collapse the merge onto the subtree parent and stop the
            // walk through this node. Suppressed under --ignore-joins,
            // which re-derives the mainline side of prior joins.
            match self.classify(&subtree)? {
                Classification::Split => {
                    tracing::debug!(%commit, split = %subtree, "rejoin, stopping walk");
                    self.note_subtree_tip(subtree.clone())?;
                    self.collapse_to(commit, subtree)?;
                    return Ok(Vec::new());
                }
                Classification::Squash(split) => {
                    tracing::debug!(%commit, squash = %subtree, %split, "squash rejoin, stopping walk");
                    self.note_subtree_tip(split.clone())?;
                    self.collapse_to(commit, split)?;
                    return Ok(Vec::new());
                }
                _ => {}
            }
        }

        if merge_tree == mainline_tree && merge_tree != subtree_root {
            // The merge brought in history that did not touch our
            // subtree. If the merge's own root tree moved, or the
            // foreign parent is not part of any known subtree history,
            // this is a merge for some other subtree: follow only the
            // mainline side.
            let root_moved =
                self.repo.root_tree(commit)? != self.repo.root_tree(&mainline)?;
            let foreign = root_moved
                || !matches!(
                    self.classify(&subtree)?,
                    Classification::Split | Classification::Squash(_)
                );
            if foreign {
                tracing::debug!(%commit, dropped = %subtree, "cross-subtree merge, following mainline only");
                return Ok(vec![mainline]);
            }
        }

        Ok(parents)
    }

    /// Record a rejoin collapse: the merge rewrites to `target`, and the
    /// run variables advance as if the merge had been processed.
    fn collapse_to(&mut self, commit: &CommitId, target: CommitId) -> Result<(), SpliceError> {
        let effective = self
            .cache
            .set(commit.clone(), CacheValue::Commit(target))?;
        if let CacheValue::Commit(id) = effective {
            self.cache.vars.latest_split = Some(id);
        }
        self.cache.vars.latest_mainline = Some(commit.clone());
        Ok(())
    }
}
