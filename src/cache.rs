//! Run-scoped rewrite cache for the split engine.
//!
//! Three tables keyed by commit identity, owned exclusively by one run:
//!
//! - the **cache** maps every visited mainline commit to its rewritten
//!   subtree commit, or to one of two sentinels (`NoTree`: the commit
//!   predates the subtree; `Counted`: seen by the counter, not yet
//!   processed);
//! - the **attributes** table tags commits whose inherited mapping must be
//!   re-derived (`redo`);
//! - the **variables** scratchpad tracks the latest rewritten subtree
//!   commit and the latest mainline commit that contained the subtree.
//!
//! The overwrite rules are load-bearing: a `Counted` entry may be replaced
//! exactly once, a real mapping may never silently change, and a
//! disagreement on a redo-tagged commit is the "split is not idempotent"
//! condition rather than an internal bug.

use std::collections::{HashMap, HashSet};

use crate::error::SpliceError;
use crate::model::CommitId;

/// A cache table entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CacheValue {
    /// The rewritten subtree commit for this mainline commit. Identity
    /// (`cache[c] == c`) means the commit IS a subtree commit.
    Commit(CommitId),
    /// The commit is on the mainline but does not contain the subtree.
    NoTree,
    /// Visited by the counter, not yet processed.
    Counted,
}

impl CacheValue {
    fn describe(&self) -> String {
        match self {
            Self::Commit(id) => id.to_string(),
            Self::NoTree => "<notree>".to_owned(),
            Self::Counted => "<counted>".to_owned(),
        }
    }
}

/// Variables scratchpad.
#[derive(Debug, Default)]
pub struct Vars {
    /// The latest rewritten subtree commit of this run.
    pub latest_split: Option<CommitId>,
    /// The latest visited mainline commit that contained the subtree.
    pub latest_mainline: Option<CommitId>,
}

/// The run-scoped store: cache, attributes, variables.
#[derive(Debug, Default)]
pub struct RevCache {
    map: HashMap<CommitId, CacheValue>,
    redo: HashSet<CommitId>,
    reprocessed: HashSet<CommitId>,
    asserted: HashMap<CommitId, CommitId>,
    pub vars: Vars,
}

impl RevCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a commit's entry.
    #[must_use]
    pub fn get(&self, commit: &CommitId) -> Option<&CacheValue> {
        self.map.get(commit)
    }

    /// The rewritten commit for `commit`, if the entry is a real mapping.
    #[must_use]
    pub fn rewritten(&self, commit: &CommitId) -> Option<&CommitId> {
        match self.map.get(commit) {
            Some(CacheValue::Commit(id)) => Some(id),
            _ => None,
        }
    }

    /// Whether `commit` is identity-mapped (known to be a subtree commit).
    #[must_use]
    pub fn is_identity(&self, commit: &CommitId) -> bool {
        self.rewritten(commit) == Some(commit)
    }

    /// All identity-mapped commits: the known subtree commits. This is the
    /// candidate set for the ancestor test.
    #[must_use]
    pub fn identity_keys(&self) -> Vec<CommitId> {
        self.map
            .iter()
            .filter_map(|(k, v)| match v {
                CacheValue::Commit(id) if id == k => Some(k.clone()),
                _ => None,
            })
            .collect()
    }

    /// Whether the commit still needs processing: it is either freshly
    /// counted, or redo-tagged and not yet re-derived.
    #[must_use]
    pub fn needs_processing(&self, commit: &CommitId) -> bool {
        match self.map.get(commit) {
            Some(CacheValue::Counted) => true,
            Some(_) => self.redo.contains(commit) && !self.reprocessed.contains(commit),
            None => false,
        }
    }

    /// Whether the counter should descend through this commit. Uncached
    /// commits and redo-tagged commits are walkable; everything cached is
    /// a barrier.
    #[must_use]
    pub fn walkable(&self, commit: &CommitId) -> bool {
        match self.map.get(commit) {
            None => true,
            Some(_) => self.redo.contains(commit) && !self.reprocessed.contains(commit),
        }
    }

    /// Record that a redo-tagged commit has been re-derived this run.
    pub fn mark_reprocessed(&mut self, commit: CommitId) {
        self.reprocessed.insert(commit);
    }

    /// Tag a commit for re-derivation.
    pub fn mark_redo(&mut self, commit: CommitId) {
        self.redo.insert(commit);
    }

    /// Whether a commit carries the redo tag.
    #[must_use]
    pub fn has_redo(&self, commit: &CommitId) -> bool {
        self.redo.contains(commit)
    }

    /// Commits still tagged redo, for error reporting.
    #[must_use]
    pub fn redo_stack(&self) -> Vec<CommitId> {
        let mut stack: Vec<CommitId> = self.redo.iter().cloned().collect();
        stack.sort();
        stack
    }

    /// Record a validated `--remember BEFORE:AFTER` assertion. The
    /// asserted mapping wins over any later re-derivation of `before`.
    pub fn assert_pair(&mut self, before: CommitId, after: CommitId) {
        self.map
            .insert(before.clone(), CacheValue::Commit(after.clone()));
        self.map
            .insert(after.clone(), CacheValue::Commit(after.clone()));
        self.asserted.insert(before.clone(), after);
        self.redo.insert(before);
    }

    /// Insert a mapping only when the commit has no entry yet. Used by the
    /// de-normalization pass, where already-pinned entries must stand.
    pub fn set_if_absent(&mut self, commit: CommitId, value: CacheValue) {
        self.map.entry(commit).or_insert(value);
    }

    /// Set a commit's cache entry, enforcing the overwrite invariants.
    ///
    /// Returns the entry's effective value after the call, which differs
    /// from `value` when a user assertion is kept in place of a
    /// re-derivation.
    ///
    /// # Errors
    /// [`SpliceError::SplitNotIdempotent`] when a redo-tagged commit's
    /// re-derivation disagrees with its pinned mapping and neither a user
    /// assertion nor structural identity resolves the conflict;
    /// [`SpliceError::CacheConflict`] on any other real-value change.
    pub fn set(&mut self, commit: CommitId, value: CacheValue) -> Result<CacheValue, SpliceError> {
        match self.map.get(&commit) {
            None | Some(CacheValue::Counted) => {
                self.map.insert(commit, value.clone());
                Ok(value)
            }
            Some(existing) if *existing == value => {
                // Re-derivation agreed with the inherited mapping.
                self.redo.remove(&commit);
                Ok(value)
            }
            Some(existing) => {
                let existing = existing.clone();
                if let Some(asserted) = self.asserted.get(&commit) {
                    if CacheValue::Commit(asserted.clone()) == existing {
                        tracing::debug!(
                            %commit,
                            kept = %asserted,
                            derived = %value.describe(),
                            "keeping user-asserted mapping"
                        );
                        self.redo.remove(&commit);
                        return Ok(existing);
                    }
                }
                if self.redo.contains(&commit) {
                    if let CacheValue::Commit(new) = &value {
                        if self.is_identity(new) {
                            tracing::debug!(
                                %commit,
                                prior = %existing.describe(),
                                %new,
                                "re-derivation reached a subtree commit, replacing stale mapping"
                            );
                            self.map.insert(commit, value.clone());
                            return Ok(value);
                        }
                        if let CacheValue::Commit(prior) = existing {
                            return Err(SpliceError::SplitNotIdempotent {
                                commit,
                                prior,
                                recomputed: new.clone(),
                                redo_stack: self.redo_stack(),
                            });
                        }
                    }
                }
                Err(SpliceError::CacheConflict {
                    commit,
                    existing: existing.describe(),
                    new: value.describe(),
                })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn cid(byte: char) -> CommitId {
        CommitId::new(&byte.to_string().repeat(40)).unwrap()
    }

    #[test]
    fn counted_is_overwritable_once() {
        let mut cache = RevCache::new();
        cache.set(cid('a'), CacheValue::Counted).unwrap();
        cache
            .set(cid('a'), CacheValue::Commit(cid('b')))
            .unwrap();
        assert_eq!(cache.rewritten(&cid('a')), Some(&cid('b')));
    }

    #[test]
    fn same_value_is_idempotent() {
        let mut cache = RevCache::new();
        cache.set(cid('a'), CacheValue::NoTree).unwrap();
        cache.set(cid('a'), CacheValue::NoTree).unwrap();
        assert_eq!(cache.get(&cid('a')), Some(&CacheValue::NoTree));
    }

    #[test]
    fn real_value_change_is_fatal() {
        let mut cache = RevCache::new();
        cache.set(cid('a'), CacheValue::Commit(cid('b'))).unwrap();
        let err = cache
            .set(cid('a'), CacheValue::Commit(cid('c')))
            .unwrap_err();
        assert!(matches!(err, SpliceError::CacheConflict { .. }));
    }

    #[test]
    fn redo_disagreement_is_not_idempotent() {
        let mut cache = RevCache::new();
        cache.set(cid('a'), CacheValue::Commit(cid('b'))).unwrap();
        cache.mark_redo(cid('a'));
        let err = cache
            .set(cid('a'), CacheValue::Commit(cid('c')))
            .unwrap_err();
        match err {
            SpliceError::SplitNotIdempotent {
                commit,
                prior,
                recomputed,
                ..
            } => {
                assert_eq!(commit, cid('a'));
                assert_eq!(prior, cid('b'));
                assert_eq!(recomputed, cid('c'));
            }
            other => panic!("expected SplitNotIdempotent, got {other:?}"),
        }
    }

    #[test]
    fn redo_agreement_clears_tag() {
        let mut cache = RevCache::new();
        cache.set(cid('a'), CacheValue::Commit(cid('b'))).unwrap();
        cache.mark_redo(cid('a'));
        cache.set(cid('a'), CacheValue::Commit(cid('b'))).unwrap();
        assert!(!cache.has_redo(&cid('a')));
    }

    #[test]
    fn redo_accepts_identity_mapped_rederivation() {
        let mut cache = RevCache::new();
        cache.set(cid('a'), CacheValue::Commit(cid('b'))).unwrap();
        cache.mark_redo(cid('a'));
        // c is a known subtree commit.
        cache.set(cid('c'), CacheValue::Commit(cid('c'))).unwrap();
        let effective = cache
            .set(cid('a'), CacheValue::Commit(cid('c')))
            .unwrap();
        assert_eq!(effective, CacheValue::Commit(cid('c')));
    }

    #[test]
    fn asserted_mapping_wins_over_rederivation() {
        let mut cache = RevCache::new();
        cache.assert_pair(cid('a'), cid('b'));
        let effective = cache
            .set(cid('a'), CacheValue::Commit(cid('c')))
            .unwrap();
        assert_eq!(effective, CacheValue::Commit(cid('b')));
        assert!(!cache.has_redo(&cid('a')));
    }

    #[test]
    fn assert_pair_identity_maps_after() {
        let mut cache = RevCache::new();
        cache.assert_pair(cid('a'), cid('b'));
        assert!(cache.is_identity(&cid('b')));
        assert!(!cache.is_identity(&cid('a')));
    }

    #[test]
    fn identity_keys_excludes_sentinels_and_rewrites() {
        let mut cache = RevCache::new();
        cache.set(cid('a'), CacheValue::Commit(cid('a'))).unwrap();
        cache.set(cid('b'), CacheValue::Commit(cid('a'))).unwrap();
        cache.set(cid('c'), CacheValue::NoTree).unwrap();
        cache.set(cid('d'), CacheValue::Counted).unwrap();
        assert_eq!(cache.identity_keys(), vec![cid('a')]);
    }

    #[test]
    fn walkable_respects_redo() {
        let mut cache = RevCache::new();
        assert!(cache.walkable(&cid('a')));
        cache.set(cid('a'), CacheValue::Commit(cid('b'))).unwrap();
        assert!(!cache.walkable(&cid('a')));
        cache.mark_redo(cid('a'));
        assert!(cache.walkable(&cid('a')));
        cache.mark_reprocessed(cid('a'));
        assert!(!cache.walkable(&cid('a')));
    }

    #[test]
    fn set_if_absent_never_overwrites() {
        let mut cache = RevCache::new();
        cache.set(cid('a'), CacheValue::NoTree).unwrap();
        cache.set_if_absent(cid('a'), CacheValue::Commit(cid('b')));
        assert_eq!(cache.get(&cid('a')), Some(&CacheValue::NoTree));
        cache.set_if_absent(cid('b'), CacheValue::Commit(cid('b')));
        assert!(cache.is_identity(&cid('b')));
    }
}
