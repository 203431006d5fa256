//! The split engine.
//!
//! Walks the mainline commit DAG from a tip, classifies every commit, and
//! synthesizes a new DAG whose trees are the original subdirectory trees,
//! preserving author/committer metadata and parent structure. Splits are
//! idempotent: re-running with identical flags reproduces identical commit
//! ids, and prior splits recorded as annotation trailers stop the walk.
//!
//! The engine runs a fixed sequence of passes:
//!
//! 1. **remember**: validate and pin user-asserted `BEFORE:AFTER` pairs;
//! 2. **pins**: pin `--onto` (identity) and `--notree` commits;
//! 3. **pre-load**: scan history for prior add/rejoin/squash markers;
//! 4. **de-normalize**: identity-map every ancestor of each known
//!    subtree tip in one batch, so the walk stops at prior splits;
//! 5. **count**: size the work and mark reachable commits `counted`;
//! 6. **process**: post-order rewrite with copy-or-skip;
//! 7. **finalize**: the caller reads the tip's mapping and updates refs.
//!
//! Both traversals use explicit work stacks: real histories are deep
//! enough to overflow the call stack.

mod classify;
mod copy;
mod parents;

pub use classify::Classification;

use std::collections::{HashMap, HashSet};

use crate::annotation::Annotation;
use crate::cache::{CacheValue, RevCache};
use crate::error::SpliceError;
use crate::git::GitRepo;
use crate::model::CommitId;

/// Options controlling a split run.
#[derive(Clone, Debug, Default)]
pub struct SplitOptions {
    /// Prefix prepended to every synthesized commit message.
    pub annotate: Option<String>,
    /// Ignore prior rejoin markers; only honor literal add subjects.
    pub ignore_joins: bool,
    /// Commits to pin as already-split subtree history.
    pub onto: Vec<String>,
    /// Commits to pin as predating the subtree.
    pub notree: Vec<String>,
    /// `BEFORE:AFTER` idempotence assertions.
    pub remember: Vec<String>,
    /// Suppress progress output.
    pub quiet: bool,
}

/// One run of the split engine over a single subtree prefix.
pub struct Splitter<'a> {
    repo: &'a GitRepo,
    dir: String,
    opts: SplitOptions,
    cache: RevCache,
    /// Subtree tips whose ancestor closure is deferred until the walk
    /// starts.
    pending_tips: Vec<CommitId>,
    /// Tips whose ancestor closure has been applied; used to bound later
    /// closure rev-lists.
    closed_tips: Vec<CommitId>,
    started: bool,
    /// Memoized parent-selector output.
    selected: HashMap<CommitId, Vec<CommitId>>,
    total: u64,
    processed: u64,
}

enum Frame {
    Expand(CommitId),
    Emit(CommitId),
}

impl<'a> Splitter<'a> {
    #[must_use]
    pub fn new(repo: &'a GitRepo, dir: String, opts: SplitOptions) -> Self {
        Self {
            repo,
            dir,
            opts,
            cache: RevCache::new(),
            pending_tips: Vec::new(),
            closed_tips: Vec::new(),
            started: false,
            selected: HashMap::new(),
            total: 0,
            processed: 0,
        }
    }

    /// The latest rewritten subtree commit of this run.
    #[must_use]
    pub fn latest_split(&self) -> Option<&CommitId> {
        self.cache.vars.latest_split.as_ref()
    }

    /// The latest visited mainline commit that contained the subtree.
    #[must_use]
    pub fn latest_mainline(&self) -> Option<&CommitId> {
        self.cache.vars.latest_mainline.as_ref()
    }

    /// Run the full pass sequence and return the rewritten tip.
    ///
    /// # Errors
    /// [`SpliceError::NoNewRevisions`] when the tip does not map to a
    /// subtree commit, plus any consistency or repository error.
    pub fn run(&mut self, tip: &CommitId) -> Result<CommitId, SpliceError> {
        self.apply_remember()?;
        self.apply_pins()?;
        self.preload(tip)?;
        self.denormalize()?;
        self.started = true;
        self.count(tip)?;
        self.process(tip)?;
        match self.cache.get(tip) {
            Some(CacheValue::Commit(id)) => Ok(id.clone()),
            _ => Err(SpliceError::NoNewRevisions),
        }
    }

    // -- pass 1: --remember -------------------------------------------------

    fn apply_remember(&mut self) -> Result<(), SpliceError> {
        let pairs = std::mem::take(&mut self.opts.remember);
        for arg in &pairs {
            let Some((before_raw, after_raw)) = arg.split_once(':') else {
                return Err(SpliceError::RememberMalformed { arg: arg.clone() });
            };
            let before = self.resolve_arg(before_raw)?;
            let after = self.resolve_arg(after_raw)?;
            self.validate_remember(&before, &after, before_raw, after_raw)?;
            tracing::debug!(%before, %after, "pinning remembered split mapping");
            self.cache.assert_pair(before.clone(), after.clone());
            self.pending_tips.push(after);
        }
        Ok(())
    }

    fn validate_remember(
        &self,
        before: &CommitId,
        after: &CommitId,
        before_raw: &str,
        after_raw: &str,
    ) -> Result<(), SpliceError> {
        let invalid = |reason: &str| SpliceError::RememberInvalid {
            before: before_raw.to_owned(),
            after: after_raw.to_owned(),
            reason: reason.to_owned(),
        };
        let Some(before_tree) = self.repo.subtree_of(before, &self.dir)? else {
            return Err(invalid(&format!(
                "'{before_raw}' does not contain '{}'",
                self.dir
            )));
        };
        if before_tree != self.repo.root_tree(after)? {
            return Err(invalid("subdirectory tree does not match the split tree"));
        }
        let before_msg = self.repo.message(before)?;
        let after_msg = self.repo.message(after)?;
        if !after_msg.trim_end().ends_with(before_msg.trim_end()) {
            return Err(invalid("split message does not end with the original message"));
        }
        if self.repo.metadata(before)? != self.repo.metadata(after)? {
            return Err(invalid("author/committer metadata differs"));
        }
        Ok(())
    }

    fn resolve_arg(&self, rev: &str) -> Result<CommitId, SpliceError> {
        match self.repo.resolve(rev)? {
            Some(id) => Ok(id),
            None => Err(SpliceError::BadRevision { rev: rev.to_owned() }),
        }
    }

    // -- pass 2: --onto / --notree pins -------------------------------------

    fn apply_pins(&mut self) -> Result<(), SpliceError> {
        let onto = std::mem::take(&mut self.opts.onto);
        for rev in &onto {
            let id = self.resolve_arg(rev)?;
            tracing::debug!(commit = %id, "pinning --onto as subtree history");
            self.note_subtree_tip(id)?;
        }
        let notree = std::mem::take(&mut self.opts.notree);
        for rev in &notree {
            let id = self.resolve_arg(rev)?;
            tracing::debug!(commit = %id, "pinning --notree");
            self.cache.set(id, CacheValue::NoTree)?;
        }
        Ok(())
    }

    // -- pass 3: pre-load markers -------------------------------------------

    fn preload(&mut self, tip: &CommitId) -> Result<(), SpliceError> {
        let grep = if self.opts.ignore_joins {
            format!("^Add '{}/' from commit '", self.dir)
        } else {
            format!("^git-subtree-dir: {}/*$", self.dir)
        };
        let records = self.repo.log_grep(tip, &grep)?;
        tracing::debug!(count = records.len(), "scanning prior split markers");

        for record in records {
            let ann = Annotation::parse(&record.message);
            if !ann.names_dir(&self.dir) {
                continue;
            }
            let Some(split_raw) = ann.split.as_deref() else {
                continue;
            };
            let Some(split) = self.repo.resolve(split_raw)? else {
                tracing::debug!(commit = %record.commit, split = split_raw, "malformed marker: split does not resolve");
                continue;
            };

            match ann.mainline.as_deref() {
                None => {
                    // Squash commit: collapse to its recorded subtree tip.
                    tracing::debug!(squash = %record.commit, %split, "prior squash");
                    self.note_subtree_tip(split.clone())?;
                    self.preload_map(record.commit, CacheValue::Commit(split));
                }
                Some(mainline_raw) => {
                    let Some(mainline) = self.repo.resolve(mainline_raw)? else {
                        tracing::debug!(commit = %record.commit, mainline = mainline_raw, "malformed marker: mainline does not resolve");
                        continue;
                    };
                    self.note_subtree_tip(split.clone())?;
                    match self.repo.subtree_of(&mainline, &self.dir)? {
                        None => {
                            // Add: the subtree did not exist on the
                            // mainline side yet.
                            tracing::debug!(%mainline, %split, "prior add");
                            self.preload_map(mainline, CacheValue::NoTree);
                        }
                        Some(tree) if tree == self.repo.root_tree(&split)? => {
                            tracing::debug!(%mainline, %split, "prior rejoin");
                            self.preload_map(mainline, CacheValue::Commit(split));
                        }
                        Some(_) => {
                            // A marker for some other subtree state;
                            // informational only.
                            tracing::debug!(%mainline, %split, "cross-subtree marker, ignored");
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Record a marker-derived mapping, tolerating disagreement between
    /// markers: the first (newest) marker wins and the commit is tagged
    /// for re-derivation.
    fn preload_map(&mut self, commit: CommitId, value: CacheValue) {
        match self.cache.get(&commit) {
            None => self.cache.set_if_absent(commit, value),
            Some(existing) if *existing == value => {}
            Some(existing) => {
                tracing::debug!(
                    %commit,
                    kept = ?existing,
                    dropped = ?value,
                    "conflicting prior markers, tagging for re-derivation"
                );
                self.cache.mark_redo(commit);
            }
        }
    }

    // -- pass 4: de-normalize -----------------------------------------------

    /// Apply the deferred ancestor closure: every ancestor of a subtree
    /// commit is itself a subtree commit.
    fn denormalize(&mut self) -> Result<(), SpliceError> {
        let tips = std::mem::take(&mut self.pending_tips);
        if tips.is_empty() {
            return Ok(());
        }
        let ancestors = self.repo.rev_list(&tips, &[])?;
        tracing::debug!(
            tips = tips.len(),
            ancestors = ancestors.len(),
            "identity-mapping prior subtree history"
        );
        for commit in ancestors {
            self.cache
                .set_if_absent(commit.clone(), CacheValue::Commit(commit));
        }
        self.closed_tips.extend(tips);
        Ok(())
    }

    /// Record that `id` is a subtree commit: identity-map it and close
    /// over its ancestors (immediately once the walk has started,
    /// deferred before that).
    pub(crate) fn note_subtree_tip(&mut self, id: CommitId) -> Result<(), SpliceError> {
        if self.cache.is_identity(&id) {
            return Ok(());
        }
        self.cache
            .set(id.clone(), CacheValue::Commit(id.clone()))?;
        if self.started {
            let ancestors = self.repo.rev_list(
                std::slice::from_ref(&id),
                &self.closed_tips,
            )?;
            for commit in ancestors {
                self.cache
                    .set_if_absent(commit.clone(), CacheValue::Commit(commit));
            }
            self.closed_tips.push(id);
        } else {
            self.pending_tips.push(id);
        }
        Ok(())
    }

    // -- pass 5: count ------------------------------------------------------

    fn count(&mut self, tip: &CommitId) -> Result<(), SpliceError> {
        let mut stack = vec![tip.clone()];
        let mut visited: HashSet<CommitId> = HashSet::new();
        while let Some(commit) = stack.pop() {
            if !visited.insert(commit.clone()) {
                continue;
            }
            if !self.cache.walkable(&commit) {
                continue;
            }
            if self.cache.get(&commit).is_none() {
                self.cache.set(commit.clone(), CacheValue::Counted)?;
            }
            self.total += 1;
            for parent in self.select_parents(&commit)? {
                stack.push(parent);
            }
        }
        tracing::debug!(total = self.total, "counted commits to process");
        Ok(())
    }

    // -- pass 6: process ----------------------------------------------------

    fn process(&mut self, tip: &CommitId) -> Result<(), SpliceError> {
        let mut stack = vec![Frame::Expand(tip.clone())];
        let mut expanded: HashSet<CommitId> = HashSet::new();
        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Expand(commit) => {
                    if !self.cache.needs_processing(&commit) {
                        continue;
                    }
                    if !expanded.insert(commit.clone()) {
                        continue;
                    }
                    stack.push(Frame::Emit(commit.clone()));
                    for parent in self.select_parents(&commit)? {
                        stack.push(Frame::Expand(parent));
                    }
                }
                Frame::Emit(commit) => {
                    // The parent selector may have resolved this commit
                    // (rejoin short-circuit) while expanding a sibling.
                    if !self.cache.needs_processing(&commit) {
                        continue;
                    }
                    self.process_one(&commit)?;
                    self.processed += 1;
                    if !self.opts.quiet {
                        eprint!("\r{}/{} commits", self.processed, self.total);
                    }
                }
            }
        }
        if !self.opts.quiet && self.processed > 0 {
            eprintln!();
        }
        Ok(())
    }

    fn process_one(&mut self, commit: &CommitId) -> Result<(), SpliceError> {
        let had_redo = self.cache.has_redo(commit);
        let class = self.classify(commit)?;
        tracing::debug!(%commit, ?class, "processing");
        match class {
            Classification::MainlineTree(tree) => {
                let parents = self.select_parents(commit)?;
                let mut new_parents = Vec::new();
                for parent in &parents {
                    if let Some(rewritten) = self.cache.rewritten(parent) {
                        new_parents.push(rewritten.clone());
                    }
                }
                let newrev = self.copy_or_skip(commit, &tree, &new_parents)?;
                let effective = self
                    .cache
                    .set(commit.clone(), CacheValue::Commit(newrev))?;
                if let CacheValue::Commit(id) = effective {
                    self.cache.vars.latest_split = Some(id);
                }
                self.cache.vars.latest_mainline = Some(commit.clone());
            }
            Classification::MainlineNoTree => {
                self.cache.set(commit.clone(), CacheValue::NoTree)?;
                self.cache.vars.latest_mainline = Some(commit.clone());
            }
            Classification::Split => {
                self.note_subtree_tip(commit.clone())?;
                self.cache.vars.latest_split = Some(commit.clone());
            }
            Classification::Squash(split) => {
                self.note_subtree_tip(split.clone())?;
                let effective = self
                    .cache
                    .set(commit.clone(), CacheValue::Commit(split))?;
                if let CacheValue::Commit(id) = effective {
                    self.cache.vars.latest_split = Some(id);
                }
            }
        }
        if had_redo {
            self.cache.mark_reprocessed(commit.clone());
        }
        Ok(())
    }
}
