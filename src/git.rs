//! Git repository service.
//!
//! Every object-graph query and commit-creation primitive splice needs,
//! implemented as `git` subprocess invocations run from the repository
//! root. Callers never shell out themselves; this module is the only
//! place that spawns git.

use std::io::Write as _;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

use thiserror::Error;

use crate::model::{CommitId, CommitMeta, EntryKind, IdError, TreeId};

// ---------------------------------------------------------------------------
// GitError
// ---------------------------------------------------------------------------

/// Errors returned by [`GitRepo`] operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// The `git` binary could not be spawned at all.
    #[error("git is not installed or not on PATH: {0}")]
    NotDiscoverable(std::io::Error),

    /// The current directory is not inside a git working tree.
    #[error("not a git working tree: {stderr}")]
    NotARepository {
        /// Stderr from `git rev-parse --show-toplevel`, trimmed.
        stderr: String,
    },

    /// A git command exited non-zero.
    #[error("`{command}` failed{}{}", fmt_exit_code(.exit_code), fmt_stderr(.stderr))]
    Command {
        /// The command that was run (e.g. `"git commit-tree ..."`).
        command: String,
        /// Stderr output from git, trimmed.
        stderr: String,
        /// Process exit code, if available.
        exit_code: Option<i32>,
    },

    /// Git returned an object id that failed validation.
    #[error(transparent)]
    InvalidId(#[from] IdError),

    /// Git produced output in a shape we could not parse.
    #[error("unexpected output from `{command}`: {detail}")]
    Parse {
        /// The command that was run.
        command: String,
        /// What was wrong with the output.
        detail: String,
    },

    /// An I/O error occurred talking to the subprocess.
    #[error("I/O error running git: {0}")]
    Io(#[from] std::io::Error),
}

/// A commit message record returned by the marker scan.
#[derive(Clone, Debug)]
pub struct LogRecord {
    /// The commit the message belongs to.
    pub commit: CommitId,
    /// The full commit message body.
    pub message: String,
}

// ---------------------------------------------------------------------------
// GitRepo
// ---------------------------------------------------------------------------

/// A handle on a git repository, addressed by its working-tree root.
///
/// All operations run `git` in `root`, so relative paths (the subtree
/// prefix above all) resolve against the repository top level.
pub struct GitRepo {
    root: PathBuf,
}

impl GitRepo {
    /// Discover the enclosing repository from the current directory.
    ///
    /// # Errors
    /// [`GitError::NotDiscoverable`] if git cannot be spawned (exit code
    /// 126 territory), [`GitError::NotARepository`] if the current
    /// directory is not inside a working tree.
    pub fn discover() -> Result<Self, GitError> {
        let output = Command::new("git")
            .args(["rev-parse", "--show-toplevel"])
            .output()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    GitError::NotDiscoverable(e)
                } else {
                    GitError::Io(e)
                }
            })?;

        if !output.status.success() {
            return Err(GitError::NotARepository {
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }

        let root = String::from_utf8_lossy(&output.stdout).trim().to_owned();
        Ok(Self {
            root: PathBuf::from(root),
        })
    }

    /// Open a repository at a known root without discovery. Test hook.
    #[must_use]
    pub fn at(root: PathBuf) -> Self {
        Self { root }
    }

    /// The working-tree root this handle operates in.
    #[must_use]
    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    // -- subprocess plumbing ------------------------------------------------

    fn run(&self, args: &[&str]) -> Result<Output, GitError> {
        self.run_with(args, &[], None)
    }

    fn run_with(
        &self,
        args: &[&str],
        envs: &[(&str, &str)],
        stdin: Option<&str>,
    ) -> Result<Output, GitError> {
        tracing::trace!(cmd = %args.join(" "), "git");
        let mut cmd = Command::new("git");
        cmd.args(args).current_dir(&self.root);
        for (k, v) in envs {
            cmd.env(k, v);
        }
        if let Some(text) = stdin {
            cmd.stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped());
            let mut child = cmd.spawn().map_err(spawn_error)?;
            child
                .stdin
                .take()
                .expect("stdin was piped")
                .write_all(text.as_bytes())?;
            Ok(child.wait_with_output()?)
        } else {
            cmd.output().map_err(spawn_error)
        }
    }

    /// Run a git command and return its stdout, failing on non-zero exit.
    fn stdout(&self, args: &[&str]) -> Result<String, GitError> {
        let output = self.run(args)?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(command_error(args, &output))
        }
    }

    /// Run a git command whose exit code encodes a boolean (0 = true,
    /// 1 = false, anything else = error).
    fn status_bool(&self, args: &[&str]) -> Result<bool, GitError> {
        let output = self.run(args)?;
        match output.status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => Err(command_error(args, &output)),
        }
    }

    fn parse_commit(&self, args: &[&str], raw: &str) -> Result<CommitId, GitError> {
        let trimmed = raw.trim();
        CommitId::new(trimmed).map_err(|e| {
            tracing::debug!(output = %trimmed, "unparseable commit id");
            GitError::Parse {
                command: format!("git {}", args.join(" ")),
                detail: e.to_string(),
            }
        })
    }

    // -- read-only DAG queries ----------------------------------------------

    /// Parents of a commit, in declaration order.
    pub fn parents(&self, commit: &CommitId) -> Result<Vec<CommitId>, GitError> {
        let args = ["rev-list", "--parents", "-n", "1", commit.as_str()];
        let out = self.stdout(&args)?;
        let mut ids = out.split_whitespace();
        let first = ids.next().ok_or_else(|| GitError::Parse {
            command: format!("git {}", args.join(" ")),
            detail: "empty output".to_owned(),
        })?;
        if first != commit.as_str() {
            return Err(GitError::Parse {
                command: format!("git {}", args.join(" ")),
                detail: format!("expected {commit} first, got {first}"),
            });
        }
        ids.map(|s| CommitId::new(s).map_err(GitError::from))
            .collect()
    }

    /// Root tree id of a commit.
    pub fn root_tree(&self, commit: &CommitId) -> Result<TreeId, GitError> {
        let spec = format!("{commit}^{{tree}}");
        let out = self.stdout(&["rev-parse", &spec])?;
        Ok(TreeId::new(out.trim())?)
    }

    /// The tree entry at `path` in a commit's tree, if any.
    ///
    /// Only directory trees are useful to splice; submodule gitlinks and
    /// blobs are reported so the caller can decide (the classifier treats
    /// them as absent).
    pub fn entry(
        &self,
        commit: &CommitId,
        path: &str,
    ) -> Result<Option<(EntryKind, TreeId)>, GitError> {
        let args = ["ls-tree", commit.as_str(), "--", path];
        let out = self.stdout(&args)?;
        for line in out.lines() {
            // "<mode> <type> <oid>\t<path>"
            let Some((meta, name)) = line.split_once('\t') else {
                continue;
            };
            if name != path {
                continue;
            }
            let mut fields = meta.split_whitespace();
            let _mode = fields.next();
            let kind = fields.next();
            let oid = fields.next().ok_or_else(|| GitError::Parse {
                command: format!("git {}", args.join(" ")),
                detail: format!("malformed entry line {line:?}"),
            })?;
            let kind = match kind {
                Some("tree") => EntryKind::Tree,
                Some("commit") => EntryKind::Submodule,
                _ => EntryKind::Other,
            };
            return Ok(Some((kind, TreeId::new(oid)?)));
        }
        Ok(None)
    }

    /// The subdirectory tree of a commit at `path`, or `None` when the
    /// path is absent or not a directory.
    pub fn subtree_of(&self, commit: &CommitId, path: &str) -> Result<Option<TreeId>, GitError> {
        match self.entry(commit, path)? {
            Some((EntryKind::Tree, tree)) => Ok(Some(tree)),
            Some((kind, _)) => {
                tracing::debug!(%commit, path, ?kind, "prefix entry is not a tree, treating as absent");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// Resolve a revision expression to a commit id, or `None` when it
    /// does not name a commit.
    pub fn resolve(&self, rev: &str) -> Result<Option<CommitId>, GitError> {
        let spec = format!("{rev}^{{commit}}");
        let output = self.run(&["rev-parse", "--verify", "--quiet", &spec])?;
        if !output.status.success() {
            return Ok(None);
        }
        let raw = String::from_utf8_lossy(&output.stdout);
        Ok(Some(self.parse_commit(&["rev-parse", &spec], &raw)?))
    }

    /// The commit HEAD points at.
    pub fn head(&self) -> Result<CommitId, GitError> {
        match self.resolve("HEAD")? {
            Some(id) => Ok(id),
            None => Err(GitError::Parse {
                command: "git rev-parse HEAD".to_owned(),
                detail: "HEAD does not name a commit".to_owned(),
            }),
        }
    }

    /// Whether a fully-qualified ref exists.
    pub fn ref_exists(&self, name: &str) -> Result<bool, GitError> {
        self.status_bool(&["show-ref", "--verify", "--quiet", name])
    }

    /// Abbreviated form of a commit id.
    pub fn short(&self, commit: &CommitId) -> Result<String, GitError> {
        Ok(self
            .stdout(&["rev-parse", "--short", commit.as_str()])?
            .trim()
            .to_owned())
    }

    /// Full commit message body.
    pub fn message(&self, commit: &CommitId) -> Result<String, GitError> {
        self.stdout(&[
            "log",
            "-1",
            "--no-show-signature",
            "--format=%B",
            commit.as_str(),
        ])
    }

    /// Author and committer metadata, dates in raw format.
    pub fn metadata(&self, commit: &CommitId) -> Result<CommitMeta, GitError> {
        let args = [
            "log",
            "-1",
            "--no-show-signature",
            "--date=raw",
            "--format=%an%x00%ae%x00%ad%x00%cn%x00%ce%x00%cd",
            commit.as_str(),
        ];
        let out = self.stdout(&args)?;
        let fields: Vec<&str> = out.trim_end_matches('\n').split('\0').collect();
        if fields.len() != 6 {
            return Err(GitError::Parse {
                command: format!("git {}", args.join(" ")),
                detail: format!("expected 6 metadata fields, got {}", fields.len()),
            });
        }
        Ok(CommitMeta {
            author_name: fields[0].to_owned(),
            author_email: fields[1].to_owned(),
            author_date: fields[2].to_owned(),
            committer_name: fields[3].to_owned(),
            committer_email: fields[4].to_owned(),
            committer_date: fields[5].to_owned(),
        })
    }

    /// Is `a` an ancestor of `b`?
    pub fn is_ancestor(&self, a: &CommitId, b: &CommitId) -> Result<bool, GitError> {
        self.status_bool(&["merge-base", "--is-ancestor", a.as_str(), b.as_str()])
    }

    /// Do `a` and `b` share any ancestor?
    pub fn related(&self, a: &CommitId, b: &CommitId) -> Result<bool, GitError> {
        self.status_bool(&["merge-base", a.as_str(), b.as_str()])
    }

    /// Reduce a set of commits to those that are not ancestors of any
    /// other commit in the set.
    pub fn independent_tips(&self, commits: &[CommitId]) -> Result<Vec<CommitId>, GitError> {
        if commits.len() < 2 {
            return Ok(commits.to_vec());
        }
        let mut args = vec!["merge-base", "--independent"];
        args.extend(commits.iter().map(CommitId::as_str));
        let out = self.stdout(&args)?;
        out.split_whitespace()
            .map(|s| CommitId::new(s).map_err(GitError::from))
            .collect()
    }

    /// Number of commits in `exclude..include`.
    pub fn count_between(&self, exclude: &CommitId, include: &CommitId) -> Result<u64, GitError> {
        let range = format!("{exclude}..{include}");
        let args = ["rev-list", "--count", &range];
        let out = self.stdout(&args)?;
        out.trim().parse().map_err(|_| GitError::Parse {
            command: format!("git {}", args.join(" ")),
            detail: format!("expected a count, got {:?}", out.trim()),
        })
    }

    /// All commits reachable from `include` but not from `exclude`.
    pub fn rev_list(
        &self,
        include: &[CommitId],
        exclude: &[CommitId],
    ) -> Result<Vec<CommitId>, GitError> {
        if include.is_empty() {
            return Ok(Vec::new());
        }
        let negated: Vec<String> = exclude.iter().map(|c| format!("^{c}")).collect();
        let mut args = vec!["rev-list"];
        args.extend(include.iter().map(CommitId::as_str));
        args.extend(negated.iter().map(String::as_str));
        let out = self.stdout(&args)?;
        out.split_whitespace()
            .map(|s| CommitId::new(s).map_err(GitError::from))
            .collect()
    }

    /// Scan history from `tip` for commits whose message matches `grep`
    /// (a basic regex, as `git log --grep` interprets it). Returns
    /// newest-first records with full message bodies.
    pub fn log_grep(&self, tip: &CommitId, grep: &str) -> Result<Vec<LogRecord>, GitError> {
        let pattern = format!("--grep={grep}");
        let args = [
            "log",
            "--no-show-signature",
            "--format=%H%x00%B%x1e",
            pattern.as_str(),
            tip.as_str(),
        ];
        let out = self.stdout(&args)?;
        let mut records = Vec::new();
        for chunk in out.split('\u{1e}') {
            let chunk = chunk.trim_start_matches('\n');
            let Some((hash, body)) = chunk.split_once('\0') else {
                continue;
            };
            records.push(LogRecord {
                commit: CommitId::new(hash.trim())?,
                message: body.to_owned(),
            });
        }
        Ok(records)
    }

    /// One-line-per-commit log of `exclude..include`, each line prefixed
    /// with `subject_prefix`. Used verbatim inside squash messages.
    pub fn oneline_log(
        &self,
        exclude: &CommitId,
        include: &CommitId,
        subject_prefix: &str,
    ) -> Result<String, GitError> {
        let range = format!("{exclude}..{include}");
        let format = format!("--pretty=tformat:{subject_prefix}%h %s");
        self.stdout(&["log", "--no-show-signature", &format, &range])
    }

    // -- write operations ---------------------------------------------------

    /// Synthesize a commit object from a tree, parents, and message. With
    /// `meta`, author/committer identity is copied verbatim through the
    /// environment; without it, git's own identity resolution applies
    /// (new commits such as adds and squashes). The commit is persisted
    /// immediately; no ref points at it.
    pub fn commit_tree(
        &self,
        tree: &TreeId,
        parents: &[CommitId],
        meta: Option<&CommitMeta>,
        message: &str,
    ) -> Result<CommitId, GitError> {
        let mut args = vec!["commit-tree".to_owned(), tree.as_str().to_owned()];
        for parent in parents {
            args.push("-p".to_owned());
            args.push(parent.as_str().to_owned());
        }
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let envs: Vec<(&str, &str)> = match meta {
            Some(meta) => vec![
                ("GIT_AUTHOR_NAME", meta.author_name.as_str()),
                ("GIT_AUTHOR_EMAIL", meta.author_email.as_str()),
                ("GIT_AUTHOR_DATE", meta.author_date.as_str()),
                ("GIT_COMMITTER_NAME", meta.committer_name.as_str()),
                ("GIT_COMMITTER_EMAIL", meta.committer_email.as_str()),
                ("GIT_COMMITTER_DATE", meta.committer_date.as_str()),
            ],
            None => Vec::new(),
        };
        let output = self.run_with(&arg_refs, &envs, Some(message))?;
        if !output.status.success() {
            return Err(command_error(&arg_refs, &output));
        }
        let raw = String::from_utf8_lossy(&output.stdout);
        self.parse_commit(&arg_refs, &raw)
    }

    /// Create or move a ref to a commit.
    pub fn update_ref(&self, name: &str, commit: &CommitId) -> Result<(), GitError> {
        self.stdout(&["update-ref", name, commit.as_str()])?;
        Ok(())
    }

    /// Merge `rev` into HEAD with the subtree strategy option.
    ///
    /// Merge output goes to stderr so stdout stays reserved for result
    /// ids. A conflicting merge surfaces as [`GitError::Command`] with
    /// git's own conflict report.
    pub fn subtree_merge(
        &self,
        rev: &CommitId,
        prefix: &str,
        message: Option<&str>,
        allow_unrelated: bool,
    ) -> Result<(), GitError> {
        let strategy = format!("-Xsubtree={prefix}");
        let mut args = vec!["merge", "--no-edit", strategy.as_str()];
        if allow_unrelated {
            args.push("--allow-unrelated-histories");
        }
        if let Some(msg) = message {
            args.push("-m");
            args.push(msg);
        }
        args.push(rev.as_str());
        let out = self.stdout(&args)?;
        if !out.trim().is_empty() {
            eprintln!("{}", out.trim_end());
        }
        Ok(())
    }

    /// Fetch a ref from a remote repository; returns the fetched commit.
    pub fn fetch(&self, repository: &str, remote_ref: &str) -> Result<CommitId, GitError> {
        self.stdout(&["fetch", repository, remote_ref])?;
        match self.resolve("FETCH_HEAD")? {
            Some(id) => Ok(id),
            None => Err(GitError::Parse {
                command: format!("git fetch {repository} {remote_ref}"),
                detail: "FETCH_HEAD does not name a commit after fetch".to_owned(),
            }),
        }
    }

    /// Push a local commit to a ref in a remote repository.
    pub fn push(
        &self,
        repository: &str,
        local: &CommitId,
        remote_ref: &str,
    ) -> Result<(), GitError> {
        let refspec = format!("{local}:{remote_ref}");
        self.stdout(&["push", repository, &refspec])?;
        Ok(())
    }

    /// Read a commit's tree into the index under `prefix`.
    pub fn read_tree_into_prefix(&self, commit: &CommitId, prefix: &str) -> Result<(), GitError> {
        let arg = format!("--prefix={prefix}/");
        self.stdout(&["read-tree", &arg, commit.as_str()])?;
        Ok(())
    }

    /// Materialize an index path into the working tree.
    pub fn checkout_path(&self, path: &str) -> Result<(), GitError> {
        self.stdout(&["checkout", "--", path])?;
        Ok(())
    }

    /// Write the index as a tree object.
    pub fn write_tree(&self) -> Result<TreeId, GitError> {
        let out = self.stdout(&["write-tree"])?;
        Ok(TreeId::new(out.trim())?)
    }

    /// Move HEAD (and the index) to a commit, leaving the working tree alone.
    pub fn reset_to(&self, commit: &CommitId) -> Result<(), GitError> {
        self.stdout(&["reset", "-q", commit.as_str()])?;
        Ok(())
    }

    /// Whether the index and working tree are both clean relative to HEAD.
    pub fn is_clean(&self) -> Result<bool, GitError> {
        let unstaged = self.status_bool(&["diff-index", "HEAD", "--exit-code", "--quiet"])?;
        if !unstaged {
            return Ok(false);
        }
        self.status_bool(&["diff-index", "--cached", "HEAD", "--exit-code", "--quiet"])
    }
}

fn fmt_exit_code(code: &Option<i32>) -> String {
    code.map(|c| format!(" (exit code {c})")).unwrap_or_default()
}

fn fmt_stderr(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}

fn spawn_error(e: std::io::Error) -> GitError {
    if e.kind() == std::io::ErrorKind::NotFound {
        GitError::NotDiscoverable(e)
    } else {
        GitError::Io(e)
    }
}

fn command_error(args: &[&str], output: &Output) -> GitError {
    GitError::Command {
        command: format!("git {}", args.join(" ")),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        exit_code: output.status.code(),
    }
}
