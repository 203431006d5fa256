//! Subtree annotation trailers embedded in commit messages.
//!
//! Three trailer lines carry splice's only cross-run state:
//!
//! ```text
//! git-subtree-dir: path/to/subtree
//! git-subtree-mainline: <commit>
//! git-subtree-split: <commit>
//! ```
//!
//! `{dir, split}` marks a squash commit; `{dir, mainline, split}` marks an
//! add or rejoin. The trailer keys are git-subtree's, so histories produced
//! by either tool stay mutually readable.

use std::fmt;

const DIR_KEY: &str = "git-subtree-dir:";
const MAINLINE_KEY: &str = "git-subtree-mainline:";
const SPLIT_KEY: &str = "git-subtree-split:";

/// Raw annotation fields extracted from a commit message.
///
/// Values are unvalidated strings; the engine resolves `mainline` and
/// `split` against the repository and discards malformed records.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Annotation {
    /// Subtree directory, trailing slashes normalized away.
    pub dir: Option<String>,
    /// Mainline commit reference (add/rejoin markers only).
    pub mainline: Option<String>,
    /// Rewritten subtree commit reference.
    pub split: Option<String>,
}

impl Annotation {
    /// Extract annotation fields from a commit message.
    ///
    /// Lines are scanned anywhere in the body (matching how the markers
    /// are grepped out of history); the last occurrence of each key wins.
    #[must_use]
    pub fn parse(message: &str) -> Self {
        let mut ann = Self::default();
        for line in message.lines() {
            let line = line.trim_end();
            if let Some(value) = line.strip_prefix(DIR_KEY) {
                ann.dir = Some(normalize_dir(value.trim()));
            } else if let Some(value) = line.strip_prefix(MAINLINE_KEY) {
                ann.mainline = Some(value.trim().to_owned());
            } else if let Some(value) = line.strip_prefix(SPLIT_KEY) {
                ann.split = Some(value.trim().to_owned());
            }
        }
        ann
    }

    /// Whether any annotation field is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dir.is_none() && self.mainline.is_none() && self.split.is_none()
    }

    /// Whether this annotation names the given subtree directory.
    #[must_use]
    pub fn names_dir(&self, dir: &str) -> bool {
        self.dir.as_deref() == Some(dir)
    }
}

/// Strip trailing slashes from a configured or parsed prefix.
#[must_use]
pub fn normalize_dir(dir: &str) -> String {
    dir.trim_end_matches('/').to_owned()
}

// ---------------------------------------------------------------------------
// Trailer block synthesis
// ---------------------------------------------------------------------------

/// A trailer block for a synthesized add, rejoin, or squash message.
///
/// `Display` renders the trailer lines in canonical order, each
/// newline-terminated, ready to append after a blank line.
#[derive(Clone, Debug)]
pub struct TrailerBlock {
    pub dir: String,
    pub mainline: Option<String>,
    pub split: String,
}

impl fmt::Display for TrailerBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{DIR_KEY} {}", self.dir)?;
        if let Some(mainline) = &self.mainline {
            writeln!(f, "{MAINLINE_KEY} {mainline}")?;
        }
        writeln!(f, "{SPLIT_KEY} {}", self.split)
    }
}

/// Append a trailer block to a message subject/body, inserting the blank
/// separator line git trailers require.
#[must_use]
pub fn with_trailers(message: &str, trailers: &TrailerBlock) -> String {
    let body = message.trim_end();
    if body.is_empty() {
        trailers.to_string()
    } else {
        format!("{body}\n\n{trailers}")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
