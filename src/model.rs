//! Core identity types for splice.
//!
//! Commit and tree identifiers as returned by git, validated once at the
//! subprocess boundary so the rest of the crate can treat them as opaque.

use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// IdError
// ---------------------------------------------------------------------------

/// A string failed object-id validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdError {
    /// The raw value that failed validation.
    pub value: String,
    /// Why the value is invalid.
    pub reason: String,
}

impl fmt::Display for IdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid object id {:?}: {}", self.value, self.reason)
    }
}

impl std::error::Error for IdError {}

fn validate_hex(s: &str) -> Result<(), IdError> {
    if s.len() != 40 {
        return Err(IdError {
            value: s.to_owned(),
            reason: format!("expected 40 hex characters, got {}", s.len()),
        });
    }
    if !s
        .chars()
        .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
    {
        return Err(IdError {
            value: s.to_owned(),
            reason: "must contain only lowercase hex characters (0-9, a-f)".to_owned(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// CommitId
// ---------------------------------------------------------------------------

/// A validated 40-character lowercase hex git commit id.
///
/// Equality is string equality; commits are immutable.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommitId(String);

impl CommitId {
    /// Create a new `CommitId` from a string, validating format.
    ///
    /// # Errors
    /// Returns an error if the string is not exactly 40 lowercase hex
    /// characters.
    pub fn new(s: &str) -> Result<Self, IdError> {
        validate_hex(s)?;
        Ok(Self(s.to_owned()))
    }

    /// Return the inner hex string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CommitId {
    type Err = IdError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

// ---------------------------------------------------------------------------
// TreeId
// ---------------------------------------------------------------------------

/// A validated 40-character lowercase hex git tree id.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TreeId(String);

impl TreeId {
    /// Create a new `TreeId` from a string, validating format.
    ///
    /// # Errors
    /// Returns an error if the string is not exactly 40 lowercase hex
    /// characters.
    pub fn new(s: &str) -> Result<Self, IdError> {
        validate_hex(s)?;
        Ok(Self(s.to_owned()))
    }

    /// Return the inner hex string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TreeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TreeId {
    type Err = IdError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

// ---------------------------------------------------------------------------
// CommitMeta
// ---------------------------------------------------------------------------

/// Author and committer metadata of a commit.
///
/// Dates are kept in git's raw format (`<epoch> <offset>`) so they can be
/// fed back verbatim through `GIT_AUTHOR_DATE`/`GIT_COMMITTER_DATE` when
/// synthesizing rewritten commits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitMeta {
    pub author_name: String,
    pub author_email: String,
    pub author_date: String,
    pub committer_name: String,
    pub committer_email: String,
    pub committer_date: String,
}

/// The kind of a tree entry at a path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    /// A directory tree.
    Tree,
    /// A submodule gitlink.
    Submodule,
    /// Anything else (blob, symlink).
    Other,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const HEX: &str = "0123456789abcdef0123456789abcdef01234567";

    #[test]
    fn commit_id_valid() {
        let id = CommitId::new(HEX).unwrap();
        assert_eq!(id.as_str(), HEX);
        assert_eq!(format!("{id}"), HEX);
    }

    #[test]
    fn commit_id_rejects_short() {
        let err = CommitId::new("abc123").unwrap_err();
        assert!(err.reason.contains("40 hex"));
    }

    #[test]
    fn commit_id_rejects_uppercase() {
        let upper = HEX.to_uppercase();
        let err = CommitId::new(&upper).unwrap_err();
        assert!(err.reason.contains("lowercase"));
    }

    #[test]
    fn commit_id_rejects_non_hex() {
        let bad = "z123456789abcdef0123456789abcdef01234567";
        assert!(CommitId::new(bad).is_err());
    }

    #[test]
    fn commit_id_from_str_roundtrip() {
        let id: CommitId = HEX.parse().unwrap();
        assert_eq!(id, CommitId::new(HEX).unwrap());
    }

    #[test]
    fn tree_id_valid() {
        let id = TreeId::new(HEX).unwrap();
        assert_eq!(id.as_str(), HEX);
    }

    #[test]
    fn tree_id_rejects_garbage() {
        assert!(TreeId::new("not a tree").is_err());
    }
}
