//! Repository configuration (`.splice.toml`).
//!
//! Optional per-prefix defaults so repeated pulls and pushes do not need
//! the repository and ref spelled out every time:
//!
//! ```toml
//! [subtree."vendor/lib"]
//! repository = "https://example.com/lib.git"
//! branch = "main"
//! squash = true
//! ```
//!
//! Missing file → all defaults (no error). Unknown fields are rejected so
//! typos surface instead of silently doing nothing.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::Deserialize;

use crate::annotation::normalize_dir;

/// File name looked up at the repository root.
pub const CONFIG_FILE: &str = ".splice.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level splice repository configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpliceConfig {
    /// Per-prefix subtree settings, keyed by prefix path.
    #[serde(default)]
    pub subtree: BTreeMap<String, SubtreeConfig>,
}

/// Defaults for one subtree prefix.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubtreeConfig {
    /// Remote repository URL or path used when the command omits one.
    #[serde(default)]
    pub repository: Option<String>,

    /// Remote ref used when the command omits one.
    #[serde(default)]
    pub branch: Option<String>,

    /// Squash by default for `add`/`merge`/`pull` on this prefix.
    #[serde(default)]
    pub squash: bool,
}

impl SpliceConfig {
    /// Settings for a prefix, tolerating trailing slashes on either side.
    #[must_use]
    pub fn subtree(&self, prefix: &str) -> Option<&SubtreeConfig> {
        let wanted = normalize_dir(prefix);
        self.subtree
            .iter()
            .find(|(key, _)| normalize_dir(key) == wanted)
            .map(|(_, cfg)| cfg)
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Error loading a splice configuration file.
#[derive(Debug)]
pub struct ConfigError {
    /// The path that was being loaded (if available).
    pub path: Option<std::path::PathBuf>,
    /// Human-readable message with line-level detail when possible.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(p) = &self.path {
            write!(f, "{}: {}", p.display(), self.message)
        } else {
            write!(f, "config error: {}", self.message)
        }
    }
}

impl std::error::Error for ConfigError {}

impl SpliceConfig {
    /// Load `.splice.toml` from the repository root.
    ///
    /// - If the file does not exist, returns all defaults (not an error).
    /// - If the file exists but contains invalid TOML or unknown fields,
    ///   returns a [`ConfigError`] with line-level detail.
    ///
    /// # Errors
    /// Returns `ConfigError` on I/O errors (other than not-found) or
    /// parse errors.
    pub fn load(root: &Path) -> Result<Self, ConfigError> {
        let path = root.join(CONFIG_FILE);
        let contents = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError {
                    path: Some(path),
                    message: format!("could not read file: {e}"),
                });
            }
        };
        Self::parse(&contents).map_err(|mut e| {
            e.path = Some(path);
            e
        })
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `ConfigError` on invalid TOML or unknown fields.
    pub fn parse(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| {
            let mut message = e.message().to_owned();
            if let Some(span) = e.span() {
                let line = toml_str[..span.start]
                    .chars()
                    .filter(|&c| c == '\n')
                    .count()
                    + 1;
                message = format!("line {line}: {message}");
            }
            ConfigError {
                path: None,
                message,
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_empty() {
        let cfg = SpliceConfig::parse("").unwrap();
        assert!(cfg.subtree.is_empty());
    }

    #[test]
    fn parses_subtree_table() {
        let cfg = SpliceConfig::parse(
            r#"
            [subtree."vendor/lib"]
            repository = "https://example.com/lib.git"
            branch = "main"
            squash = true
            "#,
        )
        .unwrap();
        let sub = cfg.subtree("vendor/lib").unwrap();
        assert_eq!(sub.repository.as_deref(), Some("https://example.com/lib.git"));
        assert_eq!(sub.branch.as_deref(), Some("main"));
        assert!(sub.squash);
    }

    #[test]
    fn squash_defaults_false() {
        let cfg = SpliceConfig::parse(
            r#"
            [subtree.sub]
            branch = "main"
            "#,
        )
        .unwrap();
        assert!(!cfg.subtree("sub").unwrap().squash);
    }

    #[test]
    fn lookup_normalizes_trailing_slash() {
        let cfg = SpliceConfig::parse(
            r#"
            [subtree."vendor/lib/"]
            branch = "main"
            "#,
        )
        .unwrap();
        assert!(cfg.subtree("vendor/lib").is_some());
        assert!(cfg.subtree("vendor/lib/").is_some());
        assert!(cfg.subtree("vendor").is_none());
    }

    #[test]
    fn unknown_field_is_rejected() {
        let err = SpliceConfig::parse(
            r#"
            [subtree.sub]
            repo = "typo"
            "#,
        )
        .unwrap_err();
        assert!(err.message.contains("unknown field"), "{}", err.message);
    }

    #[test]
    fn parse_error_includes_line() {
        let err = SpliceConfig::parse("[subtree\n").unwrap_err();
        assert!(err.message.contains("line 1"), "{}", err.message);
    }

    #[test]
    fn missing_file_is_default() {
        let dir = std::env::temp_dir().join("splice-config-missing-test");
        let cfg = SpliceConfig::load(&dir).unwrap();
        assert_eq!(cfg, SpliceConfig::default());
    }
}
