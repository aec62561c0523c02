//! # Exclusion Matcher
//!
//! Decides whether a path below the source root is left out of the archive.
//! Patterns are shell-style globs (`*`, `?`, `[...]`) compiled with the
//! `glob` crate and tested against each path component's base name, so
//! excluding `node_modules` removes every `node_modules` directory and all
//! of its contents wherever it sits in the tree.
//!
//! A pattern that contains `/` is additionally tested against the
//! forward-slash relative path of the entry and of each ancestor, e.g.
//! `docs/*.tmp`.

use std::path::{Component, Path};

use glob::{MatchOptions, Pattern};
use tracing::warn;

// `*` must not cross a separator when a pattern spells out a path.
const PATH_MATCH: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// An ordered set of compiled exclude patterns.
///
/// Malformed patterns are reported once when the set is built and then
/// ignored; they never fail the run.
#[derive(Debug, Clone, Default)]
pub struct ExcludeSet {
    patterns: Vec<Pattern>,
    rejected: Vec<String>,
}

impl ExcludeSet {
    /// Parses one raw exclude string, splitting it on whitespace.
    ///
    /// An empty or blank string yields a set that matches nothing.
    pub fn parse(raw: &str) -> Self {
        Self::from_patterns(raw.split_whitespace())
    }

    /// Builds a set from several raw strings, e.g. repeated `-x` flags.
    /// Every string is split on whitespace; order is kept.
    pub fn parse_all<I, S>(raws: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::default();
        for raw in raws {
            for pattern in raw.as_ref().split_whitespace() {
                set.push(pattern);
            }
        }
        set
    }

    /// Builds a set from individual patterns, without splitting them.
    pub fn from_patterns<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::default();
        for pattern in patterns {
            set.push(pattern.as_ref());
        }
        set
    }

    fn push(&mut self, raw: &str) {
        if raw.is_empty() {
            return;
        }
        match Pattern::new(raw) {
            Ok(p) => self.patterns.push(p),
            Err(e) => {
                warn!("ignoring malformed exclude pattern '{}': {}", raw, e);
                self.rejected.push(raw.to_string());
            }
        }
    }

    /// True when no usable pattern was given.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Number of compiled patterns.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Patterns that failed to compile, in input order.
    pub fn rejected(&self) -> &[String] {
        &self.rejected
    }

    /// Pattern sources as given, for logging.
    pub fn as_strs(&self) -> Vec<&str> {
        self.patterns.iter().map(Pattern::as_str).collect()
    }

    /// Tests a single component: `name` is its base name and `rel` the
    /// forward-slash path from the source root down to and including it.
    pub fn matches_component(&self, rel: &str, name: &str) -> bool {
        self.patterns.iter().any(|p| {
            if p.as_str().contains('/') {
                p.matches_with(rel, PATH_MATCH)
            } else {
                p.matches(name)
            }
        })
    }

    /// Returns true when `rel_path`, or any ancestor of it below the source
    /// root, matches one of the patterns.
    pub fn should_skip(&self, rel_path: &Path) -> bool {
        if self.patterns.is_empty() {
            return false;
        }
        let mut rel = String::new();
        for component in rel_path.components() {
            let name = match component {
                Component::Normal(name) => name.to_string_lossy(),
                // `.` / `..` / roots carry no base name of their own.
                _ => continue,
            };
            if !rel.is_empty() {
                rel.push('/');
            }
            rel.push_str(&name);
            if self.matches_component(&rel, &name) {
                return true;
            }
        }
        false
    }
}

/// Free-function form of [`ExcludeSet::should_skip`].
pub fn should_skip(patterns: &ExcludeSet, rel_path: &Path) -> bool {
    patterns.should_skip(rel_path)
}
