//! Lazy, pruning walk of the source tree.
//!
//! Each [`SourceEntry`] carries two forms of its path below the root: a
//! lossy UTF-8 string for pattern matching and logs, and the raw name bytes
//! that end up in the archive. On Unix the raw bytes are exactly what the
//! filesystem returned, so names in a legacy encoding (GBK, Big5, ...)
//! survive untouched and two distinct names never collapse into one.

use std::borrow::Cow;
use std::ffi::OsStr;
use std::fs::{self, Metadata};
use std::path::{Component, Path, PathBuf};

use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::error::{ArchiveError, Result};
use crate::filters::exclude::ExcludeSet;

/// One filesystem object found under the source root.
#[derive(Debug, Clone)]
pub struct SourceEntry {
    /// Absolute path on disk.
    pub path: PathBuf,
    /// Forward-slash path relative to the source root, lossily decoded.
    pub rel: String,
    /// Raw relative name: components joined with `/`, backslashes in UTF-8
    /// components turned into `/`.
    pub name: Vec<u8>,
    /// Metadata of the object, or of the link target for symbolic links.
    pub metadata: Metadata,
}

impl SourceEntry {
    /// True for directories and links to directories.
    pub fn is_dir(&self) -> bool {
        self.metadata.is_dir()
    }
}

/// Lazily walks `root` depth-first in file-name order.
///
/// The root itself is never yielded. Excluded directories are pruned, so
/// nothing below them is visited; `skip` is left out without being
/// descended into (used for the archive being written). Symbolic links are
/// not followed for traversal, but their metadata is that of the target.
/// The first error ends the sequence.
pub fn walk_source<'a>(
    root: &'a Path,
    excludes: &'a ExcludeSet,
    skip: Option<&'a Path>,
) -> impl Iterator<Item = Result<SourceEntry>> + 'a {
    WalkDir::new(root)
        .follow_links(false)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(move |e| keep(root, excludes, skip, e))
        .map(move |e| {
            let e = e?;
            to_source_entry(root, e)
        })
}

fn keep(root: &Path, excludes: &ExcludeSet, skip: Option<&Path>, e: &DirEntry) -> bool {
    if skip == Some(e.path()) {
        debug!("skipping the target archive {}", e.path().display());
        return false;
    }
    if excludes.is_empty() {
        return true;
    }
    // Ancestors were already tested on the way down.
    let rel = relative(root, e.path());
    let name = e.file_name().to_string_lossy();
    if excludes.matches_component(&rel, &name) {
        debug!("excluding {}", rel);
        return false;
    }
    true
}

fn to_source_entry(root: &Path, e: DirEntry) -> Result<SourceEntry> {
    let metadata = if e.path_is_symlink() {
        fs::metadata(e.path()).map_err(|err| ArchiveError::io(e.path(), err))?
    } else {
        e.metadata()?
    };
    Ok(SourceEntry {
        rel: relative(root, e.path()),
        name: relative_name(root, e.path()),
        path: e.into_path(),
        metadata,
    })
}

/// `path` relative to `root`, joined with `/` whatever the host separator.
pub fn relative(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let parts: Vec<_> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect();
    parts.join("/")
}

/// Raw archive name of `path` relative to `root`, components joined with `/`.
pub fn relative_name(root: &Path, path: &Path) -> Vec<u8> {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let mut name = Vec::new();
    for component in rel.components() {
        let Component::Normal(part) = component else {
            continue;
        };
        if !name.is_empty() {
            name.push(b'/');
        }
        name.extend_from_slice(&component_name(part));
    }
    name
}

/// Archive form of a single path component.
///
/// A UTF-8 component has any `\` replaced with `/`, so no entry name
/// carries a backslash. Other components are kept byte for byte: in legacy
/// double-byte encodings 0x5C is also a trail byte and cannot be rewritten.
pub fn component_name(part: &OsStr) -> Vec<u8> {
    let bytes = os_bytes(part);
    match std::str::from_utf8(&bytes) {
        Ok(text) => text.replace('\\', "/").into_bytes(),
        Err(_) => bytes.into_owned(),
    }
}

#[cfg(unix)]
fn os_bytes(part: &OsStr) -> Cow<'_, [u8]> {
    use std::os::unix::ffi::OsStrExt;
    Cow::Borrowed(part.as_bytes())
}

#[cfg(not(unix))]
fn os_bytes(part: &OsStr) -> Cow<'_, [u8]> {
    match part.to_string_lossy() {
        Cow::Borrowed(text) => Cow::Borrowed(text.as_bytes()),
        Cow::Owned(text) => Cow::Owned(text.into_bytes()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("b/node_modules/pkg")).unwrap();
        fs::create_dir_all(root.join("a")).unwrap();
        fs::write(root.join("a/one.txt"), "1").unwrap();
        fs::write(root.join("b/two.log"), "2").unwrap();
        fs::write(root.join("b/node_modules/pkg/index.js"), "3").unwrap();
        fs::write(root.join("top.txt"), "4").unwrap();
        dir
    }

    fn rels(root: &Path, excludes: &ExcludeSet, skip: Option<&Path>) -> Vec<String> {
        walk_source(root, excludes, skip)
            .map(|e| e.unwrap().rel)
            .collect()
    }

    #[test]
    fn yields_everything_but_the_root_in_order() {
        let dir = tree();
        let all = rels(dir.path(), &ExcludeSet::default(), None);
        assert_eq!(
            all,
            vec![
                "a",
                "a/one.txt",
                "b",
                "b/node_modules",
                "b/node_modules/pkg",
                "b/node_modules/pkg/index.js",
                "b/two.log",
                "top.txt",
            ]
        );
    }

    #[test]
    fn prunes_excluded_directories() {
        let dir = tree();
        let set = ExcludeSet::parse("node_modules *.log");
        let kept = rels(dir.path(), &set, None);
        assert_eq!(kept, vec!["a", "a/one.txt", "b", "top.txt"]);
    }

    #[test]
    fn skips_the_given_path() {
        let dir = tree();
        let skip = dir.path().join("top.txt");
        let kept = rels(dir.path(), &ExcludeSet::default(), Some(skip.as_path()));
        assert!(!kept.contains(&"top.txt".to_string()));
        assert_eq!(kept.len(), 7);
    }

    #[test]
    fn relative_uses_forward_slashes() {
        let root = Path::new("base");
        let path = root.join("x").join("y").join("z.txt");
        assert_eq!(relative(root, &path), "x/y/z.txt");
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(dir.path().join("missing"), dir.path().join("link")).unwrap();
        let first = walk_source(dir.path(), &ExcludeSet::default(), None)
            .next()
            .unwrap();
        assert!(matches!(first, Err(ArchiveError::Io { .. })));
    }

    #[test]
    fn relative_name_matches_relative_for_plain_names() {
        let root = Path::new("base");
        let path = root.join("docs").join("报告.txt");
        assert_eq!(relative_name(root, &path), "docs/报告.txt".as_bytes());
    }

    #[cfg(unix)]
    #[test]
    fn backslashes_in_names_become_slashes() {
        let root = Path::new("base");
        let path = root.join("a\\b.txt");
        assert_eq!(relative_name(root, &path), b"a/b.txt");
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_components_keep_their_bytes() {
        use std::os::unix::ffi::OsStrExt;

        let gbk = OsStr::from_bytes(b"\xb1\xa8\x5c.txt");
        assert_eq!(component_name(gbk), b"\xb1\xa8\x5c.txt");

        let root = Path::new("base");
        let path = root.join("dir").join(OsStr::from_bytes(b"a\xff.txt"));
        assert_eq!(relative_name(root, &path), b"dir/a\xff.txt");
    }
}
