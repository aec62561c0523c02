//! Run configuration.
//!
//! [`ZipConfig`] is built once from the command line and passed by
//! reference. The default target name and the base prefix are both taken
//! from the source path as the user typed it, made absolute lexically: a
//! symlink named `current` gives `current.zip` and `current/...` entries,
//! not the name of the directory it points to.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::archive::header::CompressionMethod;
use crate::archive::walker::component_name;
use crate::encoding::transcode::NameEncoding;
use crate::error::{ArchiveError, Result};
use crate::filters::exclude::ExcludeSet;

const DEFAULT_LEVEL: u32 = 6;

/// Deflate level 0-9. Level 0 stores files uncompressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionLevel(u32);

impl CompressionLevel {
    /// Levels above 9 are clamped to 9.
    pub fn new(level: u32) -> Self {
        Self(level.min(9))
    }

    pub fn get(self) -> u32 {
        self.0
    }

    /// Method used for file entries at this level.
    pub fn method(self) -> CompressionMethod {
        if self.0 == 0 {
            CompressionMethod::Stored
        } else {
            CompressionMethod::Deflated
        }
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        Self(DEFAULT_LEVEL)
    }
}

/// One archiving run, built once at startup and passed by reference.
#[derive(Debug, Clone)]
pub struct ZipConfig {
    /// Directory or single file to archive.
    pub source: PathBuf,
    /// Archive file to create or truncate.
    pub target: PathBuf,
    pub excludes: ExcludeSet,
    pub name_encoding: NameEncoding,
    pub level: CompressionLevel,
}

impl ZipConfig {
    /// Uses `target` when given, else `<source base name>.zip` in the
    /// current directory.
    pub fn new(source: impl Into<PathBuf>, target: Option<PathBuf>) -> Result<Self> {
        let source = source.into();
        let target = match target {
            Some(t) => t,
            None => default_target_for(&source)?,
        };
        Ok(Self {
            source,
            target,
            excludes: ExcludeSet::default(),
            name_encoding: NameEncoding::default(),
            level: CompressionLevel::default(),
        })
    }

    pub fn with_excludes(mut self, excludes: ExcludeSet) -> Self {
        self.excludes = excludes;
        self
    }

    pub fn with_name_encoding(mut self, encoding: NameEncoding) -> Self {
        self.name_encoding = encoding;
        self
    }

    pub fn with_level(mut self, level: CompressionLevel) -> Self {
        self.level = level;
        self
    }
}

impl fmt::Display for ZipConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "source={} target={} excludes={:?} names={:?} level={}",
            self.source.display(),
            self.target.display(),
            self.excludes.as_strs(),
            self.name_encoding,
            self.level.get()
        )
    }
}

/// Default archive path for `source`: its base name plus `.zip`, relative
/// to the current directory. A file source drops its own extension first,
/// so `报告.txt` gives `报告.zip`.
pub fn default_target_for(source: &Path) -> Result<PathBuf> {
    let source_err = |e: io::Error| ArchiveError::Source {
        path: source.to_path_buf(),
        source: e,
    };
    let md = fs::metadata(source).map_err(source_err)?;
    let resolved = lexical_absolute(source).map_err(source_err)?;
    let stem = if md.is_dir() {
        resolved.file_name()
    } else {
        resolved.file_stem()
    };
    match stem {
        Some(name) => {
            let mut file = name.to_os_string();
            file.push(".zip");
            Ok(PathBuf::from(file))
        }
        None => Err(ArchiveError::NoBaseName(source.to_path_buf())),
    }
}

/// `path` made absolute against the current directory, with `.` and `..`
/// removed without touching the filesystem. Symlinks are not resolved.
pub fn lexical_absolute(path: &Path) -> io::Result<PathBuf> {
    let absolute = std::path::absolute(path)?;
    let mut out = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    Ok(out)
}

/// Raw name of the top-level folder entries are nested under, taken from
/// [`lexical_absolute`] of the source. `None` for a filesystem root.
pub fn base_prefix(source_dir: &Path) -> Option<Vec<u8>> {
    source_dir.file_name().map(component_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_target_from_directory_name() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("myapp");
        fs::create_dir(&src).unwrap();
        assert_eq!(default_target_for(&src).unwrap(), PathBuf::from("myapp.zip"));
    }

    #[test]
    fn default_target_from_file_stem() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("报告.txt");
        fs::write(&src, "x").unwrap();
        assert_eq!(default_target_for(&src).unwrap(), PathBuf::from("报告.zip"));
    }

    #[test]
    fn default_target_resolves_dot_components() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("myapp");
        fs::create_dir_all(src.join("sub")).unwrap();
        let dotted = src.join("sub").join("..");
        assert_eq!(default_target_for(&dotted).unwrap(), PathBuf::from("myapp.zip"));
    }

    #[test]
    fn missing_source_is_a_source_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = default_target_for(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, ArchiveError::Source { .. }));
    }

    #[test]
    fn explicit_target_wins() {
        let cfg = ZipConfig::new("/definitely/not/here", Some(PathBuf::from("out.zip"))).unwrap();
        assert_eq!(cfg.target, PathBuf::from("out.zip"));
        assert_eq!(cfg.level, CompressionLevel::default());
        assert_eq!(cfg.name_encoding, NameEncoding::Gb18030);
    }

    #[test]
    fn level_zero_means_stored() {
        assert_eq!(CompressionLevel::new(0).method(), CompressionMethod::Stored);
        assert_eq!(CompressionLevel::new(9).method(), CompressionMethod::Deflated);
        assert_eq!(CompressionLevel::new(42).get(), 9);
    }

    #[cfg(unix)]
    #[test]
    fn filesystem_root_has_no_prefix() {
        assert_eq!(base_prefix(Path::new("/")), None);
        assert_eq!(base_prefix(Path::new("/srv/proj")).as_deref(), Some(b"proj".as_slice()));
    }

    #[test]
    fn lexical_absolute_drops_dot_components() {
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(lexical_absolute(Path::new("a/./b/../c")).unwrap(), cwd.join("a/c"));
        assert_eq!(lexical_absolute(Path::new(".")).unwrap(), cwd);
    }

    #[cfg(unix)]
    #[test]
    fn default_target_keeps_the_symlink_name() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("release-1.2");
        fs::create_dir(&real).unwrap();
        let link = dir.path().join("current");
        std::os::unix::fs::symlink(&real, &link).unwrap();
        assert_eq!(default_target_for(&link).unwrap(), PathBuf::from("current.zip"));
    }
}
