use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures that end an archiving run.
///
/// Malformed exclude patterns and names that cannot be transcoded are not
/// here: both are recovered from where they happen.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("cannot create target archive {}: {source}", path.display())]
    CreateTarget { path: PathBuf, source: io::Error },

    #[error("cannot stat source {}: {source}", path.display())]
    Source { path: PathBuf, source: io::Error },

    #[error("I/O error on {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("cannot derive an archive name from {}", .0.display())]
    NoBaseName(PathBuf),

    #[error("entry {name} is {size} bytes; zip64 archives are not supported")]
    EntryTooLarge { name: String, size: u64 },

    #[error("archive would hold {0} entries; the limit without zip64 is 65535")]
    TooManyEntries(usize),

    #[error("archive write error: {0}")]
    Container(#[from] io::Error),
}

impl ArchiveError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ArchiveError::Io {
            path: path.into(),
            source,
        }
    }
}

// Convenient crate-wide result type
pub type Result<T> = std::result::Result<T, ArchiveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_names_the_path() {
        let err = ArchiveError::io("proj/a.txt", io::Error::new(io::ErrorKind::NotFound, "gone"));
        let msg = err.to_string();
        assert!(msg.contains("proj/a.txt"), "{msg}");
        assert!(msg.contains("gone"), "{msg}");
    }

    #[test]
    fn walkdir_errors_convert() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let err = walkdir::WalkDir::new(&missing)
            .into_iter()
            .next()
            .unwrap()
            .unwrap_err();
        let converted: ArchiveError = err.into();
        assert!(matches!(converted, ArchiveError::Walk(_)));
    }
}
